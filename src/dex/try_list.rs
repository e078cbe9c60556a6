//! Coalescing of resolved try ranges into the exception table layout.
//!
//! Each resolved range is split at the boundaries of the ranges already
//! registered, every sub-range collects the handlers covering it in
//! registration order, and neighbouring sub-ranges with equal handler lists
//! are merged back together.

use log::{trace, warn};
use rangemap::RangeMap;
use std::cmp::{max, min};

use crate::dex::error::{BuilderError, ErrorKind};
use crate::dex::finalize::{ExceptionHandler, TryBlock};

#[derive(Debug, Default)]
pub(crate) struct TryListBuilder {
    ranges: RangeMap<u32, Vec<ExceptionHandler>>,
}

impl TryListBuilder {
    pub(crate) fn new() -> TryListBuilder {
        TryListBuilder { ranges: RangeMap::new() }
    }

    /// Registers `handler` over the code units `[start, end)`.
    pub(crate) fn add(&mut self, start: u32, end: u32, handler: ExceptionHandler) -> Result<(), BuilderError> {
        if end < start {
            fail!(InvalidTryBlock, "try range ends at {:#x} before it starts at {:#x}", end, start);
        }
        if end == start {
            warn!("dropping empty try range at {:#x}", start);
            return Ok(());
        }
        let range = start..end;

        let mut updates = Vec::new();
        for (covered, handlers) in self.ranges.overlapping(&range) {
            let clamped = max(covered.start, start)..min(covered.end, end);
            match handlers.iter().find(|h| h.exception_type == handler.exception_type) {
                Some(existing) if existing.handler_address == handler.handler_address => {
                    trace!("duplicate catch over {:?} ignored", clamped);
                }
                Some(existing) => fail!(
                    InvalidTryBlock,
                    "overlapping catches for {} with different handlers at {:#x} and {:#x}",
                    handler.exception_type.as_deref().unwrap_or("<any>"),
                    existing.handler_address,
                    handler.handler_address
                ),
                None => {
                    let mut extended = handlers.clone();
                    extended.push(handler.clone());
                    updates.push((clamped, extended));
                }
            }
        }
        for gap in self.ranges.gaps(&range) {
            updates.push((gap, vec![handler.clone()]));
        }
        for (sub_range, handlers) in updates {
            self.ranges.insert(sub_range, handlers);
        }
        Ok(())
    }

    /// The merged ranges in address order. Ranges wider than a try item can count are split.
    pub(crate) fn build(self) -> Vec<TryBlock> {
        let mut blocks = Vec::new();
        for (range, handlers) in self.ranges.iter() {
            let mut start = range.start;
            while start < range.end {
                let count = min(range.end - start, u16::MAX as u32);
                blocks.push(TryBlock {
                    start_address: start,
                    code_unit_count: count as u16,
                    handlers: handlers.clone(),
                });
                start += count;
            }
        }
        blocks
    }
}
