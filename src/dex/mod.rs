#[macro_use]
pub mod error;

pub mod opcode_format;
pub mod opcodes;
pub mod references;
pub mod instructions;
pub mod debug;
pub mod location;
pub(crate) mod try_list;
pub mod builder;
pub mod finalize;

use num_traits::Bounded;

// Range checks shared by operand validation and offset resolution

/// True if `value` lies within the bounds of the integer type `T`.
#[inline]
pub(crate) fn fits<T>(value: i64) -> bool
where
    T: Bounded + Into<i64>,
{
    value >= T::min_value().into() && value <= T::max_value().into()
}

/// True if `value` fits a signed field of `bits` width (e.g. the nibble literal of 11n).
#[inline]
pub(crate) fn fits_signed_bits(value: i64, bits: u32) -> bool
{
    let limit = 1i64 << (bits - 1);
    value >= -limit && value < limit
}

/// True if `value` fits an unsigned field of `bits` width (e.g. a 4-bit register).
#[inline]
pub(crate) fn fits_unsigned_bits(value: u32, bits: u32) -> bool
{
    bits >= 32 || value < (1u32 << bits)
}
