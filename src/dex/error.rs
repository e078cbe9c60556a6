use std::fmt;

macro_rules! err {
    ($kind:ident, $msg:literal) => {
        BuilderError::new(ErrorKind::$kind, $msg)
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        BuilderError::new(ErrorKind::$kind, &format!($fmtstr, $($args)*))
    };
}

#[macro_export]
macro_rules! fail {
    ($kind:ident, $msg:literal) => {
        return Err(BuilderError::new(ErrorKind::$kind, $msg))
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        return Err(BuilderError::new(ErrorKind::$kind, &format!($fmtstr, $($args)*)))
    };
}

/// The class of failure, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind
{
    /// An operand does not fit its format, or the operands do not match the opcode's format.
    MalformedInstruction,
    /// A label was placed while it was already placed.
    LabelAlreadyPlaced,
    /// A label referenced by an instruction or try block was never placed.
    UnresolvedLabel,
    /// An offset or size cannot be represented even by the widest encoding.
    EncodingOverflow,
    /// A try range is inverted, or overlapping catches disagree on their handler.
    InvalidTryBlock,
    /// A payload-referencing instruction does not point at a matching payload.
    InvalidPayloadReference,
    /// An index-based mutation named a slot that does not exist.
    InvalidIndex,
}

impl fmt::Display for ErrorKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self
        {
            ErrorKind::MalformedInstruction => "malformed instruction",
            ErrorKind::LabelAlreadyPlaced => "label already placed",
            ErrorKind::UnresolvedLabel => "unresolved label",
            ErrorKind::EncodingOverflow => "encoding overflow",
            ErrorKind::InvalidTryBlock => "invalid try block",
            ErrorKind::InvalidPayloadReference => "invalid payload reference",
            ErrorKind::InvalidIndex => "invalid index",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderError
{
    kind: ErrorKind,
    msg: String,
    contexts: Vec<String>,
}

impl BuilderError
{
    pub(crate) fn new(kind: ErrorKind, msg: &str) -> Self
    {
        BuilderError {
            kind,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: BuilderError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        BuilderError { kind: base.kind, msg: base.msg, contexts }
    }

    pub fn kind(&self) -> ErrorKind
    {
        self.kind
    }

    pub fn message(&self) -> &str
    {
        &self.msg
    }
}

impl fmt::Display for BuilderError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}: {}", self.kind, self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for BuilderError {}
