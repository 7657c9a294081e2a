use thiserror::Error;

/// Errors raised while reading or writing wire bytes. Every variant carries
/// the byte offset at which the problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("truncated buffer at offset {offset}: need {need} bytes, limit is {limit}")]
    Truncated {
        offset: usize,
        need:   usize,
        limit:  usize,
    },

    #[error("varint{bits} value too long at offset {offset}")]
    ValueTooLong {
        offset: usize,
        bits:   u8,
    },

    #[error("value {value} exceeds {bits} bits at offset {offset}")]
    ExceedsBits {
        offset: usize,
        bits:   u8,
        value:  i128,
    },

    #[error("negative length {length} at offset {offset}")]
    NegativeLength {
        offset: usize,
        length: i64,
    },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        offset: usize,
    },

    #[error("write of {need} bytes at offset {offset} exceeds max limit {max_limit}")]
    OutOfBounds {
        offset:    usize,
        need:      usize,
        max_limit: usize,
    },

    #[error("unknown kind {kind} at offset {offset}")]
    UnknownKind {
        offset: usize,
        kind:   i64,
    },

    #[error("length mismatch at offset {offset}: declared {expected} bytes, found {actual}")]
    LengthMismatch {
        offset:   usize,
        expected: usize,
        actual:   usize,
    },
}

pub type Result<T> = std::result::Result<T, WireError>;
