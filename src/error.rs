use std::io;

/// Errors raised while building, loading or querying a fingerprint index.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fingerprint length is zero or not a multiple of the word size.
    #[error("invalid fingerprint length {0}: must be a positive multiple of 64")]
    InvalidLength(usize),

    #[error("bit index {index} out of range for length {length}")]
    OutOfRange { index: usize, length: usize },

    #[error("length mismatch: expected {expected} bits, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("invalid hex fingerprint: {0}")]
    InvalidHex(String),

    /// The header of an index file disagrees with its contents.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Load options that cannot be honoured, e.g. an empty chunk cache.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("index has been closed")]
    UseAfterClose,

    #[error("query cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
