//! Error types for cabinet-common.

use thiserror::Error;

/// Common error type for Cabinet operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A value does not fit the binary field it must be stored in.
    #[error("value {value} does not fit in a {bits}-bit field")]
    Overflow { value: u64, bits: u32 },

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
