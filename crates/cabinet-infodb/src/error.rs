//! Error types for building and loading info databases.

use thiserror::Error;

/// Why an existing database must be rebuilt rather than used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleReason {
    /// The header magic did not match after un-salting.
    #[error("bad header magic")]
    BadMagic,
    /// The record layout hash differs from this build's.
    #[error("layout hash {actual:#010x} does not match {expected:#010x}")]
    SizesHash { expected: u32, actual: u32 },
    /// The database was built from a different emulator version.
    #[error("built for version '{actual}', expected '{expected}'")]
    Version { expected: String, actual: String },
}

/// Errors that can occur when building or loading an info database.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] cabinet_common::Error),

    /// The input document is not well-formed.
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The caller asked for ingestion to stop.
    #[error("ingestion cancelled")]
    Cancelled,

    /// A value is too large for its binary field; the build is aborted.
    #[error("value {value} does not fit in a {bits}-bit field")]
    Overflow { value: u64, bits: u32 },

    /// The builder was already fed a document.
    #[error("database builder has already been used")]
    BuilderReused,

    /// `emit` was called on a builder that did not complete a build.
    #[error("database builder has no completed build to emit")]
    NotBuilt,

    /// The database is out of date and should be rebuilt.
    #[error("info database is stale: {0}")]
    Stale(StaleReason),

    /// The database is structurally damaged (truncated, bad sentinels).
    #[error("info database is corrupt: {0}")]
    Corrupt(String),

    /// A string reference points outside the string table.
    #[error("string reference {0:#010x} is out of bounds")]
    StringOutOfBounds(u32),
}

impl Error {
    /// Check whether the right response is to rebuild the database.
    ///
    /// Stale and corrupt files are an expected condition (new emulator,
    /// new build of this crate, interrupted write), not something to
    /// surface to the user as a failure.
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Self::Stale(_) | Self::Corrupt(_))
    }

    /// Check whether this error is the result of a caller-requested abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn xml(position: u64, message: impl Into<String>) -> Self {
        Self::Xml { position, message: message.into() }
    }
}

/// Narrowing failures from the common crate become fatal overflows.
pub(crate) fn lift_overflow(err: cabinet_common::Error) -> Error {
    match err {
        cabinet_common::Error::Overflow { value, bits } => Error::Overflow { value, bits },
        other => Error::Common(other),
    }
}

/// Result type for info database operations.
pub type Result<T> = std::result::Result<T, Error>;
