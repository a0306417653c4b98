//! Worker-specific error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while talking to an emulator process.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the emulator process.
    #[error("failed to spawn emulator process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to write to the emulator's stdin.
    #[error("failed to write to emulator: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to read from the emulator's stdout.
    #[error("failed to read from emulator: {0}")]
    ReadFailed(#[source] io::Error),

    /// The emulator closed its output while a response was expected.
    #[error("emulator process exited")]
    ProcessExited,

    /// A command was issued while another is still awaiting its response.
    #[error("a command is already awaiting a response")]
    CommandInFlight,

    /// The session has finished and no longer accepts commands.
    #[error("session is closed")]
    SessionClosed,

    /// Waiting for the session to finish timed out.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The emulator reported something other than a version string.
    #[error("unexpected emulator output: {0}")]
    UnexpectedOutput(String),

    /// Info database error.
    #[error("{0}")]
    InfoDb(#[from] cabinet_infodb::Error),

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WorkerError {
    /// Check if this error indicates the emulator has gone away.
    pub fn is_process_exited(&self) -> bool {
        matches!(self, Self::ProcessExited | Self::SessionClosed)
    }
}
