//! Talking to the emulator.
//!
//! The emulator runs as a child process with a worker plugin loaded. Commands
//! go in on stdin, one per line; responses and asynchronous status pushes come
//! back on stdout (see [`protocol`]).
//!
//! - [`WorkerController`] drives one command at a time over any
//!   reader/writer pair
//! - [`Session`] owns a running emulator on a worker thread and bridges it to
//!   the caller with a command queue and an event channel
//! - [`ListXmlTask`] turns `-listxml` output into an info database
//!
//! ```no_run
//! use cabinet_worker::{LaunchOptions, Session, SessionEvent};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let args = LaunchOptions::new("pacman").arguments();
//! let session = Session::launch("mame", &args, tx)?;
//! session.issue(&["pause"])?;
//! for event in rx {
//!     if let SessionEvent::Completed { success, .. } = event {
//!         println!("done: {success}");
//!         break;
//!     }
//! }
//! # Ok::<(), cabinet_worker::WorkerError>(())
//! ```

mod controller;
mod emu_error;
mod error;
mod launch;
mod listxml;
mod session;
mod status;
mod version;

pub mod protocol;

pub use controller::{scrape_startup_error, ChatterFn, WorkerController};
pub use emu_error::EmuError;
pub use error::{WorkerError, WorkerResult};
pub use launch::{LaunchOptions, SearchPaths};
pub use listxml::{ListXmlEvent, ListXmlStatus, ListXmlTask};
pub use protocol::{build_command, ChatterType, Response, ResponseKind};
pub use session::{Session, SessionEvent};
pub use status::{ImageStatus, StatusParseError, StatusState, StatusUpdate};
pub use version::{parse_version_output, query_version};
