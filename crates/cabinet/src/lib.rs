//! Cabinet - core of a graphical front-end for a multi-system emulator.
//!
//! This crate provides a unified interface to the Cabinet library crates.
//!
//! # Crates
//!
//! - [`cabinet_common`] - Common utilities (binary reading, CRC32C, salting)
//! - [`cabinet_infodb`] - Machine-info database built from `-listxml`
//! - [`cabinet_worker`] - Worker protocol, emulator sessions and tasks
//!
//! # Example
//!
//! ```no_run
//! use cabinet::prelude::*;
//!
//! let db = InfoDatabase::open("mame.infodb", None)?;
//! if let Some(machine) = db.find_machine("pacman") {
//!     println!("{} ({})", machine.description(), machine.year());
//!     if let Some(parent) = machine.clone_of() {
//!         println!("clone of {}", parent.name());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use cabinet_common as common;
pub use cabinet_infodb as infodb;
pub use cabinet_worker as worker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use cabinet_infodb::{Entry, InfoDatabase, InfoDbBuilder, Table, Tristate};
    pub use cabinet_worker::{
        EmuError, LaunchOptions, ListXmlEvent, ListXmlStatus, ListXmlTask, SearchPaths, Session,
        SessionEvent, StatusState, StatusUpdate,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
