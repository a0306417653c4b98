//! Machine-info database for an emulator front-end.
//!
//! The emulator describes every machine it supports in one large XML
//! document (`-listxml`). This crate streams that document into a compact
//! binary file and loads it back with zero-copy typed views.
//!
//! # Architecture
//!
//! - **String table** ([`StringTable`]): deduplicated strings, with short
//!   identifiers packed straight into the 32-bit [`StringRef`]
//! - **Builder** ([`InfoDbBuilder`]): path-keyed XML callbacks append packed
//!   records to sixteen tables, then finalize sorts machines by name and
//!   resolves clone/ROM references
//! - **Loader** ([`InfoDatabase`]): validates the salted header, layout hash,
//!   version and sentinels, then exposes [`Table`]s of [`Entry`]s
//!
//! # File layout
//!
//! ```text
//! [salted Header][machines][biossets][roms][disks][devices][slots]
//! [slot_options][features][chips][displays][samples][configurations]
//! [configuration_settings][configuration_conditions][software_lists]
//! [ram_options][string table: BEGIN magic, strings..., END magic]
//! ```

mod builder;
mod database;
mod error;
mod strings;
mod types;
mod views;

pub mod structs;
pub mod xml;

pub use builder::{InfoDbBuilder, Progress};
pub use database::{Entry, InfoDatabase, Table};
pub use error::{Error, Result, StaleReason};
pub use strings::{encode_small, SmallString, StringRef, StringTable, Text, SMALL_STRING_MAX};
pub use types::{
    parse_bool, parse_supported, ChipType, DisplayType, DriverQuality, DumpStatus, FeatureQuality,
    FeatureType, Relation, Rotation, SoftwareListStatus, Tristate,
};

/// Index value for a machine reference that did not resolve.
pub const NOT_FOUND: u32 = u32::MAX;
