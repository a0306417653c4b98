//! Packed on-disk record layouts.
//!
//! Every record is a `#[repr(C, packed)]` struct read and written with
//! zerocopy. String fields hold [`StringRef`](crate::StringRef) values and
//! child collections are [`Span`]s into the next table down.

mod configuration;
mod device;
mod hardware;
mod header;
mod machine;
mod media;
mod span;

pub use configuration::{Configuration, ConfigurationCondition, ConfigurationSetting};
pub use device::{Device, RamOption, Slot, SlotOption, SoftwareList};
pub use hardware::{Chip, Display, Feature};
pub use header::{
    layout_hash, Header, TableCounts, FORMAT_REVISION, MAGIC_HDR, MAGIC_STRINGTABLE_BEGIN,
    MAGIC_STRINGTABLE_END, PEPPER,
};
pub use machine::Machine;
pub use media::{Biosset, Disk, Rom, Sample};
pub use span::Span;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A fixed-size record stored in one of the database tables.
pub trait Record: FromBytes + IntoBytes + Immutable + KnownLayout + Copy {
    /// Table name used in diagnostics.
    const TABLE: &'static str;
}

macro_rules! impl_record {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(impl Record for $ty {
            const TABLE: &'static str = $name;
        })+
    };
}

impl_record! {
    Machine => "machines",
    Biosset => "biossets",
    Rom => "roms",
    Disk => "disks",
    Device => "devices",
    Slot => "slots",
    SlotOption => "slot_options",
    Feature => "features",
    Chip => "chips",
    Display => "displays",
    Sample => "samples",
    Configuration => "configurations",
    ConfigurationSetting => "configuration_settings",
    ConfigurationCondition => "configuration_conditions",
    SoftwareList => "software_lists",
    RamOption => "ram_options",
}
