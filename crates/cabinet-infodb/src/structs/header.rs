//! Database header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::*;
use crate::StringRef;

/// Header magic (`"CBIN"` little-endian).
pub const MAGIC_HDR: u32 = 0x4E49_4243;

/// Sentinel written at the start of the string table.
pub const MAGIC_STRINGTABLE_BEGIN: u32 = 0x5354_4246;

/// Sentinel written at the end of the string table.
pub const MAGIC_STRINGTABLE_END: u32 = 0x5354_4245;

/// Bumped whenever field meaning changes without a size change.
pub const FORMAT_REVISION: u32 = 1;

/// XOR pepper applied to the header before it is written.
pub const PEPPER: [u8; 16] = [
    0x9E, 0x37, 0x79, 0xB9, 0x7F, 0x4A, 0x7C, 0x15, 0xF3, 0x9C, 0xC0, 0x60, 0x5C, 0xED, 0xC8, 0x34,
];

/// Number of records in each table, in file order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct TableCounts {
    pub machines: u32,
    pub biossets: u32,
    pub roms: u32,
    pub disks: u32,
    pub devices: u32,
    pub slots: u32,
    pub slot_options: u32,
    pub features: u32,
    pub chips: u32,
    pub displays: u32,
    pub samples: u32,
    pub configurations: u32,
    pub configuration_settings: u32,
    pub configuration_conditions: u32,
    pub software_lists: u32,
    pub ram_options: u32,
}

/// The fixed-size header at the start of every database file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Header {
    pub magic: u32,
    pub sizes_hash: u32,
    /// Emulator build string from the document root.
    pub build: StringRef,
    pub counts: TableCounts,
}

/// Hash of every record layout, stored in the header as `sizes_hash`.
pub fn layout_hash() -> u32 {
    use std::mem::size_of;

    cabinet_common::crc::hash_sizes(
        FORMAT_REVISION,
        &[
            size_of::<Header>(),
            size_of::<Machine>(),
            size_of::<Biosset>(),
            size_of::<Rom>(),
            size_of::<Disk>(),
            size_of::<Device>(),
            size_of::<Slot>(),
            size_of::<SlotOption>(),
            size_of::<Feature>(),
            size_of::<Chip>(),
            size_of::<Display>(),
            size_of::<Sample>(),
            size_of::<Configuration>(),
            size_of::<ConfigurationSetting>(),
            size_of::<ConfigurationCondition>(),
            size_of::<SoftwareList>(),
            size_of::<RamOption>(),
        ],
    )
}
