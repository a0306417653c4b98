//! BIOS sets, ROM and disk images, and samples.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::StringRef;

/// Selectable BIOS for a machine.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Biosset {
    pub name: StringRef,
    pub description: StringRef,
    pub default: u8,
}

/// ROM image.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Rom {
    pub name: StringRef,
    pub bios: StringRef,
    pub size: u32,
    pub merge: StringRef,
    pub region: StringRef,
    pub offset: u64,
    pub crc: [u8; 4],
    pub sha1: [u8; 20],
    /// [`DumpStatus`](crate::DumpStatus)
    pub status: u8,
    pub optional: u8,
}

/// CHD disk image.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Disk {
    pub name: StringRef,
    pub merge: StringRef,
    pub region: StringRef,
    pub index: u32,
    pub sha1: [u8; 20],
    pub writable: u8,
    pub status: u8,
    pub optional: u8,
}

/// Audio sample.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Sample {
    pub name: StringRef,
}
