//! Devices, slots, software lists and RAM options.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::Span;
use crate::StringRef;

/// Image device (cartridge slot, floppy drive, ...).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Device {
    pub type_: StringRef,
    pub tag: StringRef,
    pub interface: StringRef,
    pub instance_name: StringRef,
    /// Comma-terminated list of file extensions, e.g. `"bin,rom,"`.
    pub extensions: StringRef,
    pub mandatory: u8,
}

/// Pluggable slot.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Slot {
    pub name: StringRef,
    pub slot_options: Span,
}

/// A device that can be plugged into a slot.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SlotOption {
    pub name: StringRef,
    pub devname: StringRef,
    pub is_default: u8,
}

/// Software list supported by a machine.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SoftwareList {
    pub name: StringRef,
    pub filter: StringRef,
    /// [`SoftwareListStatus`](crate::SoftwareListStatus)
    pub status: u8,
}

/// Selectable RAM size.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RamOption {
    pub name: StringRef,
    pub value: u32,
    pub is_default: u8,
}
