//! Machine records.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::Span;
use crate::StringRef;

/// A machine (driver, BIOS or device) described by the emulator.
///
/// `clone_of` and `rom_of` hold machine indices once the database is
/// finalized, or `NOT_FOUND` when the referenced machine does not exist.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Machine {
    pub name: StringRef,
    pub sourcefile: StringRef,
    pub clone_of: u32,
    pub rom_of: u32,
    pub description: StringRef,
    pub year: StringRef,
    pub manufacturer: StringRef,
    pub biossets: Span,
    pub roms: Span,
    pub disks: Span,
    pub devices: Span,
    pub slots: Span,
    pub features: Span,
    pub chips: Span,
    pub displays: Span,
    pub samples: Span,
    pub configurations: Span,
    pub software_lists: Span,
    pub ram_options: Span,
    /// Tristate; defaults to true.
    pub runnable: u8,
    pub is_bios: u8,
    pub is_device: u8,
    pub is_mechanical: u8,
    /// [`DriverQuality`](crate::DriverQuality) values.
    pub quality_status: u8,
    pub quality_emulation: u8,
    pub quality_cocktail: u8,
    pub save_state_supported: u8,
    pub unofficial: u8,
    pub incomplete: u8,
    /// `0xFF` when the machine has no `sound` element.
    pub sound_channels: u8,
}
