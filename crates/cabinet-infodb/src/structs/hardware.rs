//! Emulation features, chips and displays.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::StringRef;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Feature {
    /// [`FeatureType`](crate::FeatureType)
    pub type_: u8,
    /// [`FeatureQuality`](crate::FeatureQuality)
    pub status: u8,
    pub overall: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Chip {
    pub name: StringRef,
    pub tag: StringRef,
    pub clock: u64,
    /// [`ChipType`](crate::ChipType)
    pub type_: u8,
}

/// Screen. Absent numeric attributes are all-ones; absent refresh is NaN.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Display {
    pub tag: StringRef,
    pub width: u32,
    pub height: u32,
    pub refresh: f32,
    pub pixclock: u64,
    pub htotal: u32,
    pub hbend: u32,
    pub hbstart: u32,
    pub vtotal: u32,
    pub vbend: u32,
    pub vbstart: u32,
    /// [`DisplayType`](crate::DisplayType)
    pub type_: u8,
    /// [`Rotation`](crate::Rotation)
    pub rotate: u8,
    pub flipx: u8,
}
