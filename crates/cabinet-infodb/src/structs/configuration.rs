//! Configuration switches, DIP switches and their settings.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::Span;
use crate::StringRef;

/// A configuration or DIP switch bank.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Configuration {
    pub name: StringRef,
    pub tag: StringRef,
    pub mask: u32,
    pub settings: Span,
}

/// One selectable value of a configuration.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ConfigurationSetting {
    pub name: StringRef,
    pub value: u32,
    pub conditions: Span,
}

/// Condition under which a setting is visible.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ConfigurationCondition {
    pub tag: StringRef,
    pub mask: u32,
    pub value: u32,
    /// [`Relation`](crate::Relation)
    pub relation: u8,
}
