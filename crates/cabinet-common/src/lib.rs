//! Common utilities for Cabinet.
//!
//! This crate provides foundational types and utilities used across the Cabinet crates:
//!
//! - [`BinaryReader`] - Zero-copy reading of headers and record tables from byte slices
//! - [`crc`] - CRC32C hashing, used for the database layout hash
//! - [`salt`] - XOR salting of fixed-size headers
//! - [`hex`] - Fixed-length hex decoding for checksums
//! - [`narrow_u32`] - Checked narrowing into 32-bit binary fields

mod error;
mod narrow;
mod reader;

pub mod crc;
pub mod hex;
pub mod salt;

pub use error::{Error, Result};
pub use narrow::narrow_u32;
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
