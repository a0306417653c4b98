//! Deduplicating string table with inline small strings.
//!
//! A [`StringRef`] is a 32-bit value that is either an offset into the table
//! blob or, when bit 31 is set, a string of up to [`SMALL_STRING_MAX`]
//! characters packed directly into the reference. Short identifiers such as
//! ROM regions, device tags and years never touch the blob.
//!
//! Layout of a small string reference:
//!
//! ```text
//!  31  30  29      24 23      18 17      12 11       6 5        0
//! [ 1 | 0 | code[4]  | code[3]  | code[2]  | code[1]  | code[0]  ]
//! ```
//!
//! Codes index the alphabet `a-z 0-9 A-Z _` starting at 1; code 0 ends the
//! string.

use std::fmt;
use std::ops::Deref;

use byteorder::{LittleEndian, WriteBytesExt};
use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Maximum number of characters in an inline small string.
pub const SMALL_STRING_MAX: usize = 5;

const SMALL_FLAG: u32 = 1 << 31;
const CODE_BITS: u32 = 6;
const CODE_MASK: u32 = (1 << CODE_BITS) - 1;

/// Largest offset a table reference may hold.
const MAX_OFFSET: u64 = (SMALL_FLAG - 1) as u64;

const ALPHABET: &[u8; 63] = b"abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_";

/// Reference to a string, either inline or in the string table.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct StringRef {
    value: u32,
}

impl StringRef {
    /// The empty string.
    pub const EMPTY: Self = Self { value: SMALL_FLAG };

    /// Create a reference from its raw value.
    #[inline]
    pub const fn from_raw(value: u32) -> Self {
        Self { value }
    }

    /// Get the raw value.
    #[inline]
    pub fn raw(&self) -> u32 {
        self.value
    }

    /// Check whether the string is stored inline.
    #[inline]
    pub fn is_small(&self) -> bool {
        self.raw() & SMALL_FLAG != 0
    }

    /// Get the table offset, if this is a table reference.
    #[inline]
    pub fn offset(&self) -> Option<u32> {
        (!self.is_small()).then(|| self.raw())
    }
}

impl Default for StringRef {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[inline]
fn encode_char(c: u8) -> Option<u32> {
    let code = match c {
        b'a'..=b'z' => c - b'a' + 1,
        b'0'..=b'9' => c - b'0' + 27,
        b'A'..=b'Z' => c - b'A' + 37,
        b'_' => 63,
        _ => return None,
    };
    Some(code as u32)
}

/// Try to pack `s` into an inline reference.
///
/// Returns `None` when `s` is too long or uses characters outside the
/// alphabet.
pub fn encode_small(s: &str) -> Option<StringRef> {
    let bytes = s.as_bytes();
    if bytes.len() > SMALL_STRING_MAX {
        return None;
    }
    let mut value = SMALL_FLAG;
    for (i, &c) in bytes.iter().enumerate() {
        value |= encode_char(c)? << (CODE_BITS * i as u32);
    }
    Some(StringRef::from_raw(value))
}

/// An inline string decoded from a [`StringRef`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmallString {
    bytes: [u8; SMALL_STRING_MAX],
    len: u8,
}

impl SmallString {
    fn decode(value: u32) -> Self {
        let mut bytes = [0u8; SMALL_STRING_MAX];
        let mut len = 0;
        for slot in bytes.iter_mut() {
            let code = (value >> (CODE_BITS * len as u32)) & CODE_MASK;
            if code == 0 {
                break;
            }
            *slot = ALPHABET[code as usize - 1];
            len += 1;
        }
        Self { bytes, len }
    }

    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        // The alphabet is ASCII, so this never fails.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }
}

impl fmt::Debug for SmallString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// A string resolved from a [`StringRef`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Text<'a> {
    /// Decoded from the reference itself.
    Inline(SmallString),
    /// Borrowed from the string table.
    Table(&'a str),
}

impl<'a> Text<'a> {
    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline(s) => s.as_str(),
            Self::Table(s) => s,
        }
    }

    /// Copy into an owned `String`.
    pub fn to_owned_string(&self) -> String {
        self.as_str().to_owned()
    }
}

impl Deref for Text<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for Text<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Text<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Resolve a reference against a string table blob.
pub fn resolve(data: &[u8], reference: StringRef) -> Result<Text<'_>> {
    let Some(offset) = reference.offset() else {
        return Ok(Text::Inline(SmallString::decode(reference.raw())));
    };
    let tail = data
        .get(offset as usize..)
        .filter(|tail| !tail.is_empty())
        .ok_or(Error::StringOutOfBounds(offset))?;
    let end = memchr::memchr(0, tail).ok_or(Error::StringOutOfBounds(offset))?;
    let s = std::str::from_utf8(&tail[..end]).map_err(cabinet_common::Error::from)?;
    Ok(Text::Table(s))
}

/// Append-only string table that deduplicates its entries.
#[derive(Debug)]
pub struct StringTable {
    data: Vec<u8>,
    offsets: FxHashMap<String, u32>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    /// Create an empty table with no capacity reserved.
    pub fn new() -> Self {
        Self { data: Vec::new(), offsets: FxHashMap::default() }
    }

    /// Create a table with room for `bytes` of string data and `entries`
    /// distinct strings.
    pub fn with_capacity(bytes: usize, entries: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            offsets: FxHashMap::with_capacity_and_hasher(entries, Default::default()),
        }
    }

    /// Intern a string, returning a stable reference to it.
    ///
    /// Interning the same string twice returns the same reference.
    pub fn intern(&mut self, s: &str) -> Result<StringRef> {
        if let Some(small) = encode_small(s) {
            return Ok(small);
        }
        if let Some(&offset) = self.offsets.get(s) {
            return Ok(StringRef::from_raw(offset));
        }

        let offset = self.data.len() as u64;
        if offset > MAX_OFFSET {
            return Err(Error::Overflow { value: offset, bits: 31 });
        }
        let offset = offset as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_owned(), offset);
        Ok(StringRef::from_raw(offset))
    }

    /// Append a raw little-endian word, used for table sentinels.
    pub fn embed_value(&mut self, value: u32) {
        // Writing into a Vec cannot fail.
        let _ = self.data.write_u32::<LittleEndian>(value);
    }

    /// Resolve a reference, reporting references this table never issued.
    pub fn try_lookup(&self, reference: StringRef) -> Result<Text<'_>> {
        resolve(&self.data, reference)
    }

    /// Resolve a reference, falling back to the empty string.
    pub fn lookup(&self, reference: StringRef) -> Text<'_> {
        self.try_lookup(reference).unwrap_or(Text::Table(""))
    }

    /// Raw table bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of distinct strings stored in the blob.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Check if no strings are stored in the blob.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Size of the blob in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.intern("Galaxian (Namco set 1)").unwrap();
        let len = table.byte_len();
        let b = table.intern("Galaxian (Namco set 1)").unwrap();
        assert_eq!(a, b);
        assert_eq!(table.byte_len(), len);
        assert_eq!(table.lookup(a), "Galaxian (Namco set 1)");
    }

    #[test]
    fn test_small_string_boundary() {
        let mut table = StringTable::new();

        let five = table.intern("cpu_1").unwrap();
        assert!(five.is_small());
        assert_eq!(table.byte_len(), 0);
        assert_eq!(table.lookup(five), "cpu_1");

        let six = table.intern("maincp").unwrap();
        assert!(!six.is_small());
        assert_eq!(table.byte_len(), 7);
        assert_eq!(table.lookup(six), "maincp");
    }

    #[test]
    fn test_out_of_alphabet_goes_to_table() {
        let mut table = StringTable::new();
        for s in [":cpu", "a-b", "1.5", "é"] {
            let r = table.intern(s).unwrap();
            assert!(!r.is_small(), "{s} should not be inline");
            assert_eq!(table.lookup(r), s);
        }
    }

    #[test]
    fn test_empty_string_is_small() {
        let mut table = StringTable::new();
        let r = table.intern("").unwrap();
        assert_eq!(r, StringRef::EMPTY);
        assert_eq!(table.lookup(r), "");
        assert!(table.is_empty());
    }

    #[test]
    fn test_alphabet_round_trip() {
        for s in ["a", "z", "0", "9", "A", "Z", "_", "Zz_90", "1980"] {
            let r = encode_small(s).unwrap();
            assert_eq!(Text::Inline(SmallString::decode(r.raw())), s);
        }
    }

    #[test]
    fn test_unknown_offset_is_error() {
        let mut table = StringTable::new();
        table.intern("pacman_ms").unwrap();
        assert!(table.try_lookup(StringRef::from_raw(4096)).is_err());
        assert_eq!(table.lookup(StringRef::from_raw(4096)), "");
    }

    #[test]
    fn test_embedded_sentinel_offsets() {
        let mut table = StringTable::new();
        table.embed_value(0xDEAD_BEEF);
        let r = table.intern("namcos1_cpu").unwrap();
        assert_eq!(r.offset(), Some(4));
        assert_eq!(&table.data()[..4], &0xDEAD_BEEFu32.to_le_bytes());
    }
}
