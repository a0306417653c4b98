//! Child ranges.

use std::ops::Range;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A contiguous run of child records, `[index, index + count)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Span {
    pub index: u32,
    pub count: u32,
}

impl Span {
    /// An empty span starting at `index`.
    #[inline]
    pub const fn at(index: u32) -> Self {
        Self { index, count: 0 }
    }

    /// The covered index range.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        let index = self.index as usize;
        index..index + self.count as usize
    }

    /// Index one past the last child.
    #[inline]
    pub fn end(&self) -> u64 {
        self.index as u64 + self.count as u64
    }
}
