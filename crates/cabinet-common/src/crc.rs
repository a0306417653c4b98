//! CRC32C hashing utilities.
//!
//! CRC32C (Castagnoli) is used to fingerprint the binary layout of the info
//! database so that files written by a different build are rejected.

/// Compute CRC32C hash of a byte slice.
///
/// Uses hardware acceleration when available (SSE4.2 on x86).
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Compute CRC32C hash of a byte slice with a seed value.
///
/// This continues a previous CRC computation.
#[inline]
pub fn hash_bytes_with_seed(data: &[u8], seed: u32) -> u32 {
    crc32c::crc32c_append(seed, data)
}

/// Hash a sequence of struct sizes, seeded with a format revision.
///
/// Each size is folded in as a little-endian `u32`, so reordering fields of
/// the same size is not detected but any size change is.
pub fn hash_sizes(revision: u32, sizes: &[usize]) -> u32 {
    sizes.iter().fold(hash_bytes(&revision.to_le_bytes()), |acc, &size| {
        hash_bytes_with_seed(&(size as u32).to_le_bytes(), acc)
    })
}
