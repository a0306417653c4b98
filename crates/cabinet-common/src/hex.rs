//! Fixed-length hex decoding.

#[inline]
fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode hex digit pairs into `dest`, stopping at the first bad pair.
///
/// Returns the number of bytes written. Bytes past that point are left
/// untouched.
pub fn decode_into(dest: &mut [u8], hex: &str) -> usize {
    let hex = hex.as_bytes();
    let mut pos = 0;
    while pos < dest.len() && pos * 2 + 1 < hex.len() {
        let (Some(hi), Some(lo)) = (hex_digit(hex[pos * 2]), hex_digit(hex[pos * 2 + 1])) else {
            break;
        };
        dest[pos] = (hi << 4) | lo;
        pos += 1;
    }
    pos
}

/// Decode an optional hex string into a fixed-size array.
///
/// The unconsumed remainder is zero-filled. The flag is `true` only when
/// exactly `N` bytes were decoded, which callers use to flag a malformed
/// checksum without rejecting the record.
pub fn decode_fixed<const N: usize>(hex: Option<&str>) -> ([u8; N], bool) {
    let mut dest = [0u8; N];
    let pos = hex.map_or(0, |h| decode_into(&mut dest, h));
    (dest, pos == N)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_crc() {
        let (crc, ok) = decode_fixed::<4>(Some("c1e6ab10"));
        assert!(ok);
        assert_eq!(crc, [0xC1, 0xE6, 0xAB, 0x10]);
    }

    #[test]
    fn test_decode_short_zero_pads() {
        let (crc, ok) = decode_fixed::<4>(Some("c1e6"));
        assert!(!ok);
        assert_eq!(crc, [0xC1, 0xE6, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_malformed_stops() {
        let (crc, ok) = decode_fixed::<4>(Some("c1zz6ab1"));
        assert!(!ok);
        assert_eq!(crc, [0xC1, 0, 0, 0]);
    }

    #[test]
    fn test_decode_odd_length() {
        let (crc, ok) = decode_fixed::<2>(Some("abc"));
        assert!(!ok);
        assert_eq!(crc, [0xAB, 0]);
    }

    #[test]
    fn test_decode_absent() {
        let (sha1, ok) = decode_fixed::<20>(None);
        assert!(!ok);
        assert_eq!(sha1, [0u8; 20]);
    }
}
