//! Checked narrowing casts.

use crate::{Error, Result};

/// Narrow a value into a `u32`, failing if it does not round-trip exactly.
///
/// Every count, index and size written into the info database goes through
/// this; a value that does not fit is a format violation, not a tolerable
/// per-record defect.
#[inline]
pub fn narrow_u32<T>(value: T) -> Result<u32>
where
    T: TryInto<u32> + TryInto<u64> + Copy,
{
    TryInto::<u32>::try_into(value).map_err(|_| Error::Overflow {
        value: TryInto::<u64>::try_into(value).unwrap_or(u64::MAX),
        bits: 32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_fits() {
        assert_eq!(narrow_u32(0u64).unwrap(), 0);
        assert_eq!(narrow_u32(u32::MAX as u64).unwrap(), u32::MAX);
        assert_eq!(narrow_u32(7u32).unwrap(), 7);
        assert_eq!(narrow_u32(12usize).unwrap(), 12);
    }

    #[test]
    fn test_narrow_overflow() {
        let err = narrow_u32(u32::MAX as u64 + 1).unwrap_err();
        match err {
            Error::Overflow { value, bits } => {
                assert_eq!(value, 1u64 << 32);
                assert_eq!(bits, 32);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
