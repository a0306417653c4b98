//! XOR salting of fixed-size structures.
//!
//! Salting is tamper evidence for the database header, not encryption: the
//! same call salts and un-salts.

use zerocopy::{FromBytes, IntoBytes};

/// XOR `data` in place with `salt`, repeating the salt as needed.
pub fn salt_in_place(data: &mut [u8], salt: &[u8]) {
    if salt.is_empty() {
        return;
    }
    for (byte, pepper) in data.iter_mut().zip(salt.iter().cycle()) {
        *byte ^= pepper;
    }
}

/// Return a salted copy of a fixed-size struct.
pub fn salt<T>(value: &T, salt: &[u8]) -> T
where
    T: FromBytes + IntoBytes + Copy,
{
    let mut result = *value;
    salt_in_place(result.as_mut_bytes(), salt);
    result
}
