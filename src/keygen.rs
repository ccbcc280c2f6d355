//! License key generation.
//!
//! Keys are 24 bytes from the operating system CSPRNG, hex-encoded in
//! uppercase and split into hyphen-separated groups of four characters.
//! There is no fallback generator: if the OS cannot supply entropy, issuing
//! keys fails.

use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

/// Random bytes per key (192 bits).
pub const KEY_BYTES: usize = 24;

const GROUP_LEN: usize = 4;
const SEPARATOR: char = '-';

/// Length of a generated key including separators.
pub const KEY_LEN: usize = KEY_BYTES * 2 + (KEY_BYTES * 2 / GROUP_LEN) - 1;

#[derive(Debug, Error)]
#[error("Secure random source unavailable: {0}")]
pub struct EntropyError(#[from] rand::Error);

/// Generate a fresh license key.
///
/// Uniqueness is enforced by the store, not here.
pub fn generate_license_key() -> Result<String, EntropyError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(format_key(&bytes))
}

fn format_key(bytes: &[u8]) -> String {
    let hex = hex::encode_upper(bytes);
    let mut key = String::with_capacity(KEY_LEN);
    for (i, c) in hex.chars().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            key.push(SEPARATOR);
        }
        key.push(c);
    }
    key
}

/// Whether `key` has the shape of a generated key.
pub fn is_well_formed(key: &str) -> bool {
    key.len() == KEY_LEN
        && key.split(SEPARATOR).all(|group| {
            group.len() == GROUP_LEN
                && group
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}
