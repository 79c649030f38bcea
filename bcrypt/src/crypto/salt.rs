//! Random salt generation.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use super::eksblowfish::{MAX_COST, MIN_COST, SALT_LEN};
use crate::codec::hash::{self, Version};
use crate::error::BcryptError;

/// Work factor used when the caller does not pick one.
pub const DEFAULT_COST: u32 = 10;

/// Fills a fresh salt from the operating system's CSPRNG.
pub fn generate_salt_bytes() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Builds a `$2<minor>$<cost>$<salt>` settings string with a random salt.
///
/// The cost must be in `4..=31` and `minor` one of `a`, `b`, `x` or `y`;
/// nothing is clamped or substituted.
pub fn generate_salt(cost: u32, minor: char) -> Result<String, BcryptError> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(BcryptError::InvalidCost(cost));
    }
    let version = Version::from_minor(minor)
        .ok_or_else(|| BcryptError::InvalidArgument(format!("invalid bcrypt minor revision {minor:?}")))?;

    debug!(%version, cost, "generating salt");
    hash::format_salt(version, cost, &generate_salt_bytes())
}
