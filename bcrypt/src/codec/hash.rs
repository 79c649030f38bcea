//! Parsing and assembly of `$2x$NN$<salt><digest>` strings.
//!
//! Two levels of strictness live here: [`parse_salt`] accepts anything that
//! starts with a well-formed settings block and salt (a bare salt, or a full
//! hash whose trailing digest is ignored), while [`is_valid_hash`] demands the
//! complete canonical layout before anything is read from it.

use std::fmt;

use crate::codec::base64;
use crate::crypto::eksblowfish::{DIGEST_LEN, SALT_LEN};
use crate::error::BcryptError;

/// Encoded salt length in symbols.
pub const SALT_B64_LEN: usize = 22;

/// Encoded digest length in symbols. Only 23 of the 24 digest bytes are kept.
pub const DIGEST_B64_LEN: usize = 31;

/// Bytes of the raw digest that make it into the hash string.
pub const ENCODED_DIGEST_BYTES: usize = DIGEST_LEN - 1;

/// Cost bounds accepted when reading hashes produced elsewhere.
pub const PARSE_MIN_COST: u32 = 1;
pub const PARSE_MAX_COST: u32 = 31;

/// bcrypt minor revision.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Version {
    /// The first `$2$` prefix without a minor revision character.
    Legacy,
    TwoA,
    #[default]
    TwoB,
    TwoX,
    TwoY,
}

impl Version {
    /// Maps a minor revision character to a version. Only `a`, `b`, `x` and
    /// `y` are accepted.
    pub fn from_minor(minor: char) -> Option<Self> {
        match minor {
            'a' => Some(Version::TwoA),
            'b' => Some(Version::TwoB),
            'x' => Some(Version::TwoX),
            'y' => Some(Version::TwoY),
            _ => None,
        }
    }

    pub fn minor(self) -> Option<char> {
        match self {
            Version::Legacy => None,
            Version::TwoA => Some('a'),
            Version::TwoB => Some('b'),
            Version::TwoX => Some('x'),
            Version::TwoY => Some('y'),
        }
    }

    /// Revisions after the legacy form hash the key together with its NUL
    /// terminator.
    pub fn appends_nul(self) -> bool {
        self.minor().is_some()
    }

    /// The `$2x$` prefix for this version.
    pub fn prefix(self) -> &'static str {
        match self {
            Version::Legacy => "$2$",
            Version::TwoA => "$2a$",
            Version::TwoB => "$2b$",
            Version::TwoX => "$2x$",
            Version::TwoY => "$2y$",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor() {
            Some(minor) => write!(f, "2{minor}"),
            None => write!(f, "2"),
        }
    }
}

/// Settings and salt pulled from the front of a salt or hash string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSalt<'a> {
    pub version: Version,
    pub cost: u32,
    pub salt: [u8; SALT_LEN],
    /// Whatever follows the salt; the digest when a full hash was supplied.
    pub remainder: &'a str,
}

/// Read-only view of a validated hash string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashInformation {
    /// `$2a$10` style settings block.
    pub settings: String,
    pub version: Version,
    pub work_factor: u32,
    /// Encoded salt followed by the encoded digest.
    pub raw_hash: String,
}

fn parse_cost(digits: &[u8]) -> Option<u32> {
    match digits {
        [tens @ b'0'..=b'9', ones @ b'0'..=b'9'] => {
            Some(u32::from(tens - b'0') * 10 + u32::from(ones - b'0'))
        }
        _ => None,
    }
}

/// Reads version, cost and salt from a salt string (`$2b$10$<22 symbols>`) or
/// from a complete hash.
pub fn parse_salt(salt: &str) -> Result<ParsedSalt<'_>, BcryptError> {
    if salt.is_empty() {
        return Err(BcryptError::InvalidArgument("salt cannot be empty".to_string()));
    }

    let bytes = salt.as_bytes();
    if !bytes.starts_with(b"$2") || bytes.len() < 3 {
        return Err(BcryptError::SaltParse("Invalid salt version".to_string()));
    }

    let (version, offset) = if bytes[2] == b'$' {
        (Version::Legacy, 3)
    } else {
        let version = Version::from_minor(char::from(bytes[2]))
            .filter(|_| bytes.get(3) == Some(&b'$'))
            .ok_or_else(|| BcryptError::SaltParse("Invalid salt revision".to_string()))?;
        (version, 4)
    };

    let cost = bytes
        .get(offset..offset + 2)
        .and_then(parse_cost)
        .filter(|_| bytes.get(offset + 2) == Some(&b'$'))
        .ok_or_else(|| BcryptError::SaltParse("Missing salt rounds".to_string()))?;

    if !(PARSE_MIN_COST..=PARSE_MAX_COST).contains(&cost) {
        return Err(BcryptError::SaltParse("Salt rounds out of range".to_string()));
    }

    let salt_start = offset + 3;
    let salt_end = salt_start + SALT_B64_LEN;
    let encoded = bytes
        .get(salt_start..salt_end)
        .ok_or_else(|| BcryptError::SaltParse("Salt too short".to_string()))?;
    if !encoded.iter().all(|&c| base64::is_alphabet_char(c)) {
        return Err(BcryptError::SaltParse("Invalid salt encoding".to_string()));
    }

    // the prefix is ASCII, so both slice points are char boundaries
    let decoded = base64::decode(&salt[salt_start..salt_end], SALT_LEN);
    let salt_bytes: [u8; SALT_LEN] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| BcryptError::SaltParse("Invalid salt encoding".to_string()))?;

    Ok(ParsedSalt {
        version,
        cost,
        salt: salt_bytes,
        remainder: &salt[salt_end..],
    })
}

/// Serializes version, cost and raw salt into a salt string.
pub fn format_salt(version: Version, cost: u32, salt: &[u8; SALT_LEN]) -> Result<String, BcryptError> {
    let encoded = base64::encode(salt, SALT_LEN)?;
    Ok(format!("{}{:02}${}", version.prefix(), cost, encoded))
}

/// Assembles the final hash string. The digest is truncated to 23 bytes
/// (31 symbols), as every bcrypt implementation does.
pub fn format_hash(
    version: Version,
    cost: u32,
    salt: &[u8; SALT_LEN],
    digest: &[u8; DIGEST_LEN],
) -> Result<String, BcryptError> {
    let mut hash = format_salt(version, cost, salt)?;
    hash.push_str(&base64::encode(digest, ENCODED_DIGEST_BYTES)?);
    Ok(hash)
}

/// Checks the full canonical layout: 59 characters for `$2$`, 60 with a minor
/// revision, a two digit cost in range and only alphabet symbols afterwards.
pub fn is_valid_hash(hash: &str) -> bool {
    settings_offset(hash).is_some()
}

/// Offset of the salt field in a valid hash.
fn settings_offset(hash: &str) -> Option<usize> {
    let bytes = hash.as_bytes();
    if !bytes.starts_with(b"$2") {
        return None;
    }

    let offset = match bytes.len() {
        59 if bytes[2] == b'$' => 3,
        60 if Version::from_minor(char::from(bytes[2])).is_some() && bytes[3] == b'$' => 4,
        _ => return None,
    };

    let cost = parse_cost(&bytes[offset..offset + 2])?;
    if !(PARSE_MIN_COST..=PARSE_MAX_COST).contains(&cost) || bytes[offset + 2] != b'$' {
        return None;
    }

    bytes[offset + 3..]
        .iter()
        .all(|&c| base64::is_alphabet_char(c))
        .then_some(offset + 3)
}

/// Splits a validated hash into its component parts.
pub fn hash_information(hash: &str) -> Result<HashInformation, BcryptError> {
    let salt_start = settings_offset(hash).ok_or_else(BcryptError::invalid_hash_format)?;
    let parsed = parse_salt(hash)?;

    Ok(HashInformation {
        settings: hash[..salt_start - 1].to_string(),
        version: parsed.version,
        work_factor: parsed.cost,
        raw_hash: hash[salt_start..].to_string(),
    })
}

/// Work factor embedded in a validated hash.
pub fn get_work_factor(hash: &str) -> Result<u32, BcryptError> {
    hash_information(hash).map(|info| info.work_factor)
}

/// The salt string (`$2b$10$<22 symbols>`) of a validated hash.
pub fn get_salt(hash: &str) -> Result<String, BcryptError> {
    let salt_start = settings_offset(hash).ok_or_else(BcryptError::invalid_hash_format)?;
    Ok(hash[..salt_start + SALT_B64_LEN].to_string())
}
