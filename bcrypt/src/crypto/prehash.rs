//! Enhanced entropy: compress the password through SHA-2 (optionally keyed
//! with HMAC) before bcrypt sees it, lifting the 72 byte input ceiling.
//!
//! The digest is rendered with standard padded base64, not bcrypt's alphabet,
//! and the resulting text becomes the bcrypt key.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::codec::hash::Version;
use crate::error::BcryptError;

/// SHA-2 width used by the pre-hash.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    Sha256,
    #[default]
    Sha384,
    Sha512,
}

/// How the password is turned into bcrypt key material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preprocessing<'k> {
    /// Password bytes are used directly.
    #[default]
    None,
    Digest(DigestKind),
    /// HMAC-SHA-2 with an application-wide secret.
    Hmac { kind: DigestKind, key: &'k [u8] },
}

impl Preprocessing<'_> {
    pub fn is_enhanced(&self) -> bool {
        !matches!(self, Preprocessing::None)
    }
}

fn digest(kind: DigestKind, data: &[u8]) -> Zeroizing<Vec<u8>> {
    let out = match kind {
        DigestKind::Sha256 => Sha256::digest(data).to_vec(),
        DigestKind::Sha384 => Sha384::digest(data).to_vec(),
        DigestKind::Sha512 => Sha512::digest(data).to_vec(),
    };
    Zeroizing::new(out)
}

fn hmac_failed(err: hmac::digest::InvalidLength) -> BcryptError {
    BcryptError::InvalidArgument(format!("hmac failed: {err}"))
}

fn keyed_digest(kind: DigestKind, key: &[u8], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, BcryptError> {
    let tag = match kind {
        DigestKind::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(hmac_failed)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        DigestKind::Sha384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key).map_err(hmac_failed)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        DigestKind::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(hmac_failed)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(Zeroizing::new(tag))
}

/// Builds the bcrypt key for `password`: raw UTF-8 bytes, or the encoded
/// digest for the enhanced modes. A NUL terminator is appended for every
/// revision that carries a minor character.
pub fn preprocess(password: &str, version: Version, mode: &Preprocessing<'_>) -> Result<Zeroizing<Vec<u8>>, BcryptError> {
    let mut key = match mode {
        Preprocessing::None => Zeroizing::new(password.as_bytes().to_vec()),
        Preprocessing::Digest(kind) => {
            let digest = digest(*kind, password.as_bytes());
            Zeroizing::new(STANDARD.encode(digest.as_slice()).into_bytes())
        }
        Preprocessing::Hmac { kind, key } => {
            let tag = keyed_digest(*kind, key, password.as_bytes())?;
            Zeroizing::new(STANDARD.encode(tag.as_slice()).into_bytes())
        }
    };

    if version.appends_nul() {
        key.push(0);
    }
    Ok(key)
}
