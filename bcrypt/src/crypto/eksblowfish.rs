//! The expensive key schedule and the 64-round ciphertext pass that turn a
//! key, a salt and a cost into the raw 24-byte bcrypt digest.

use zeroize::Zeroize;

use super::blowfish::CipherState;
use crate::error::BcryptError;

/// Raw salt size in bytes.
pub const SALT_LEN: usize = 16;

/// Raw digest size in bytes, before the last byte is dropped by the encoder.
pub const DIGEST_LEN: usize = 24;

/// Lowest cost this library will compute.
pub const MIN_COST: u32 = 4;

/// Highest cost; `1 << 31` rounds still fits in a `u32`.
pub const MAX_COST: u32 = 31;

const ENCRYPT_ROUNDS: usize = 64;

/// "OrpheanBeholderScryDoubt" as six big-endian words.
const CIPHERTEXT: [u32; 6] = {
    let text = b"OrpheanBeholderScryDoubt";
    let mut words = [0_u32; 6];
    let mut i = 0;
    while i < words.len() {
        words[i] = u32::from_be_bytes([text[4 * i], text[4 * i + 1], text[4 * i + 2], text[4 * i + 3]]);
        i += 1;
    }
    words
};

/// Computes the raw digest.
///
/// `input` is used exactly as given: callers append the NUL terminator for
/// revisions that require it. Only the first 72 bytes influence the result.
pub fn crypt_raw(input: &[u8], salt: &[u8], cost: u32) -> Result<[u8; DIGEST_LEN], BcryptError> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(BcryptError::InvalidCost(cost));
    }
    if salt.len() != SALT_LEN {
        return Err(BcryptError::InvalidSaltLength(salt.len()));
    }

    let rounds = 1_u32.checked_shl(cost).filter(|rounds| *rounds >= 1).ok_or(BcryptError::InvalidCost(cost))?;

    let mut state = CipherState::new();
    state.enhanced_key_schedule(salt, input);
    for _ in 0..rounds {
        state.key_schedule(input);
        state.key_schedule(salt);
    }

    let mut cdata = CIPHERTEXT;
    for _ in 0..ENCRYPT_ROUNDS {
        for offset in (0..cdata.len()).step_by(2) {
            state.encipher_block(&mut cdata, offset);
        }
    }

    let mut digest = [0_u8; DIGEST_LEN];
    for (chunk, word) in digest.chunks_exact_mut(4).zip(cdata.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    cdata.zeroize();

    Ok(digest)
}
