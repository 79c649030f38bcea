//! bcrypt's own base64 dialect. The alphabet starts with `./` and has no
//! padding, so it is *not* interchangeable with MIME base64.

use base64::alphabet::BCRYPT;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::BcryptError;

/// Symbol order used by every bcrypt implementation.
pub const ALPHABET: &[u8; 64] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Unpadded engine that tolerates the unused low bits of a final partial
/// group, as a 22 symbol salt or a 31 symbol digest always has.
const BASE_64: GeneralPurpose = GeneralPurpose::new(
    &BCRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Returns true when `c` belongs to the bcrypt base64 alphabet.
pub fn is_alphabet_char(c: u8) -> bool {
    ALPHABET.contains(&c)
}

/// Number of symbols produced when encoding `length` bytes.
pub const fn encoded_len(length: usize) -> usize {
    (length * 4 + 2) / 3
}

/// Encodes the first `length` bytes of `bytes`. A trailing group of one or two
/// bytes produces two or three symbols respectively.
pub fn encode(bytes: &[u8], length: usize) -> Result<String, BcryptError> {
    if length == 0 || length > bytes.len() {
        return Err(BcryptError::InvalidArgument(format!(
            "invalid length {length} for a {} byte input",
            bytes.len()
        )));
    }
    Ok(BASE_64.encode(&bytes[..length]))
}

/// Decodes at most `max_bytes` bytes.
///
/// Decoding is lenient: it stops at the first symbol outside the alphabet, or
/// when either the input or `max_bytes` runs out, and returns what it has.
/// Callers that need a fixed length validate the text before decoding.
pub fn decode(encoded: &str, max_bytes: usize) -> Vec<u8> {
    let valid = encoded.bytes().take_while(|&c| is_alphabet_char(c)).count();
    let mut symbols = valid.min(encoded_len(max_bytes));
    // a lone symbol carries fewer than eight bits
    if symbols % 4 == 1 {
        symbols -= 1;
    }

    // every kept symbol is ASCII, so `symbols` is a char boundary
    BASE_64.decode(&encoded[..symbols]).unwrap_or_default()
}
