//! Password hashing and verification in the OpenBSD bcrypt format.
//!
//! Hash strings carry their own revision, cost and salt, so verification
//! re-derives the hash from the stored string and compares the two in
//! constant time. Enhanced entropy variants pre-hash the password with SHA-2
//! before bcrypt runs; see [`super::prehash`].

use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use super::eksblowfish::crypt_raw;
use super::prehash::{preprocess, DigestKind, Preprocessing};
use super::salt::{self, DEFAULT_COST};
use crate::codec::hash::{self, HashInformation};
use crate::error::BcryptError;

/// bcrypt only reads this many key bytes.
pub const MAX_INPUT_LEN: usize = 72;

/// Work factor used by [`validate_and_upgrade_hash`] callers that have no
/// policy of their own.
pub const DEFAULT_UPGRADE_COST: u32 = 11;

/// Minor revision stamped on freshly generated salts.
const DEFAULT_MINOR: char = 'b';

fn compute(password: &str, salt: &str, mode: &Preprocessing<'_>) -> Result<String, BcryptError> {
    let parsed = hash::parse_salt(salt)?;
    let key = preprocess(password, parsed.version, mode)?;

    debug!(version = %parsed.version, cost = parsed.cost, enhanced = mode.is_enhanced(), "computing bcrypt hash");
    let digest = crypt_raw(&key, &parsed.salt, parsed.cost)?;
    hash::format_hash(parsed.version, parsed.cost, &parsed.salt, &digest)
}

/// Hashes `password` with the version, cost and salt taken from `salt`, which
/// may be a bare salt string or a complete hash.
///
/// Passwords longer than 72 UTF-8 bytes are refused; use
/// [`hash_password_enhanced`] for long inputs.
pub fn hash_password(password: &str, salt: &str) -> Result<String, BcryptError> {
    hash_password_with(password, salt, &Preprocessing::None)
}

/// Hashes `password` under a fresh `$2b$` salt at the given cost.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, BcryptError> {
    let salt = salt::generate_salt(cost, DEFAULT_MINOR)?;
    hash_password(password, &salt)
}

/// Hashes `password` with an explicit preprocessing strategy.
pub fn hash_password_with(password: &str, salt: &str, mode: &Preprocessing<'_>) -> Result<String, BcryptError> {
    if !mode.is_enhanced() && password.len() > MAX_INPUT_LEN {
        return Err(BcryptError::InvalidArgument(format!(
            "password is {} bytes; bcrypt accepts at most {MAX_INPUT_LEN}",
            password.len()
        )));
    }
    compute(password, salt, mode)
}

/// SHA-2 pre-hash followed by bcrypt. Accepts passwords of any length.
pub fn hash_password_enhanced(password: &str, salt: &str, kind: DigestKind) -> Result<String, BcryptError> {
    hash_password_with(password, salt, &Preprocessing::Digest(kind))
}

/// HMAC-SHA-2 pre-hash keyed with an application secret, followed by bcrypt.
pub fn hash_password_hmac(password: &str, salt: &str, kind: DigestKind, key: &[u8]) -> Result<String, BcryptError> {
    hash_password_with(password, salt, &Preprocessing::Hmac { kind, key })
}

/// Checks `password` against a stored hash.
///
/// Returns `Ok(false)` on a mismatch and an error only when the stored hash
/// cannot be parsed. Bytes past the 72nd never influence the result.
pub fn verify(password: &str, hash: &str) -> Result<bool, BcryptError> {
    verify_with(password, hash, &Preprocessing::None)
}

/// [`verify`] for hashes produced with a preprocessing strategy.
pub fn verify_with(password: &str, hash: &str, mode: &Preprocessing<'_>) -> Result<bool, BcryptError> {
    let computed = compute(password, hash, mode)?;
    Ok(hash.as_bytes().ct_eq(computed.as_bytes()).into())
}

/// [`verify`] for hashes produced by [`hash_password_enhanced`].
pub fn enhanced_verify(password: &str, hash: &str, kind: DigestKind) -> Result<bool, BcryptError> {
    verify_with(password, hash, &Preprocessing::Digest(kind))
}

/// Verifies the current credentials, then hashes `new_password`.
///
/// The new cost is the larger of `new_cost` and the current hash's cost
/// unless `force` is set, so work factors never drop by accident.
pub fn validate_and_upgrade_hash(
    current_password: &str,
    current_hash: &str,
    new_password: &str,
    new_cost: u32,
    force: bool,
) -> Result<String, BcryptError> {
    validate_and_replace_password(
        current_password,
        current_hash,
        &Preprocessing::None,
        new_password,
        &Preprocessing::None,
        new_cost,
        force,
    )
}

/// Like [`validate_and_upgrade_hash`], but the current and the new hash may
/// use different preprocessing, which allows moving users onto enhanced
/// entropy as they change passwords.
pub fn validate_and_replace_password(
    current_password: &str,
    current_hash: &str,
    current_mode: &Preprocessing<'_>,
    new_password: &str,
    new_mode: &Preprocessing<'_>,
    new_cost: u32,
    force: bool,
) -> Result<String, BcryptError> {
    if current_hash.is_empty() {
        return Err(BcryptError::InvalidArgument("current hash cannot be empty".to_string()));
    }

    if !verify_with(current_password, current_hash, current_mode)? {
        warn!("refusing to replace hash: current credentials did not verify");
        return Err(BcryptError::Authentication);
    }

    let current_cost = hash::parse_salt(current_hash)?.cost;
    let cost = if force { new_cost } else { new_cost.max(current_cost) };
    if cost != current_cost {
        info!(from = current_cost, to = cost, "changing work factor");
    }

    let salt = salt::generate_salt(cost, DEFAULT_MINOR)?;
    hash_password_with(new_password, &salt, new_mode)
}

/// True when the stored hash was computed below `minimum_cost`.
pub fn password_needs_rehash(hash: &str, minimum_cost: u32) -> Result<bool, BcryptError> {
    Ok(hash::get_work_factor(hash)? < minimum_cost)
}

/// Splits a hash into settings, version, cost and encoded salt and digest.
pub fn interrogate_hash(hash: &str) -> Result<HashInformation, BcryptError> {
    hash::hash_information(hash).map_err(|err| BcryptError::HashInformation(Box::new(err)))
}

/// Generates a `$2b$` salt at the default cost.
pub fn generate_default_salt() -> Result<String, BcryptError> {
    salt::generate_salt(DEFAULT_COST, DEFAULT_MINOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hash::Version;

    const HMAC_KEY: &[u8] = b"SuperSecureHMACKey";

    // (password, salt, expected hash)
    const VECTORS: &[(&str, &str, &str)] = &[
        ("", "$2a$06$DCq7YPn5Rq63x1Lad4cll.", "$2a$06$DCq7YPn5Rq63x1Lad4cll.TV4S6ytwfsfvkgY8jIucDrjc8deX1s."),
        ("", "$2a$08$HqWuK6/Ng6sg9gQzbLrgb.", "$2a$08$HqWuK6/Ng6sg9gQzbLrgb.Tl.ZHfXLhvt/SgVyWhQqgqcZ7ZuUtye"),
        ("a", "$2a$06$m0CrhHm10qJ3lXRY.5zDGO", "$2a$06$m0CrhHm10qJ3lXRY.5zDGO3rS2KdeeWLuGmsfGlMfOxih58VYVfxe"),
        ("a", "$2a$08$cfcvVd2aQ8CMvoMpP2EBfe", "$2a$08$cfcvVd2aQ8CMvoMpP2EBfeodLEkkFJ9umNEfPD18.hUF62qqlC/V."),
        ("abc", "$2a$06$If6bvum7DFjUnE9p2uDeDu", "$2a$06$If6bvum7DFjUnE9p2uDeDu0YHzrHM6tf.iqN8.yx.jNN1ILEf7h0i"),
        ("abc", "$2a$08$Ro0CUfOqk6cXEKf3dyaM7O", "$2a$08$Ro0CUfOqk6cXEKf3dyaM7OhSCvnwM9s4wIX9JeLapehKK5YdLxKcm"),
        (
            "abcdefghijklmnopqrstuvwxyz",
            "$2a$06$.rCVZVOThsIa97pEDOxvGu",
            "$2a$06$.rCVZVOThsIa97pEDOxvGuRRgzG64bvtJ0938xuqzv18d3ZpQhstC",
        ),
        (
            "~!@#$%^&*()      ~!@#$%^&*()PNBFRD",
            "$2a$06$fPIsBO8qRqkjj273rfaOI.",
            "$2a$06$fPIsBO8qRqkjj273rfaOI.HtSV9jLDpTbZn782DC6/t7qT67P6FfO",
        ),
    ];

    #[test]
    fn matches_reference_hashes() {
        for (password, salt, expected) in VECTORS {
            let hashed = hash_password(password, salt).expect("hashing should succeed");
            assert_eq!(&hashed, expected, "password {password:?}");
        }
    }

    #[test]
    fn matches_reference_hashes_at_higher_costs() {
        assert_eq!(
            hash_password("a", "$2a$10$k87L/MF28Q673VKh8/cPi.").unwrap(),
            "$2a$10$k87L/MF28Q673VKh8/cPi.SUl7MU/rWuSiIDDFayrKk/1tBsSQu4u"
        );
        assert_eq!(
            hash_password("123465", "$2y$10$76MoM3QzYb7UmP6lpwDZXu").unwrap(),
            "$2y$10$76MoM3QzYb7UmP6lpwDZXu5JzKLNaQ8rnmx03.oDfsdVNj3zv2qJ2"
        );
        assert!(verify("root", "$2a$11$QyLpYkKKG9oNIl2rbZ9X0OgxxbWYZjPZUFN/kuJ4DDywo20WgK3iu").unwrap());
        assert_eq!(
            hash_password("hunter2", "$2a$12$......................").unwrap(),
            "$2a$12$......................21jzCB1r6pN6rp5O2Ev0ejjTAboskKm"
        );
    }

    #[test]
    fn legacy_prefix_keeps_format() {
        let hashed = hash_password("", "$2$06$DCq7YPn5Rq63x1Lad4cll.").expect("hashing should succeed");
        assert_eq!(hashed, "$2$06$DCq7YPn5Rq63x1Lad4cll.TV4S6ytwfsfvkgY8jIucDrjc8deX1s.");
        assert_eq!(hashed.len(), 59);
        assert!(verify("", &hashed).unwrap());
    }

    #[test]
    fn accepts_full_hash_as_salt() {
        let (password, _, expected) = VECTORS[4];
        assert_eq!(hash_password(password, expected).unwrap(), expected);
    }

    #[test]
    fn concurrent_hashes_match_serial_results() {
        let results: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = VECTORS
                .iter()
                .map(|(password, salt, _)| scope.spawn(move || hash_password(password, salt)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("hashing thread should not panic").unwrap())
                .collect()
        });

        for ((password, salt, expected), hashed) in VECTORS.iter().zip(&results) {
            assert_eq!(hashed, expected, "password {password:?}");
            assert_eq!(hashed, &hash_password(password, salt).unwrap());
        }
    }

    #[test]
    fn is_deterministic() {
        let salt = salt::generate_salt(4, 'b').unwrap();
        assert_eq!(hash_password("secret", &salt).unwrap(), hash_password("secret", &salt).unwrap());
    }

    #[test]
    fn round_trips_across_costs() {
        for cost in 4..=12 {
            let hashed = hash_password_with_cost("correct horse", cost).expect("hashing should succeed");
            assert_eq!(hash::get_work_factor(&hashed).unwrap(), cost);
            assert!(verify("correct horse", &hashed).unwrap(), "cost {cost}");
        }
    }

    #[test]
    fn rejects_mismatched_passwords() {
        for (i, (password, _, _)) in VECTORS.iter().enumerate() {
            let (other, _, other_hash) = VECTORS[(i + 2) % VECTORS.len()];
            if *password != other {
                assert!(!verify(password, other_hash).unwrap(), "password {password:?}");
            }
        }
    }

    #[test]
    fn verify_errors_only_on_malformed_hash() {
        assert!(!verify("a", VECTORS[0].2).unwrap());
        assert!(matches!(verify("a", "$3a$06$DCq7YPn5Rq63x1Lad4cll."), Err(BcryptError::SaltParse(_))));
        assert!(matches!(verify("a", ""), Err(BcryptError::InvalidArgument(_))));
        // a bare salt parses but cannot match
        assert!(!verify("", "$2a$06$DCq7YPn5Rq63x1Lad4cll.").unwrap());
    }

    #[test]
    fn truncates_after_seventy_two_bytes() {
        let in_bounds = "testtdsdddddddddddddddddddddddddddddddddddddddddddddddsddddddddddddddddd";
        let exceeds = "testtdsdddddddddddddddddddddddddddddddddddddddddddddddsdddddddddddddddddd";
        assert_eq!(in_bounds.len(), 72);

        let hashed = hash_password_with_cost(in_bounds, 4).unwrap();
        assert!(verify(exceeds, &hashed).unwrap());
        assert!(matches!(hash_password(exceeds, &hashed), Err(BcryptError::InvalidArgument(_))));
    }

    #[test]
    fn counts_limit_in_utf8_bytes() {
        let salt = salt::generate_salt(4, 'b').unwrap();
        assert!(hash_password(&"é".repeat(36), &salt).is_ok());
        assert!(matches!(hash_password(&"é".repeat(37), &salt), Err(BcryptError::InvalidArgument(_))));
    }

    #[test]
    fn legacy_and_minor_revisions_agree_at_full_length() {
        // the terminator falls outside the 72 byte window
        let password = "x".repeat(72);
        let legacy = hash_password(&password, "$2$04$DCq7YPn5Rq63x1Lad4cll.").unwrap();
        let modern = hash_password(&password, "$2a$04$DCq7YPn5Rq63x1Lad4cll.").unwrap();
        assert_eq!(legacy[6..], modern[7..]);
    }

    #[test]
    fn terminator_distinguishes_embedded_nul() {
        for minor in ['a', 'b', 'x', 'y'] {
            let salt = salt::generate_salt(4, minor).unwrap();
            let hashed = hash_password("abc", &salt).unwrap();
            assert!(verify("abc", &hashed).unwrap());
            assert!(!verify("abc\0", &hashed).unwrap(), "minor {minor}");
        }
    }

    #[test]
    fn enhanced_vectors() {
        let salt = "$2b$05$DCq7YPn5Rq63x1Lad4cll.";
        let cases = [
            (DigestKind::Sha256, "XROpedhUxA1Dytv7L929Kz3CYvp8Izq", "qg9jGGvrUmNm8Vnggb/Dc4zrSgD5XO6"),
            (DigestKind::Sha384, "euddhgc38mzitNPG9KvToq0q0Cz.UtO", ".8gkSq/A6mQLoExBeLzGrSgYUR/eNDO"),
            (DigestKind::Sha512, "rvC8234XeQ38rtxl4ag.X1CC4gqzQyy", "oJvaEtlUBV4WTlTM56l4Jo1snMvV7w6"),
        ];
        for (kind, plain, keyed) in cases {
            let hashed = hash_password_enhanced("password", salt, kind).unwrap();
            assert_eq!(hashed, format!("{salt}{plain}"), "{kind:?}");
            assert!(enhanced_verify("password", &hashed, kind).unwrap());
            assert!(!verify("password", &hashed).unwrap());

            let hashed = hash_password_hmac("password", salt, kind, HMAC_KEY).unwrap();
            assert_eq!(hashed, format!("{salt}{keyed}"), "{kind:?}");
            let mode = Preprocessing::Hmac { kind, key: HMAC_KEY };
            assert!(verify_with("password", &hashed, &mode).unwrap());
            assert!(!verify_with("password", &hashed, &Preprocessing::Hmac { kind, key: b"other" }).unwrap());
        }
    }

    #[test]
    fn enhanced_sha256_vectors() {
        assert_eq!(
            hash_password_enhanced("", "$2b$07$0AD340gChkx46nsejmoRw.", DigestKind::Sha256).unwrap(),
            "$2b$07$0AD340gChkx46nsejmoRw.ANNVeZY33cuGluoj/QhaGEFNGb3sg8O"
        );
        assert!(enhanced_verify(
            "test",
            "$2y$10$u3XfEiRife.cNffWS0aD9OUPdFLVsiedZcGA/fXXeRyZBlvjGyS3e",
            DigestKind::Sha256
        )
        .unwrap());
    }

    #[test]
    fn enhanced_mode_lifts_length_limit() {
        let salt = salt::generate_salt(4, 'b').unwrap();
        let long = "p".repeat(200);
        let hashed = hash_password_enhanced(&long, &salt, DigestKind::Sha384).unwrap();
        assert!(enhanced_verify(&long, &hashed, DigestKind::Sha384).unwrap());

        let mut other = long.clone();
        other.push('q');
        assert!(!enhanced_verify(&other, &hashed, DigestKind::Sha384).unwrap());
    }

    #[test]
    fn upgrade_requires_current_password() {
        let hashed = hash_password_with_cost("old", 4).unwrap();
        assert_eq!(
            validate_and_upgrade_hash("wrong", &hashed, "new", 5, false),
            Err(BcryptError::Authentication)
        );
        assert!(matches!(
            validate_and_upgrade_hash("old", "", "new", 5, false),
            Err(BcryptError::InvalidArgument(_))
        ));
    }

    #[test]
    fn upgrade_never_lowers_cost_unless_forced() {
        let hashed = hash_password_with_cost("old", 6).unwrap();

        let upgraded = validate_and_upgrade_hash("old", &hashed, "new", 4, false).unwrap();
        assert_eq!(hash::get_work_factor(&upgraded).unwrap(), 6);
        assert!(verify("new", &upgraded).unwrap());
        assert!(!verify("old", &upgraded).unwrap());

        let raised = validate_and_upgrade_hash("old", &hashed, "new", 7, false).unwrap();
        assert_eq!(hash::get_work_factor(&raised).unwrap(), 7);

        let forced = validate_and_upgrade_hash("old", &hashed, "new", 4, true).unwrap();
        assert_eq!(hash::get_work_factor(&forced).unwrap(), 4);
    }

    #[test]
    fn upgrade_raises_to_default_cost() {
        let hashed = hash_password_with_cost("old", 4).unwrap();
        let upgraded = validate_and_upgrade_hash("old", &hashed, "new", DEFAULT_UPGRADE_COST, false).unwrap();
        assert_eq!(hash::get_work_factor(&upgraded).unwrap(), DEFAULT_UPGRADE_COST);
        assert!(verify("new", &upgraded).unwrap());
    }

    #[test]
    fn replace_can_switch_preprocessing() {
        let hashed = hash_password_with_cost("old", 4).unwrap();
        let enhanced = Preprocessing::Digest(DigestKind::Sha512);
        let replaced =
            validate_and_replace_password("old", &hashed, &Preprocessing::None, "new", &enhanced, 4, false).unwrap();
        assert!(verify_with("new", &replaced, &enhanced).unwrap());
        assert_eq!(interrogate_hash(&replaced).unwrap().version, Version::TwoB);
    }

    #[test]
    fn rehash_compares_against_minimum() {
        let hashed = VECTORS[0].2;
        assert!(password_needs_rehash(hashed, 7).unwrap());
        assert!(!password_needs_rehash(hashed, 6).unwrap());
        assert!(!password_needs_rehash(hashed, 4).unwrap());
        assert!(password_needs_rehash("$2a$06$short", 4).is_err());
    }

    #[test]
    fn interrogates_hash() {
        let info = interrogate_hash(VECTORS[0].2).expect("interrogation should succeed");
        assert_eq!(info.settings, "$2a$06");
        assert_eq!(info.version, Version::TwoA);
        assert_eq!(info.work_factor, 6);
        assert_eq!(info.raw_hash, "DCq7YPn5Rq63x1Lad4cll.TV4S6ytwfsfvkgY8jIucDrjc8deX1s.");
    }

    #[test]
    fn interrogation_wraps_parse_errors() {
        let err = interrogate_hash("$2a$06$DCq7YPn5Rq63x1Lad4cll.").unwrap_err();
        assert_eq!(err, BcryptError::HashInformation(Box::new(BcryptError::invalid_hash_format())));
    }

    #[test]
    fn default_salt_uses_revision_b() {
        let salt = generate_default_salt().unwrap();
        assert!(salt.starts_with("$2b$10$"));
    }
}
