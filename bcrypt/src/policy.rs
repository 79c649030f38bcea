//! Application-level hashing policy: one place that fixes the work factor,
//! revision and preprocessing so every call site hashes passwords the same way.

use std::fmt;

use tracing::debug;
use zeroize::Zeroizing;

use crate::codec::hash::{self, Version};
use crate::crypto::eksblowfish::{MAX_COST, MIN_COST};
use crate::crypto::passwords::{hash_password_with, password_needs_rehash, verify_with};
use crate::crypto::prehash::{DigestKind, Preprocessing};
use crate::crypto::salt::{generate_salt_bytes, DEFAULT_COST};
use crate::error::BcryptError;

/// Outcome of [`PasswordPolicy::verify_password`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Failed,
    Success,
    /// The password matched, but the stored hash is below the policy minimum
    /// and should be replaced with [`PasswordPolicy::hash_password`].
    SuccessRehashNeeded,
}

impl Verification {
    pub fn is_success(self) -> bool {
        !matches!(self, Verification::Failed)
    }
}

struct EnhancedEntropy {
    kind: DigestKind,
    hmac_key: Option<Zeroizing<Vec<u8>>>,
}

impl fmt::Debug for EnhancedEntropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancedEntropy")
            .field("kind", &self.kind)
            .field("keyed", &self.hmac_key.is_some())
            .finish()
    }
}

fn check_cost(cost: u32) -> Result<u32, BcryptError> {
    if (MIN_COST..=MAX_COST).contains(&cost) {
        Ok(cost)
    } else {
        Err(BcryptError::InvalidCost(cost))
    }
}

#[derive(Debug)]
pub struct PasswordPolicy {
    work_factor: u32,
    minimum_work_factor: u32,
    version: Version,
    rehash_passwords: bool,
    enhanced: Option<EnhancedEntropy>,
}

impl PasswordPolicy {
    /// Plain `$2b$` hashing at `work_factor`, which also becomes the minimum.
    pub fn new(work_factor: u32) -> Result<Self, BcryptError> {
        let work_factor = check_cost(work_factor)?;
        Ok(Self {
            work_factor,
            minimum_work_factor: work_factor,
            version: Version::default(),
            rehash_passwords: false,
            enhanced: None,
        })
    }

    /// Hashes below this cost are reported by [`PasswordPolicy::needs_rehash`].
    pub fn with_minimum_work_factor(mut self, minimum: u32) -> Result<Self, BcryptError> {
        self.minimum_work_factor = check_cost(minimum)?;
        Ok(self)
    }

    /// Minor revision written into new hashes: `a`, `b`, `x` or `y`.
    pub fn with_revision(mut self, minor: char) -> Result<Self, BcryptError> {
        self.version = Version::from_minor(minor)
            .ok_or_else(|| BcryptError::InvalidArgument(format!("invalid bcrypt minor revision {minor:?}")))?;
        Ok(self)
    }

    /// Report [`Verification::SuccessRehashNeeded`] for outdated hashes.
    pub fn with_rehash(mut self, rehash_passwords: bool) -> Self {
        self.rehash_passwords = rehash_passwords;
        self
    }

    pub fn with_digest(mut self, kind: DigestKind) -> Self {
        self.enhanced = Some(EnhancedEntropy { kind, hmac_key: None });
        self
    }

    pub fn with_hmac_key(mut self, kind: DigestKind, key: Zeroizing<Vec<u8>>) -> Result<Self, BcryptError> {
        if key.is_empty() {
            return Err(BcryptError::InvalidArgument("hmac key cannot be empty".to_string()));
        }
        self.enhanced = Some(EnhancedEntropy {
            kind,
            hmac_key: Some(key),
        });
        Ok(self)
    }

    pub fn work_factor(&self) -> u32 {
        self.work_factor
    }

    pub fn minimum_work_factor(&self) -> u32 {
        self.minimum_work_factor
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn rehash_passwords(&self) -> bool {
        self.rehash_passwords
    }

    pub fn preprocessing(&self) -> Preprocessing<'_> {
        match &self.enhanced {
            None => Preprocessing::None,
            Some(EnhancedEntropy { kind, hmac_key: None }) => Preprocessing::Digest(*kind),
            Some(EnhancedEntropy {
                kind,
                hmac_key: Some(key),
            }) => Preprocessing::Hmac {
                kind: *kind,
                key: key.as_slice(),
            },
        }
    }

    /// Hashes `password` under a fresh salt.
    pub fn hash_password(&self, password: &str) -> Result<String, BcryptError> {
        let salt = hash::format_salt(self.version, self.work_factor, &generate_salt_bytes())?;
        hash_password_with(password, &salt, &self.preprocessing())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<Verification, BcryptError> {
        if !verify_with(password, hash, &self.preprocessing())? {
            return Ok(Verification::Failed);
        }
        if self.rehash_passwords && self.needs_rehash(hash)? {
            debug!(minimum = self.minimum_work_factor, "stored hash is below policy minimum");
            return Ok(Verification::SuccessRehashNeeded);
        }
        Ok(Verification::Success)
    }

    pub fn needs_rehash(&self, hash: &str) -> Result<bool, BcryptError> {
        password_needs_rehash(hash, self.minimum_work_factor)
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            work_factor: DEFAULT_COST,
            minimum_work_factor: DEFAULT_COST,
            version: Version::default(),
            rehash_passwords: false,
            enhanced: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PasswordPolicy, Verification};
    use crate::codec::hash::{get_work_factor, Version};
    use crate::crypto::passwords::{enhanced_verify, hash_password_with_cost, verify};
    use crate::crypto::prehash::{DigestKind, Preprocessing};
    use crate::error::BcryptError;
    use zeroize::Zeroizing;

    #[test]
    fn validates_parameters_eagerly() {
        assert_eq!(PasswordPolicy::new(3).unwrap_err(), BcryptError::InvalidCost(3));
        assert_eq!(PasswordPolicy::new(32).unwrap_err(), BcryptError::InvalidCost(32));
        let policy = PasswordPolicy::new(4).expect("policy should build");
        assert!(policy.with_revision('z').is_err());
        let policy = PasswordPolicy::new(4).expect("policy should build");
        assert!(policy.with_hmac_key(DigestKind::Sha256, Zeroizing::new(Vec::new())).is_err());
    }

    #[test]
    fn hashes_with_configured_settings() {
        let policy = PasswordPolicy::new(5).unwrap().with_revision('y').unwrap();
        let hashed = policy.hash_password("secret").expect("hashing should succeed");
        assert!(hashed.starts_with("$2y$05$"));
        assert!(verify("secret", &hashed).unwrap());
        assert_eq!(policy.verify_password("secret", &hashed).unwrap(), Verification::Success);
        assert_eq!(policy.verify_password("nope", &hashed).unwrap(), Verification::Failed);
    }

    #[test]
    fn flags_hashes_below_minimum() {
        let old = hash_password_with_cost("secret", 4).unwrap();
        let policy = PasswordPolicy::new(5).unwrap().with_rehash(true);
        let outcome = policy.verify_password("secret", &old).unwrap();
        assert_eq!(outcome, Verification::SuccessRehashNeeded);
        assert!(outcome.is_success());

        let fresh = policy.hash_password("secret").unwrap();
        assert_eq!(get_work_factor(&fresh).unwrap(), 5);
        assert_eq!(policy.verify_password("secret", &fresh).unwrap(), Verification::Success);

        let quiet = PasswordPolicy::new(5).unwrap();
        assert_eq!(quiet.verify_password("secret", &old).unwrap(), Verification::Success);
        assert!(quiet.needs_rehash(&old).unwrap());
    }

    #[test]
    fn minimum_can_trail_work_factor() {
        let policy = PasswordPolicy::new(6).unwrap().with_minimum_work_factor(4).unwrap().with_rehash(true);
        let old = hash_password_with_cost("secret", 4).unwrap();
        assert_eq!(policy.verify_password("secret", &old).unwrap(), Verification::Success);
    }

    #[test]
    fn applies_enhanced_entropy() {
        let policy = PasswordPolicy::new(4).unwrap().with_digest(DigestKind::Sha512);
        let long = "long passphrase ".repeat(10);
        let hashed = policy.hash_password(&long).unwrap();
        assert!(enhanced_verify(&long, &hashed, DigestKind::Sha512).unwrap());
        assert!(policy.verify_password(&long, &hashed).unwrap().is_success());
    }

    #[test]
    fn applies_hmac_key() {
        let policy = PasswordPolicy::new(4)
            .unwrap()
            .with_hmac_key(DigestKind::Sha384, Zeroizing::new(b"app-secret".to_vec()))
            .unwrap();
        assert_eq!(
            policy.preprocessing(),
            Preprocessing::Hmac {
                kind: DigestKind::Sha384,
                key: b"app-secret"
            }
        );
        let hashed = policy.hash_password("pw").unwrap();
        assert!(policy.verify_password("pw", &hashed).unwrap().is_success());
        assert!(!enhanced_verify("pw", &hashed, DigestKind::Sha384).unwrap());
        assert!(!format!("{policy:?}").contains("app-secret"));
    }

    #[test]
    fn default_policy() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.work_factor(), 10);
        assert_eq!(policy.minimum_work_factor(), 10);
        assert_eq!(policy.version(), Version::TwoB);
        assert!(!policy.rehash_passwords());
        assert_eq!(policy.preprocessing(), Preprocessing::None);
    }
}
