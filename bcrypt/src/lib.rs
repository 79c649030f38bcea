//! OpenBSD bcrypt password hashing for Squire.
//!
//! Hashes use the `$2b$10$<salt><digest>` layout and interoperate with other
//! bcrypt implementations. Optional enhanced entropy pre-hashes passwords
//! with SHA-2 or HMAC-SHA-2 to lift bcrypt's 72 byte input limit, and
//! [`PasswordPolicy`] bundles those choices behind a single configured value.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod policy;

pub use codec::hash::{HashInformation, Version};
pub use crypto::passwords::{
    enhanced_verify, generate_default_salt, hash_password, hash_password_enhanced, hash_password_hmac,
    hash_password_with, hash_password_with_cost, interrogate_hash, password_needs_rehash,
    validate_and_replace_password, validate_and_upgrade_hash, verify, verify_with,
};
pub use crypto::prehash::{DigestKind, Preprocessing};
pub use crypto::salt::generate_salt;
pub use error::BcryptError;
pub use policy::{PasswordPolicy, Verification};
