//! JSON configuration for [`PasswordPolicy`]. HMAC keys never appear in the
//! file itself; the config names an environment variable or a key file that
//! holds the base64-encoded secret.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::crypto::prehash::DigestKind;
use crate::crypto::salt::DEFAULT_COST;
use crate::error::BcryptError;
use crate::policy::PasswordPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("invalid policy: {0}")]
    Policy(#[from] BcryptError),
    #[error("no usable hmac key source configured")]
    MissingKeySource,
    #[error("hmac key unreadable: {0}")]
    KeySourceUnreadable(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
}

#[derive(Debug, Deserialize)]
pub struct HmacKeyConfig {
    /// Environment variable holding the base64-encoded key.
    pub key_env: Option<String>,
    /// File containing the base64-encoded key.
    pub key_path: Option<PathBuf>,
}

fn decode_key(encoded: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    STANDARD_NO_PAD
        .decode(encoded.trim().as_bytes())
        .map(Zeroizing::new)
        .map_err(|e| ConfigError::Base64DecodeFailed(format!("{e}")))
}

impl HmacKeyConfig {
    fn load_key(&self) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        if let Some(var) = &self.key_env {
            let encoded = Zeroizing::new(
                std::env::var(var).map_err(|e| ConfigError::KeySourceUnreadable(format!("{var}: {e}")))?,
            );
            return decode_key(&encoded);
        }
        if let Some(path) = &self.key_path {
            let content = Zeroizing::new(
                fs::read_to_string(path).map_err(|e| ConfigError::KeySourceUnreadable(format!("{e}")))?,
            );
            return decode_key(&content);
        }
        Err(ConfigError::MissingKeySource)
    }
}

#[derive(Debug, Deserialize)]
pub struct EnhancedEntropyConfig {
    #[serde(default)]
    pub digest: DigestKind,
    pub hmac: Option<HmacKeyConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RawPolicyConfig {
    #[serde(rename = "workFactor")]
    pub work_factor: Option<u32>,
    #[serde(rename = "minimumWorkFactor")]
    pub minimum_work_factor: Option<u32>,
    pub revision: Option<char>,
    #[serde(rename = "rehashPasswords", default)]
    pub rehash_passwords: bool,
    #[serde(rename = "enhancedEntropy")]
    pub enhanced_entropy: Option<EnhancedEntropyConfig>,
}

impl RawPolicyConfig {
    fn build_policy(&self) -> Result<PasswordPolicy, ConfigError> {
        let work_factor = self.work_factor.unwrap_or(DEFAULT_COST);
        let mut policy = PasswordPolicy::new(work_factor)?
            .with_minimum_work_factor(self.minimum_work_factor.unwrap_or(work_factor))?
            .with_revision(self.revision.unwrap_or('b'))?
            .with_rehash(self.rehash_passwords);

        if let Some(enhanced) = &self.enhanced_entropy {
            policy = match &enhanced.hmac {
                Some(hmac) => policy.with_hmac_key(enhanced.digest, hmac.load_key()?)?,
                None => policy.with_digest(enhanced.digest),
            };
        }
        Ok(policy)
    }
}

/// Builds a policy from a JSON document.
pub fn parse_policy(json: &str) -> Result<PasswordPolicy, ConfigError> {
    let raw: RawPolicyConfig = serde_json::from_str(json).map_err(|e| ConfigError::Parse(format!("{e}")))?;
    let policy = raw.build_policy()?;
    info!(
        work_factor = policy.work_factor(),
        minimum_work_factor = policy.minimum_work_factor(),
        version = %policy.version(),
        enhanced = policy.preprocessing().is_enhanced(),
        "loaded password policy"
    );
    Ok(policy)
}

/// Reads and parses the policy file at `path`.
pub fn load_policy(path: impl AsRef<Path>) -> Result<PasswordPolicy, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    parse_policy(&raw_json)
}
