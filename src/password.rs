//! Credential verifier: one-way password hashing.
//!
//! Argon2id with a fresh random salt per hash. Verifier strings are PHC strings and
//! are opaque to the rest of the crate.

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};

/// Hashes and verifies passwords.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    params: Params,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

/// Hash generation failed. Signals a broken primitive, not a user error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(pub String);

impl CredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom Argon2 cost: memory in KiB, iterations, lanes.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, HashError> {
        let params =
            Params::new(m_cost, t_cost, p_cost, None).map_err(|e| HashError(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `plaintext` under a fresh salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| HashError(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError(e.to_string()))?;
        let phc = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    /// Returns `false` on mismatch and on a verifier that does not parse.
    pub fn verify(&self, plaintext: &str, verifier: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(verifier) else {
            return false;
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}
