//! One-way password hashing.
//!
//! Argon2id with a per-call random salt; the work parameters ride along in
//! the PHC output string, so verification always replays the cost the hash
//! was created with. Hashing is deliberately CPU-expensive.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use configs::ConfigError;

use crate::errors::ServiceError;

/// Tunable work factor. The default follows the argon2 crate's recommended
/// parameters; tests may lower it to keep suites fast.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    /// Cheap parameters for test suites. Not for production use.
    pub fn fast() -> Self {
        Self { m_cost: Params::MIN_M_COST.max(1024), t_cost: 1, p_cost: 1 }
    }
}

pub struct PasswordHasher {
    argon: Argon2<'static>,
}

impl PasswordHasher {
    /// Invalid cost parameters are a configuration fault, caught at startup.
    pub fn new(cost: HashCost) -> Result<Self, ConfigError> {
        let params = Params::new(cost.m_cost, cost.t_cost, cost.p_cost, None)
            .map_err(|e| ConfigError::Invalid(format!("hash cost: {e}")))?;
        Ok(Self { argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }

    /// Hash `plaintext` with a fresh random salt. The plaintext is neither
    /// logged nor retained.
    pub fn hash(&self, plaintext: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| ServiceError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Recompute and compare against a stored PHC string. Malformed stored
    /// hashes simply fail verification.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self.argon.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}
