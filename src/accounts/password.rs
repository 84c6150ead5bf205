use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HasherConfig;

/// Upper bound on plaintext length, in bytes. Caps the cost of a single hash.
pub const MAX_PASSWORD_BYTES: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("password exceeds {max} bytes")]
    InputTooLong { max: usize },
    #[error("argon2: {0}")]
    Argon2(String),
}

/// One-way credential hashing.
pub trait CredentialHasher: Send + Sync {
    /// Returns a PHC string carrying its own salt and cost parameters.
    fn hash(&self, plain: &str) -> Result<String, HashError>;

    /// Constant-time check of `plain` against a stored hash. A mismatch,
    /// an over-long input or an unparseable hash all yield `false`.
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(config: &HasherConfig) -> anyhow::Result<Self> {
        let params = Params::new(
            config.memory_kib.unwrap_or(Params::DEFAULT_M_COST),
            config.iterations.unwrap_or(Params::DEFAULT_T_COST),
            config.parallelism.unwrap_or(Params::DEFAULT_P_COST),
            None,
        )
        .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, HashError> {
        if plain.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::InputTooLong {
                max: MAX_PASSWORD_BYTES,
            });
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashError::Argon2(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        if plain.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::new(&HasherConfig {
        memory_kib: Some(1024),
        iterations: Some(1),
        parallelism: Some(1),
    })
    .expect("cheap params are valid")
}
