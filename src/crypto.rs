//! Cryptogragic logics.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use crate::config::Argon2 as ArgonConfig;

/// Entropy of every opaque credential (authorization code, refresh token,
/// client secret).
pub const OPAQUE_TOKEN_BYTES: usize = 32;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
    #[error("operating system RNG failed")]
    Random(#[from] rand::Error),
}

/// Fill `length` bytes from the OS RNG and encode them as lowercase hex.
pub fn random_hex(length: usize) -> Result<String> {
    let mut bytes = vec![0u8; length];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Generate an opaque credential with [`OPAQUE_TOKEN_BYTES`] of entropy.
pub fn opaque_token() -> Result<String> {
    random_hex(OPAQUE_TOKEN_BYTES)
}

/// Compare two secrets without leaking the position of the first mismatch.
pub fn constant_time_eq(a: impl AsRef<[u8]>, b: impl AsRef<[u8]>) -> bool {
    a.as_ref().ct_eq(b.as_ref()).into()
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC string.
    ///
    /// Parameters embedded in the PHC string take precedence over the
    /// configured ones.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> bool {
        let Ok(parsed) = PasswordHash::new(phc_hash) else {
            return false;
        };

        self.argon2()
            .verify_password(password.as_ref(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn fast_argon2() -> ArgonConfig {
    ArgonConfig {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_token() {
        let first = opaque_token().unwrap();
        let second = opaque_token().unwrap();

        assert_eq!(first.len(), OPAQUE_TOKEN_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret "));
        assert!(!constant_time_eq("", "secret"));
    }

    #[test]
    fn test_argon2() {
        let pwd = PasswordManager::new(Some(fast_argon2())).unwrap();
        let hash = pwd.hash_password("password123").unwrap();

        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(pwd.verify_password("password123", &hash));
        assert!(!pwd.verify_password("password124", &hash));
        assert!(!pwd.verify_password("password123", "not a phc string"));
    }
}
