//! Server signing key pair.
//!
//! One RSA key pair lives for the whole process. It is built explicitly at
//! startup and shared read-only afterwards.

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

pub const DEFAULT_KID: &str = "ouath-key-1";
pub const DEFAULT_KEY_SIZE: usize = 2048;
const MIN_KEY_SIZE: usize = 2048;

/// Error related to the signing key.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error(transparent)]
    Rsa(#[from] rsa::Error),
    #[error(transparent)]
    Pkcs1(#[from] rsa::pkcs1::Error),
    #[error(transparent)]
    Pkcs8(#[from] rsa::pkcs8::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("key size is {value} bits while at least {excepted} is excepted")]
    KeySize { value: usize, excepted: usize },
    #[error("unknown private key format")]
    UnknownFormat,
}

/// Owner of the asymmetric key pair.
pub struct KeyManager {
    kid: String,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    modulus: String,
    exponent: String,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("kid", &self.kid)
            .field("bits", &(self.public_key.size() * 8))
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    /// Generate a fresh RSA key pair.
    pub fn generate(kid: impl Into<String>, bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_KEY_SIZE {
            return Err(KeyError::KeySize {
                value: bits,
                excepted: MIN_KEY_SIZE,
            });
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, bits)?;
        Self::from_private_key(kid, private_key)
    }

    /// Load a PKCS#1 (`BEGIN RSA PRIVATE KEY`) or PKCS#8 (`BEGIN PRIVATE
    /// KEY`) PEM document.
    pub fn from_pem(kid: impl Into<String>, pem: &str) -> Result<Self, KeyError> {
        let private_key = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem)?
        } else if pem.contains("BEGIN PRIVATE KEY") {
            RsaPrivateKey::from_pkcs8_pem(pem)?
        } else {
            return Err(KeyError::UnknownFormat);
        };

        let bits = private_key.size() * 8;
        if bits < MIN_KEY_SIZE {
            return Err(KeyError::KeySize {
                value: bits,
                excepted: MIN_KEY_SIZE,
            });
        }

        Self::from_private_key(kid, private_key)
    }

    fn from_private_key(
        kid: impl Into<String>,
        private_key: RsaPrivateKey,
    ) -> Result<Self, KeyError> {
        let public_key = RsaPublicKey::from(&private_key);

        let der = private_key.to_pkcs1_der()?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let modulus = Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be());
        let exponent = Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&modulus, &exponent)?;

        Ok(Self {
            kid: kid.into(),
            public_key,
            encoding_key,
            decoding_key,
            modulus,
            exponent,
        })
    }

    /// Key identifier.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public verification key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Modulus, base64url without padding.
    pub fn modulus(&self) -> &str {
        &self.modulus
    }

    /// Public exponent, base64url without padding.
    pub fn exponent(&self) -> &str {
        &self.exponent
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Key generation takes a while, tests share one pair.
#[cfg(test)]
pub(crate) fn test_key() -> std::sync::Arc<KeyManager> {
    use std::sync::{Arc, OnceLock};

    static KEY: OnceLock<Arc<KeyManager>> = OnceLock::new();
    Arc::clone(KEY.get_or_init(|| {
        Arc::new(
            KeyManager::generate(DEFAULT_KID, DEFAULT_KEY_SIZE)
                .expect("cannot generate RSA key"),
        )
    }))
}
