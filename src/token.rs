//! Manage json web tokens.
//!
//! Access tokens are self-contained: nothing is stored server-side and
//! validity is decided by signature, issuer and expiry alone.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};

use crate::key::KeyManager;
use crate::store::GrantContext;

pub const TOKEN_TYPE: &str = "Bearer";
pub const EXPIRATION_TIME: u64 = 60 * 15; // 15 minutes.
const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Space separated, opaque.
    pub scope: String,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
}

/// Why a token was refused. Only ever logged, callers see one outcome.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("malformed token")]
    Malformed,
    #[error("algorithm {0:?} is not allowed")]
    DisallowedAlgorithm(Algorithm),
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("claims rejected: {0}")]
    Claims(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidSignature => VerificationError::BadSignature,
            ErrorKind::InvalidAlgorithm => {
                VerificationError::DisallowedAlgorithm(SIGNING_ALGORITHM)
            },
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => VerificationError::Malformed,
            _ => VerificationError::Claims(err),
        }
    }
}

/// RSA signatures only. HMAC (`HS*`) and elliptic curve algorithms must
/// never reach the verifier.
fn is_rsa_family(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

/// Sign and verify access tokens.
#[derive(Clone, Debug)]
pub struct TokenCodec {
    algorithm: Algorithm,
    issuer: String,
    keys: Arc<KeyManager>,
}

impl TokenCodec {
    /// Create a new [`TokenCodec`] bound to `keys`.
    pub fn new(issuer: impl Into<String>, keys: Arc<KeyManager>) -> Self {
        Self {
            algorithm: SIGNING_ALGORITHM,
            issuer: issuer.into(),
            keys,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signing algorithm, as published on JWKS.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Create a new access token for a grant.
    pub fn sign(
        &self,
        grant: &GrantContext,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: grant.user_id.clone(),
            client_id: grant.client_id.clone(),
            scope: grant.scope.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + EXPIRATION_TIME,
        };

        self.encode(&claims)
    }

    pub(crate) fn encode(
        &self,
        claims: &Claims,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.keys.kid().to_owned());

        encode(&header, claims, self.keys.encoding_key())
    }

    /// Decode and check a token.
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        // The declared algorithm is checked before any key is involved.
        let header = decode_header(token).map_err(|_| VerificationError::Malformed)?;
        if !is_rsa_family(header.alg) || header.alg != self.algorithm {
            return Err(VerificationError::DisallowedAlgorithm(header.alg));
        }

        let mut validation = Validation::new(self.algorithm);
        validation.algorithms = vec![self.algorithm];
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(decode::<Claims>(token, self.keys.decoding_key(), &validation)?.claims)
    }
}
