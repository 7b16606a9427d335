//! Based on JWK (RFC 7517 <https://datatracker.ietf.org/doc/html/rfc7517>).

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub keys: Vec<Key>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Key {
    pub kty: String,
    pub r#use: String,
    pub alg: String,
    pub kid: String,
    /// Modulus, base64url without padding.
    pub n: String,
    /// Public exponent, base64url without padding.
    pub e: String,
}

/// Single-entry key set with the active signing key.
pub async fn handler(State(state): State<AppState>) -> Json<Response> {
    let keys = vec![Key {
        kty: "RSA".into(),
        r#use: "sig".into(),
        alg: format!("{:?}", state.token.algorithm()),
        kid: state.keys.kid().to_owned(),
        n: state.keys.modulus().to_owned(),
        e: state.keys.exponent().to_owned(),
    }];

    Json(Response { keys })
}
