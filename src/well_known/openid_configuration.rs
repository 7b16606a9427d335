//! Authorization server metadata (RFC 8414), also served as OpenID Connect
//! Discovery.
//!
//! Paths: `/.well-known/oauth-authorization-server` and
//! `/.well-known/openid-configuration`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const AUTHORIZATION_ENDPOINT: &str = "/oauth/authorize";
const TOKEN_ENDPOINT: &str = "/oauth/token";
const USERINFO_ENDPOINT: &str = "/oauth/userinfo";
const JWKS_ENDPOINT: &str = "/oauth/jwks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
}

pub async fn handler(
    State(state): State<AppState>,
) -> Result<Json<Response>, StatusCode> {
    build_response(&state).map(Json)
}

fn build_response(state: &AppState) -> Result<Response, StatusCode> {
    let issuer = &state.config.url;

    Ok(Response {
        issuer: issuer.clone(),
        authorization_endpoint: join_url(issuer, AUTHORIZATION_ENDPOINT)?,
        token_endpoint: join_url(issuer, TOKEN_ENDPOINT)?,
        userinfo_endpoint: join_url(issuer, USERINFO_ENDPOINT)?,
        jwks_uri: join_url(issuer, JWKS_ENDPOINT)?,
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec![
            "authorization_code".to_string(),
            "refresh_token".to_string(),
        ],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
        ],
        id_token_signing_alg_values_supported: vec![format!(
            "{:?}",
            state.token.algorithm()
        )],
        subject_types_supported: vec!["public".to_string()],
    })
}

/// Append `path` to the issuer, keeping any path the issuer already has.
fn join_url(issuer: &str, path: &str) -> Result<String, StatusCode> {
    Url::parse(&format!("{issuer}{path}"))
        .map(|u| u.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
