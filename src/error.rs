//! Error handler for ouath.
//!
//! Every per-request failure is classified into one [`ServerError`] kind
//! before it reaches the HTTP boundary. The response body follows RFC 6749
//! section 5.2: `{"error": "<code>", "error_description": "<text>"}`.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad or missing Basic credentials, unknown client or secret mismatch.
    #[error("client authentication failed")]
    InvalidClient,

    /// Missing required parameter.
    #[error("{0}")]
    InvalidRequest(String),

    /// Code or refresh token not found, expired or bound to another
    /// client/redirect URI. Kept opaque on purpose.
    #[error("invalid authorization grant")]
    InvalidGrant,

    #[error("unsupported grant type")]
    UnsupportedGrantType,

    /// Bearer token failed verification. Carries no detail.
    #[error("invalid access token")]
    InvalidToken,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Wrap any error into [`ServerError::Internal`].
    pub fn internal<E>(details: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.to_owned(),
            source: Some(Box::new(err)),
        }
    }

    /// OAuth2 error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::InvalidClient => "invalid_client",
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::InvalidGrant => "invalid_grant",
            ServerError::UnsupportedGrantType => "unsupported_grant_type",
            ServerError::InvalidToken => "invalid_token",
            ServerError::Internal { .. } => "server_error",
        }
    }

    /// HTTP status matching the error code.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidClient | ServerError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            },
            ServerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// JSON error body.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let description = match &self {
            ServerError::InvalidToken => None,
            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");
                Some("internal server error".to_owned())
            },
            err => Some(err.to_string()),
        };

        let body = ResponseError {
            error: self.code().to_owned(),
            error_description: description,
        };
        let mut response = (self.status(), axum::Json(body)).into_response();

        let challenge = match self {
            ServerError::InvalidClient => Some(r#"Basic realm="ouath""#),
            ServerError::InvalidToken => Some(r#"Bearer error="invalid_token""#),
            _ => None,
        };
        if let Some(challenge) = challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(challenge),
            );
        }

        response
    }
}
