//! Login prompt and error page rendering.
//!
//! Page templates live outside the protocol core. The server only hands a
//! [`LoginPrompt`] to a [`Renderer`]; the default one answers with JSON so a
//! front-end can draw the form itself.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Everything the login form needs to post back to `/oauth/login`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginPrompt {
    pub client_name: String,
    pub state: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal error page body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPage {
    pub error: String,
}

/// Page renderer.
pub trait Renderer: Send + Sync {
    /// Login form, shown with `200 OK`.
    fn login(&self, prompt: &LoginPrompt) -> Response;

    /// Page shown when the request cannot be redirected back to the client.
    fn error(&self, status: StatusCode, message: &str) -> Response;
}

/// Render pages as JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn login(&self, prompt: &LoginPrompt) -> Response {
        (StatusCode::OK, Json(prompt)).into_response()
    }

    fn error(&self, status: StatusCode, message: &str) -> Response {
        (
            status,
            Json(ErrorPage {
                error: message.to_owned(),
            }),
        )
            .into_response()
    }
}
