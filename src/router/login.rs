//! `POST /oauth/login`, credential submission.
//!
//! On success an authorization code is minted and the browser is sent back
//! to the client.

use axum::Form;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ServerError;
use crate::render::LoginPrompt;
use crate::store::GrantContext;

const INVALID_CREDENTIALS: &str = "Invalid id or password.";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Body {
    pub id: String,
    pub password: String,
    pub state: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

pub async fn handler(State(state): State<AppState>, Form(body): Form<Body>) -> Response {
    // The form round-trips through the browser: check it again.
    let client = match super::verified_client(&state, &body.client_id, &body.redirect_uri) {
        Ok(client) => client,
        Err(page) => return page,
    };

    let Some(user) = state.users.authenticate(&body.id, &body.password) else {
        tracing::info!(client_id = %client.client_id, "login failed");
        return state.renderer.login(&LoginPrompt {
            client_name: client.name.clone(),
            state: body.state,
            client_id: client.client_id.clone(),
            redirect_uri: body.redirect_uri,
            scope: body.scope,
            error: Some(INVALID_CREDENTIALS.to_owned()),
        });
    };

    let context = GrantContext {
        client_id: client.client_id.clone(),
        user_id: user.id.clone(),
        redirect_uri: body.redirect_uri.clone(),
        scope: body.scope,
    };
    let code = match state.codes.issue(context, state.config.ttl.authorization_code()) {
        Ok(code) => code,
        Err(err) => {
            return ServerError::internal("cannot mint authorization code", err).into_response();
        },
    };

    tracing::info!(client_id = %client.client_id, user_id = %user.id, "authorization code issued");

    super::redirect_with(&body.redirect_uri, &[("code", &code), ("state", &body.state)])
}
