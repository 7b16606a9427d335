//! OAuth2 HTTP API.
pub mod authorize;
pub mod login;
pub mod status;
pub mod token;
pub mod userinfo;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::AppState;
use crate::client::Client;

const INVALID_CLIENT_OR_REDIRECT: &str = "Invalid client_id or redirect_uri.";

/// Resolve `client_id` and check `redirect_uri` against it.
///
/// Both failures end on a terminal error page: the redirect target is not
/// trusted yet, so nothing may be sent there.
pub(crate) fn verified_client(
    state: &AppState,
    client_id: &str,
    redirect_uri: &str,
) -> std::result::Result<Arc<Client>, Response> {
    match state.clients.lookup(client_id) {
        Some(client) if client.is_allowed_redirect(redirect_uri) => Ok(client),
        Some(_) => {
            tracing::warn!(%client_id, %redirect_uri, "unregistered redirect_uri");
            Err(state.renderer.error(StatusCode::BAD_REQUEST, INVALID_CLIENT_OR_REDIRECT))
        },
        None => {
            tracing::warn!(%client_id, "unknown client_id");
            Err(state.renderer.error(StatusCode::BAD_REQUEST, INVALID_CLIENT_OR_REDIRECT))
        },
    }
}

/// `302 Found` to `redirect_uri` with `params` appended to its query.
pub(crate) fn redirect_with(redirect_uri: &str, params: &[(&str, &str)]) -> Response {
    let Ok(mut url) = Url::parse(redirect_uri) else {
        // Registered URIs are validated at startup.
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    url.query_pairs_mut().extend_pairs(params);

    (StatusCode::FOUND, [(axum::http::header::LOCATION, url.to_string())]).into_response()
}

/// Test fixture: isolated state with client `app1:s` and user
/// `alice:password123`.
#[cfg(test)]
pub fn state() -> AppState {
    use crate::client::ClientRegistry;
    use crate::config::Configuration;
    use crate::crypto::{PasswordManager, fast_argon2};
    use crate::render::JsonRenderer;
    use crate::store::{AuthorizationCodeStore, RefreshTokenStore};
    use crate::token::TokenCodec;
    use crate::user::{User, UserDirectory};

    let config = Arc::new(
        Configuration::default()
            .with_overrides(None, None)
            .expect("default configuration"),
    );

    let clients = ClientRegistry::new();
    clients
        .register(Client::new("Example App", ["http://cb/"]).with_credentials("app1", "s"))
        .expect("cannot register app1");
    clients
        .register(Client::new("Other App", ["http://other/cb"]).with_credentials("app2", "t"))
        .expect("cannot register app2");

    let pwd = PasswordManager::new(Some(fast_argon2())).expect("argon2 params");
    let alice = User {
        id: "alice".into(),
        password_hash: pwd.hash_password("password123").expect("hash"),
    };

    let keys = crate::key::test_key();
    AppState {
        token: Arc::new(TokenCodec::new(&config.url, Arc::clone(&keys))),
        config,
        clients: Arc::new(clients),
        users: Arc::new(UserDirectory::new([alice], pwd)),
        codes: Arc::new(AuthorizationCodeStore::new()),
        refresh_tokens: Arc::new(RefreshTokenStore::new()),
        keys,
        renderer: Arc::new(JsonRenderer),
        metrics: None,
    }
}
