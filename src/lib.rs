//! ouath is a small OAuth2 authorization server.
//!
//! It implements the Authorization Code grant with refresh token rotation,
//! signs RS256 access tokens and publishes its public key as a JWKS.

#![forbid(unsafe_code)]
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod key;
pub mod render;
mod router;
pub mod store;
pub mod telemetry;
pub mod token;
pub mod user;
mod well_known;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

pub use error::ServerError;

use client::{Client, ClientRegistry};
use crypto::PasswordManager;
use key::KeyManager;
use render::{JsonRenderer, Renderer};
use store::{AuthorizationCodeStore, RefreshTokenStore};
use token::TokenCodec;
use user::{User, UserDirectory};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    authorization: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(authorization) = authorization {
        request = request.header(header::AUTHORIZATION, authorization);
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub clients: Arc<ClientRegistry>,
    pub users: Arc<UserDirectory>,
    pub codes: Arc<AuthorizationCodeStore>,
    pub refresh_tokens: Arc<RefreshTokenStore>,
    pub keys: Arc<KeyManager>,
    pub token: Arc<TokenCodec>,
    pub renderer: Arc<dyn Renderer>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(telemetry::metrics))
        .route("/oauth/authorize", get(router::authorize::handler))
        .route("/oauth/login", post(router::login::handler))
        .route("/oauth/token", post(router::token::handler))
        .route("/oauth/userinfo", get(router::userinfo::handler))
        .route("/oauth/jwks", get(well_known::jwks::handler))
        .with_state(state.clone())
        .nest("/.well-known", well_known::well_known(state))
        .route_layer(middleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    // load or generate the signing key. RSA generation is slow, keep it off
    // the runtime threads.
    let token_config = config.token.clone();
    let keys = tokio::task::spawn_blocking(move || match &token_config.private_key_pem {
        Some(pem) => KeyManager::from_pem(token_config.key_id.clone(), pem),
        None => {
            tracing::warn!("no `token.private_key_pem` set, generating an ephemeral key pair");
            KeyManager::generate(token_config.key_id.clone(), token_config.key_size)
        },
    })
    .await??;
    let keys = Arc::new(keys);
    tracing::info!(kid = %keys.kid(), "signing key ready");

    let clients = ClientRegistry::new();
    for client in &config.clients {
        clients.register(Client::from(client.clone()))?;
    }
    if clients.is_empty() {
        tracing::warn!("no client registered, every authorization request will fail");
    }

    let pwd = PasswordManager::new(config.argon2.clone())?;
    let users = UserDirectory::new(config.users.iter().cloned().map(User::from), pwd);

    Ok(AppState {
        token: Arc::new(TokenCodec::new(&config.url, Arc::clone(&keys))),
        config,
        clients: Arc::new(clients),
        users: Arc::new(users),
        codes: Arc::new(AuthorizationCodeStore::new()),
        refresh_tokens: Arc::new(RefreshTokenStore::new()),
        keys,
        renderer: Arc::new(JsonRenderer),
        metrics,
    })
}
