pub mod jwks;
pub mod openid_configuration;

use axum::Router;
use axum::routing::get;

use crate::AppState;

pub fn well_known(state: AppState) -> Router {
    Router::new()
        .route("/jwks.json", get(jwks::handler))
        .route(
            "/oauth-authorization-server",
            get(openid_configuration::handler),
        )
        .route(
            "/openid-configuration",
            get(openid_configuration::handler),
        )
        .with_state(state)
}
