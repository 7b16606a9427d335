//! `GET /oauth/authorize`, start of the authorization code flow.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::render::LoginPrompt;

const RESPONSE_TYPE_CODE: &str = "code";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub scope: String,
}

/// Validate, in order: client, exact redirect URI, then response type.
///
/// No code is minted here; that waits for the credentials posted to
/// `/oauth/login`.
pub async fn handler(State(state): State<AppState>, Query(params): Query<Params>) -> Response {
    let client = match super::verified_client(&state, &params.client_id, &params.redirect_uri) {
        Ok(client) => client,
        Err(page) => return page,
    };

    // From here on the redirect target is trusted.
    if params.response_type != RESPONSE_TYPE_CODE {
        tracing::info!(
            client_id = %client.client_id,
            response_type = %params.response_type,
            "unsupported response_type"
        );
        return super::redirect_with(
            &params.redirect_uri,
            &[("error", "unsupported_response_type"), ("state", &params.state)],
        );
    }

    state.renderer.login(&LoginPrompt {
        client_name: client.name.clone(),
        state: params.state,
        client_id: client.client_id.clone(),
        redirect_uri: params.redirect_uri,
        scope: params.scope,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use http_body_util::BodyExt;

    use crate::render::{ErrorPage, LoginPrompt};
    use crate::*;

    async fn authorize(query: &str) -> axum::http::Response<axum::body::Body> {
        let app = app(router::state());
        make_request(app, Method::GET, &format!("/oauth/authorize?{query}"), None, String::default())
            .await
    }

    #[tokio::test]
    async fn test_prompt() {
        let response = authorize(
            "response_type=code&client_id=app1&redirect_uri=http%3A%2F%2Fcb%2F&state=xyz&scope=profile",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let prompt: LoginPrompt = serde_json::from_slice(&body).unwrap();
        assert_eq!(prompt.client_name, "Example App");
        assert_eq!(prompt.client_id, "app1");
        assert_eq!(prompt.redirect_uri, "http://cb/");
        assert_eq!(prompt.state, "xyz");
        assert_eq!(prompt.scope, "profile");
        assert_eq!(prompt.error, None);
    }

    #[tokio::test]
    async fn test_unknown_client_is_not_redirected() {
        let response =
            authorize("response_type=token&client_id=nobody&redirect_uri=http%3A%2F%2Fcb%2F&state=xyz")
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(header::LOCATION));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page: ErrorPage = serde_json::from_slice(&body).unwrap();
        assert!(!page.error.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_redirect_is_not_redirected() {
        // checked before response_type, even when both are wrong.
        for redirect_uri in ["http%3A%2F%2Fcb%2F.evil.com", "http%3A%2F%2Fcb", "http%3A%2F%2Fother%2Fcb"] {
            let response = authorize(&format!(
                "response_type=token&client_id=app1&redirect_uri={redirect_uri}&state=xyz"
            ))
            .await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(!response.headers().contains_key(header::LOCATION));
        }
    }

    #[tokio::test]
    async fn test_unsupported_response_type_redirects() {
        let response =
            authorize("response_type=token&client_id=app1&redirect_uri=http%3A%2F%2Fcb%2F&state=xyz")
                .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://cb/?error=unsupported_response_type&state=xyz"
        );
    }
}
