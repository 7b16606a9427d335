//! `POST /oauth/token`, code and refresh token exchange.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::client::Client;
use crate::error::{Result, ServerError};
use crate::store::GrantContext;
use crate::token::{EXPIRATION_TIME, TOKEN_TYPE};

const AUTHORIZATION_CODE: &str = "authorization_code";
const REFRESH_TOKEN: &str = "refresh_token";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Body {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

/// Successful token response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
}

/// Split `Authorization: Basic base64(id:secret)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = Base64::decode_vec(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;

    Some((id.to_owned(), secret.to_owned()))
}

/// Required, non-empty form field.
fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ServerError::InvalidRequest(format!("missing `{name}` parameter"))),
    }
}

pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Form<Body>, FormRejection>,
) -> Result<Response> {
    let client = basic_credentials(&headers)
        .and_then(|(id, secret)| state.clients.authenticate(&id, &secret))
        .ok_or_else(|| {
            tracing::info!("client authentication failed");
            ServerError::InvalidClient
        })?;

    let Form(body) = body.map_err(|rejection| {
        ServerError::InvalidRequest(rejection.body_text())
    })?;

    let grant_type = required(body.grant_type, "grant_type")?;
    let context = match grant_type.as_str() {
        AUTHORIZATION_CODE => {
            let code = required(body.code, "code")?;
            let redirect_uri = required(body.redirect_uri, "redirect_uri")?;
            exchange_code(&state, &client, &code, &redirect_uri)?
        },
        REFRESH_TOKEN => {
            let refresh_token = required(body.refresh_token, REFRESH_TOKEN)?;
            rotate_refresh_token(&state, &client, &refresh_token)?
        },
        _ => return Err(ServerError::UnsupportedGrantType),
    };

    issue_tokens(&state, &context, &grant_type)
}

/// Consume `code`. It stays consumed whatever the checks below decide.
fn exchange_code(
    state: &AppState,
    client: &Arc<Client>,
    code: &str,
    redirect_uri: &str,
) -> Result<GrantContext> {
    let grant = state.codes.redeem(code).ok_or(ServerError::InvalidGrant)?;

    if grant.context.client_id != client.client_id {
        tracing::warn!(
            client_id = %client.client_id,
            "authorization code presented by another client"
        );
        return Err(ServerError::InvalidGrant);
    }
    if grant.context.redirect_uri != redirect_uri {
        tracing::warn!(client_id = %client.client_id, "redirect_uri mismatch");
        return Err(ServerError::InvalidGrant);
    }

    Ok(grant.context)
}

fn rotate_refresh_token(
    state: &AppState,
    client: &Arc<Client>,
    refresh_token: &str,
) -> Result<GrantContext> {
    let grant = state
        .refresh_tokens
        .redeem(refresh_token)
        .ok_or(ServerError::InvalidGrant)?;

    if grant.context.client_id != client.client_id {
        tracing::warn!(
            client_id = %client.client_id,
            "refresh token presented by another client"
        );
        return Err(ServerError::InvalidGrant);
    }

    Ok(grant.context)
}

/// Sign an access token and mint exactly one refresh token for `context`.
pub(crate) fn issue_tokens(
    state: &AppState,
    context: &GrantContext,
    grant_type: &str,
) -> Result<Response> {
    let access_token = state
        .token
        .sign(context)
        .map_err(|err| ServerError::internal("cannot sign access token", err))?;
    let refresh_token = state
        .refresh_tokens
        .issue(context.clone(), state.config.ttl.refresh_token())
        .map_err(|err| ServerError::internal("cannot mint refresh token", err))?;

    metrics::counter!("oauth_tokens_issued_total", "grant_type" => grant_type.to_owned())
        .increment(1);
    tracing::info!(
        client_id = %context.client_id,
        user_id = %context.user_id,
        grant_type,
        "tokens issued"
    );

    let mut response = Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE.to_owned(),
        expires_in: EXPIRATION_TIME,
        refresh_token,
    })
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use base64ct::{Base64, Encoding};
    use chrono::Duration;
    use http_body_util::BodyExt;

    use super::TokenResponse;
    use crate::error::ResponseError;
    use crate::store::GrantContext;
    use crate::*;

    fn basic(id: &str, secret: &str) -> String {
        format!("Basic {}", Base64::encode_string(format!("{id}:{secret}").as_bytes()))
    }

    fn context(client_id: &str, redirect_uri: &str) -> GrantContext {
        GrantContext {
            client_id: client_id.into(),
            user_id: "alice".into(),
            redirect_uri: redirect_uri.into(),
            scope: "profile".into(),
        }
    }

    async fn exchange(
        state: &AppState,
        credentials: Option<&str>,
        body: &str,
    ) -> (StatusCode, axum::body::Bytes) {
        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/oauth/token",
            credentials,
            body.to_owned(),
        )
        .await;
        let status = response.status();
        (status, response.into_body().collect().await.unwrap().to_bytes())
    }

    fn error_code(body: &[u8]) -> String {
        serde_json::from_slice::<ResponseError>(body).unwrap().error
    }

    #[tokio::test]
    async fn test_authorization_code_flow() {
        let state = router::state();
        let app1 = basic("app1", "s");

        // authorize.
        let response = make_request(
            app(state.clone()),
            Method::GET,
            "/oauth/authorize?response_type=code&client_id=app1&redirect_uri=http://cb/&state=xyz",
            None,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // login.
        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/oauth/login",
            None,
            "id=alice&password=password123&state=xyz&client_id=app1&redirect_uri=http%3A%2F%2Fcb%2F"
                .into(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        let url = url::Url::parse(location).unwrap();
        let code = url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert!(location.ends_with("&state=xyz"));

        // exchange.
        let form = format!("grant_type=authorization_code&code={code}&redirect_uri=http%3A%2F%2Fcb%2F");
        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/oauth/token",
            Some(&app1),
            form.clone(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let tokens: TokenResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 900);
        assert_eq!(tokens.refresh_token.len(), 64);
        assert_eq!(state.refresh_tokens.len(), 1);

        let claims = state.token.verify(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.client_id, "app1");

        // replay.
        let (status, body) = exchange(&state, Some(&app1), &form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_grant");
    }

    #[tokio::test]
    async fn test_code_bound_to_client_and_redirect() {
        let state = router::state();

        let code = state
            .codes
            .issue(context("app1", "http://cb/"), Duration::minutes(10))
            .unwrap();
        let (status, body) = exchange(
            &state,
            Some(&basic("app2", "t")),
            &format!("grant_type=authorization_code&code={code}&redirect_uri=http%3A%2F%2Fcb%2F"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_grant");
        // consumed anyway.
        assert!(state.codes.is_empty());

        let code = state
            .codes
            .issue(context("app1", "http://cb/"), Duration::minutes(10))
            .unwrap();
        let (status, body) = exchange(
            &state,
            Some(&basic("app1", "s")),
            &format!("grant_type=authorization_code&code={code}&redirect_uri=http%3A%2F%2Fcb%2Fother"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_grant");
        assert!(state.refresh_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_expired_code() {
        let state = router::state();
        let code = state
            .codes
            .issue(context("app1", "http://cb/"), Duration::seconds(-1))
            .unwrap();

        let (status, body) = exchange(
            &state,
            Some(&basic("app1", "s")),
            &format!("grant_type=authorization_code&code={code}&redirect_uri=http%3A%2F%2Fcb%2F"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_grant");
    }

    #[tokio::test]
    async fn test_refresh_token_rotation() {
        let state = router::state();
        let app1 = basic("app1", "s");
        let old = state
            .refresh_tokens
            .issue(context("app1", "http://cb/"), Duration::days(7))
            .unwrap();

        let form = format!("grant_type=refresh_token&refresh_token={old}");
        let (status, body) = exchange(&state, Some(&app1), &form).await;
        assert_eq!(status, StatusCode::OK);
        let tokens: TokenResponse = serde_json::from_slice(&body).unwrap();
        assert_ne!(tokens.refresh_token, old);
        assert_eq!(state.refresh_tokens.len(), 1);

        // the old value is gone.
        let (status, body) = exchange(&state, Some(&app1), &form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_grant");

        // the new one works once.
        let (status, _) = exchange(
            &state,
            Some(&app1),
            &format!("grant_type=refresh_token&refresh_token={}", tokens.refresh_token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_token_bound_to_client() {
        let state = router::state();
        let token = state
            .refresh_tokens
            .issue(context("app1", "http://cb/"), Duration::days(7))
            .unwrap();

        let (status, body) = exchange(
            &state,
            Some(&basic("app2", "t")),
            &format!("grant_type=refresh_token&refresh_token={token}"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_grant");
        assert!(state.refresh_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_client_authentication() {
        let state = router::state();
        let form = "grant_type=refresh_token&refresh_token=abc";

        for credentials in [
            None,
            Some(basic("app1", "wrong")),
            Some(basic("nobody", "s")),
            Some("Basic !!!".to_owned()),
            Some("Bearer abc".to_owned()),
        ] {
            let response = make_request(
                app(state.clone()),
                Method::POST,
                "/oauth/token",
                credentials.as_deref(),
                form.to_owned(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(error_code(&body), "invalid_client");
        }
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let state = router::state();
        let app1 = basic("app1", "s");

        for form in [
            "",
            "grant_type=authorization_code",
            "grant_type=authorization_code&code=abc",
            "grant_type=authorization_code&code=&redirect_uri=http%3A%2F%2Fcb%2F",
            "grant_type=refresh_token",
        ] {
            let (status, body) = exchange(&state, Some(&app1), form).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{form}");
            assert_eq!(error_code(&body), "invalid_request", "{form}");
        }
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let state = router::state();

        let (status, body) = exchange(
            &state,
            Some(&basic("app1", "s")),
            "grant_type=password&username=alice&password=password123",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "unsupported_grant_type");
    }
}
