//! `GET /oauth/userinfo`, bearer token introspection.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::token::VerificationError;

/// Identity asserted by a valid access token.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub client_id: String,
    pub scope: String,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;

    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>> {
    let token = bearer(&headers).ok_or(ServerError::InvalidToken)?;

    let claims = state.token.verify(token).map_err(|err| {
        match err {
            VerificationError::DisallowedAlgorithm(_)
            | VerificationError::BadSignature => {
                tracing::warn!(%err, "access token refused")
            },
            _ => tracing::info!(%err, "access token refused"),
        }
        ServerError::InvalidToken
    })?;

    Ok(Json(UserInfo {
        sub: claims.sub,
        client_id: claims.client_id,
        scope: claims.scope,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use http_body_util::BodyExt;

    use super::UserInfo;
    use crate::error::ResponseError;
    use crate::store::GrantContext;
    use crate::token::Claims;
    use crate::*;

    fn grant() -> GrantContext {
        GrantContext {
            client_id: "app1".into(),
            user_id: "alice".into(),
            redirect_uri: "http://cb/".into(),
            scope: "profile".into(),
        }
    }

    #[tokio::test]
    async fn test_userinfo() {
        let state = router::state();
        let token = state.token.sign(&grant()).unwrap();

        let response = make_request(
            app(state),
            Method::GET,
            "/oauth/userinfo",
            Some(&format!("Bearer {token}")),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let info: UserInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            info,
            UserInfo {
                sub: "alice".into(),
                client_id: "app1".into(),
                scope: "profile".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_refused_tokens_look_the_same() {
        let state = router::state();
        let now = chrono::Utc::now().timestamp() as u64;
        let expired = state
            .token
            .encode(&Claims {
                sub: "alice".into(),
                client_id: "app1".into(),
                scope: String::default(),
                iss: state.token.issuer().to_owned(),
                iat: now - 1000,
                exp: now - 10,
            })
            .unwrap();

        for authorization in [
            None,
            Some("Bearer".to_owned()),
            Some("Bearer not-a-token".to_owned()),
            Some(format!("Basic {expired}")),
            Some(format!("Bearer {expired}")),
        ] {
            let response = make_request(
                app(state.clone()),
                Method::GET,
                "/oauth/userinfo",
                authorization.as_deref(),
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let body: ResponseError = serde_json::from_slice(&body).unwrap();
            assert_eq!(
                body,
                ResponseError {
                    error: "invalid_token".into(),
                    error_description: None,
                }
            );
        }
    }
}
