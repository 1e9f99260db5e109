use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::error::{AuthError, AuthResult};

/// Verified identity extracted from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenCodec>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = Arc::<TokenCodec>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?;

        let token = parse_bearer(header_value)?;
        let claims = codec
            .verify_access_token(&token)
            .ok_or(AuthError::InvalidToken)?;

        Ok(Self { claims, token })
    }
}

/// Like [`AuthContext`] but never rejects: an absent or invalid token simply
/// leaves no identity attached.
#[derive(Debug, Clone)]
pub struct OptionalAuthContext(pub Option<AuthContext>);

impl OptionalAuthContext {
    pub fn identity(&self) -> Option<&AuthContext> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthContext
where
    Arc<TokenCodec>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            AuthContext::from_request_parts(parts, state).await.ok(),
        ))
    }
}

fn parse_bearer(value: &axum::http::HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::MissingToken)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Role;
    use crate::codec::TokenSubject;
    use axum::http::{HeaderValue, Request};
    use chrono::Duration;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            "access-secret",
            Duration::minutes(15),
            "refresh-secret",
            Duration::days(7),
        ))
    }

    fn issued_token(codec: &TokenCodec) -> String {
        codec
            .issue_access_token(&TokenSubject {
                user_id: 1,
                email: "user@example.com".to_string(),
                role: Role::User,
            })
            .expect("token")
    }

    fn parts_with_header(value: Option<String>) -> axum::http::request::Parts {
        let mut builder = Request::builder();
        if let Some(value) = value {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[tokio::test]
    async fn auth_context_rejects_missing_header_with_missing_token() {
        let mut parts = parts_with_header(None);
        let err = AuthContext::from_request_parts(&mut parts, &codec())
            .await
            .expect_err("should reject");
        assert!(matches!(err, AuthError::MissingToken));
    }

    #[tokio::test]
    async fn auth_context_rejects_unverifiable_token_with_invalid_token() {
        let mut parts = parts_with_header(Some("Bearer not-a-real-token".to_string()));
        let err = AuthContext::from_request_parts(&mut parts, &codec())
            .await
            .expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn auth_context_attaches_verified_identity() {
        let codec = codec();
        let token = issued_token(&codec);
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));

        let auth = AuthContext::from_request_parts(&mut parts, &codec)
            .await
            .expect("identity");
        assert_eq!(auth.claims.user_id, 1);
        assert_eq!(auth.token, token);
    }

    #[tokio::test]
    async fn optional_auth_never_rejects() {
        let codec = codec();

        let mut anonymous = parts_with_header(None);
        let ctx = OptionalAuthContext::from_request_parts(&mut anonymous, &codec)
            .await
            .expect("infallible");
        assert!(ctx.identity().is_none());

        let mut garbage = parts_with_header(Some("Bearer junk".to_string()));
        let ctx = OptionalAuthContext::from_request_parts(&mut garbage, &codec)
            .await
            .expect("infallible");
        assert!(ctx.identity().is_none());

        let token = issued_token(&codec);
        let mut valid = parts_with_header(Some(format!("Bearer {token}")));
        let ctx = OptionalAuthContext::from_request_parts(&mut valid, &codec)
            .await
            .expect("infallible");
        assert!(ctx.identity().is_some());
    }

    #[test]
    fn parse_bearer_accepts_valid_token() {
        let header = HeaderValue::from_static("Bearer abc.def.ghi");
        let token = parse_bearer(&header).expect("token");
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn parse_bearer_rejects_wrong_scheme() {
        let header = HeaderValue::from_static("Basic credentials");
        let err = parse_bearer(&header).expect_err("should reject");
        assert!(matches!(err, AuthError::MissingToken));
    }

    #[test]
    fn parse_bearer_rejects_empty_value() {
        let header = HeaderValue::from_static("Bearer    ");
        let err = parse_bearer(&header).expect_err("should reject empty token");
        assert!(matches!(err, AuthError::MissingToken));
    }
}
