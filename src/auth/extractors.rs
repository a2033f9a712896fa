use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Header the web client sends the raw token in.
pub const TOKEN_HEADER: &str = "x-auth-token";

/// Extracts and validates the bearer token, yielding the caller's user id.
///
/// Rejects before the handler body runs, so an unauthenticated request
/// never reaches an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0
    }

    /// Ownership check: only `owner` may mutate the resource.
    pub fn ensure_owner(&self, owner: Uuid, msg: &str) -> Result<(), AppError> {
        if owner == self.0 {
            Ok(())
        } else {
            warn!(user_id = %self.0, owner = %owner, "ownership check failed");
            Err(AppError::forbidden(msg))
        }
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.trim()).filter(|t| !t.is_empty());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers) else {
            warn!("request without token");
            return Err(AppError::unauthorized("No token, authorization denied"));
        };

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims.user.id)),
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                Err(AppError::unauthorized("Token is not valid"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn custom_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("abc"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers), Some("abc"));
    }

    #[test]
    fn bearer_scheme_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers), Some("xyz"));
    }

    #[test]
    fn missing_or_blank_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(token_from_headers(&headers), None);
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn ownership() {
        let me = Uuid::new_v4();
        let user = AuthUser(me);
        assert!(user.ensure_owner(me, "nope").is_ok());
        assert!(matches!(
            user.ensure_owner(Uuid::new_v4(), "nope"),
            Err(AppError::Forbidden(_))
        ));
    }
}
