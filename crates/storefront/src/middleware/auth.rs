//! Authentication extractors.
//!
//! Authentication itself is an external capability: login and registration
//! live elsewhere and this service only verifies tokens. A request may carry
//! a JWT either as an `Authorization: Bearer` header or in the `token`
//! cookie; verification yields a [`Principal`] with an id and a role.
//!
//! Handlers opt into one of three extractors:
//! - [`OptionalPrincipal`] - guest checkout permitted, principal attached
//!   when a valid token is present
//! - [`RequireAuth`] - 401 without a valid principal
//! - [`RequireAdmin`] - 401 without a valid admin principal

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use velour_core::{Role, UserId};

use crate::error::AppError;
use crate::state::AppState;

const COOKIE_NAME: &str = "token";
const TOKEN_TTL_DAYS: i64 = 7;

/// JWT claims carried by storefront tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id (24-char hex)
    pub id: String,
    /// Principal role
    pub role: Role,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    #[serde(default)]
    pub iat: usize,
}

/// Authenticated identity resolved from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

/// Create a signed token for a principal. The storefront itself never issues
/// tokens in production; this mirrors the external provider's format for the
/// dev seed path and tests.
///
/// # Errors
///
/// Returns the underlying `jsonwebtoken` error if signing fails.
pub fn sign_token(
    user: &UserId,
    role: Role,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    #[allow(clippy::cast_sign_loss)]
    let claims = Claims {
        id: user.as_str().to_owned(),
        role,
        exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Pull the raw token out of the Authorization header or the token cookie.
fn raw_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        && let Some(token) = header.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_owned());
    }

    let cookies = parts
        .headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())?;
    for pair in cookies.split(';') {
        let pair = pair.trim();
        if let Some(value) = pair.strip_prefix("token=")
            && !value.is_empty()
        {
            // Cookie values arrive percent-encoded.
            return urlencoding::decode(value).ok().map(|v| v.into_owned());
        }
    }
    None
}

/// Verify a token and build the principal. Any failure yields `None`; the
/// extractors decide whether that is a rejection.
fn verify(parts: &Parts, secret: &[u8]) -> Option<Principal> {
    let token = raw_token(parts)?;
    let decoded = jsonwebtoken::decode::<Claims>(
        &token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map_err(|err| {
        tracing::debug!(error = %err, "JWT validation failed");
        err
    })
    .ok()?;

    let id = UserId::parse(&decoded.claims.id).ok()?;
    Some(Principal {
        id,
        role: decoded.claims.role,
    })
}

/// Extractor that optionally resolves a principal; never rejects.
pub struct OptionalPrincipal(pub Option<Principal>);

impl FromRequestParts<AppState> for OptionalPrincipal {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(verify(parts, state.config().jwt_secret_bytes())))
    }
}

/// Extractor that requires a valid principal.
pub struct RequireAuth(pub Principal);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verify(parts, state.config().jwt_secret_bytes())
            .map(Self)
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor that requires a valid admin principal.
pub struct RequireAdmin(pub Principal);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal =
            verify(parts, state.config().jwt_secret_bytes()).ok_or(AppError::Unauthorized)?;
        if !principal.role.is_admin() {
            return Err(AppError::Unauthorized);
        }
        Ok(Self(principal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    const SECRET: &[u8] = b"k9PzR2mWq7vT4xH8bN3cJ6fL1dY5gA0e";
    const USER_HEX: &str = "64b1f0a2c3d4e5f601000099";

    fn parts_with_header(name: axum::http::HeaderName, value: String) -> Parts {
        let request = Request::builder()
            .uri("/api/orders")
            .header(name, value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    #[test]
    fn test_bearer_token_round_trip() {
        let user = UserId::parse(USER_HEX).unwrap();
        let token = sign_token(&user, Role::Admin, SECRET).unwrap();
        let parts = parts_with_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}"),
        );

        let principal = verify(&parts, SECRET).unwrap();
        assert_eq!(principal.id, user);
        assert_eq!(principal.role, Role::Admin);
    }

    #[test]
    fn test_cookie_token_round_trip() {
        let user = UserId::parse(USER_HEX).unwrap();
        let token = sign_token(&user, Role::User, SECRET).unwrap();
        let encoded = urlencoding::encode(&token).into_owned();
        let parts = parts_with_header(
            axum::http::header::COOKIE,
            format!("session=abc; token={encoded}"),
        );

        let principal = verify(&parts, SECRET).unwrap();
        assert_eq!(principal.role, Role::User);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let user = UserId::parse(USER_HEX).unwrap();
        let token = sign_token(&user, Role::Admin, b"another-secret-another-secret-...").unwrap();
        let parts = parts_with_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}"),
        );
        assert!(verify(&parts, SECRET).is_none());
    }

    #[test]
    fn test_missing_token_is_none() {
        let request = Request::builder().uri("/api/orders").body(()).unwrap();
        let parts = request.into_parts().0;
        assert!(verify(&parts, SECRET).is_none());
    }
}
