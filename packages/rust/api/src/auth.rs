//! Bearer token authentication.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use docintel_shared::{DocIntelError, Result};

use crate::AppState;
use crate::error::ApiError;

/// Caller identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub role: String,
}

/// Validates `Authorization: Bearer <token>` headers.
///
/// With no expected token configured, any non-empty token is accepted.
#[derive(Debug, Clone)]
pub struct Authenticator {
    expected_token: Option<String>,
    role: String,
}

impl Authenticator {
    pub fn new(expected_token: Option<String>, role: impl Into<String>) -> Self {
        Self {
            expected_token,
            role: role.into(),
        }
    }

    /// True when requests are checked against a configured token.
    pub fn enforcing(&self) -> bool {
        self.expected_token.is_some()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| DocIntelError::Auth("missing Authorization header".into()))?
            .to_str()
            .map_err(|_| DocIntelError::Auth("malformed Authorization header".into()))?;

        let token = match value.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => return Err(DocIntelError::Auth("expected a Bearer token".into())),
        };
        if token.is_empty() {
            return Err(DocIntelError::Auth("empty bearer token".into()));
        }

        if let Some(expected) = &self.expected_token {
            if token != expected {
                debug!("rejected bearer token");
                return Err(DocIntelError::Auth("invalid token".into()));
            }
        }

        Ok(AuthenticatedUser {
            role: self.role.clone(),
        })
    }
}

/// Rejects the request with 401 before any body extractor runs.
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(state.auth.authenticate(&parts.headers)?)
    }
}
