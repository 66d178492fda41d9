//! Bearer-token gate for the HTTP transport.
//!
//! Every request passes through [`require_bearer`] before routing, so an
//! unauthenticated caller gets the same 401 whether or not the path exists.
//! An empty configured key turns the gate off entirely; the listener logs a
//! warning at startup when that happens.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

const BEARER_SCHEME: &str = "Bearer ";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Bearer token.")]
    MissingToken,
    #[error("Invalid API key.")]
    InvalidToken,
}

/// Who the gate let through. Attached to the request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// No key is configured; everyone is admitted.
    Anonymous,
    /// Presented the configured key.
    ApiKeyUser,
}

/// Shared credential check.
#[derive(Clone)]
pub struct AuthGate {
    credential: Arc<str>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl AuthGate {
    pub fn new(credential: impl AsRef<str>) -> Self {
        Self {
            credential: Arc::from(credential.as_ref()),
        }
    }

    /// True when no credential is configured and all requests are admitted.
    pub fn is_open(&self) -> bool {
        self.credential.is_empty()
    }

    /// Check the `Authorization` header of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        if self.is_open() {
            return Ok(Identity::Anonymous);
        }

        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;

        if constant_time_eq(token.as_bytes(), self.credential.as_bytes()) {
            Ok(Identity::ApiKeyUser)
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// Extract the token from `Bearer <token>`. The scheme is case-insensitive.
fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let scheme = value.get(..BEARER_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    Some(value[BEARER_SCHEME.len()..].trim())
}

fn constant_time_eq(presented: &[u8], expected: &[u8]) -> bool {
    presented.ct_eq(expected).into()
}

/// Axum middleware enforcing the gate on every request.
pub async fn require_bearer(State(gate): State<AuthGate>, mut request: Request, next: Next) -> Response {
    let checked = {
        let span = tracing::info_span!("auth.check", method = %request.method());
        let _entered = span.enter();
        let checked = gate.authenticate(request.headers());
        if let Err(reason) = &checked {
            tracing::warn!(
                target: "auth",
                method = %request.method(),
                %reason,
                "Rejected unauthenticated request"
            );
        }
        checked
    };

    match checked {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(reason) => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            reason.to_string(),
        )
            .into_response(),
    }
}
