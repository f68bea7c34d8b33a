//! Service API key authentication
//!
//! Callers present a key in the `x-service-key` header; it must match one of
//! the keys configured through `SERVICE_API_KEYS`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use crud_common::constants::{INVALID_SERVICE_KEY_MESSAGE, SERVICE_KEY_HEADER};
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};

use crate::error::AppError;

/// Allow-list of service keys
#[derive(Clone, Debug)]
pub struct ApiKeyAuth {
    keys: Arc<[String]>,
}

impl ApiKeyAuth {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys: keys.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks `candidate` against every key without short-circuiting.
    pub fn validate(&self, candidate: &str) -> bool {
        let matched = self.keys.iter().fold(Choice::from(0), |acc, key| {
            acc | key.as_bytes().ct_eq(candidate.as_bytes())
        });
        matched.into()
    }
}

/// Middleware rejecting requests without a valid service key
pub async fn require_service_key(
    State(auth): State<ApiKeyAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let candidate = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match candidate.as_deref() {
        Some(key) if auth.validate(key) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(
                path = %request.uri().path(),
                key_present = candidate.is_some(),
                "Rejected request with invalid service key"
            );
            Err(AppError::Unauthorized(INVALID_SERVICE_KEY_MESSAGE.to_string()))
        },
    }
}
