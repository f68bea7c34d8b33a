//! Per-request correlation data

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use crud_common::constants::{CHANNEL_ID_HEADER, REQUEST_ID_HEADER};
use std::convert::Infallible;
use uuid::Uuid;

/// Correlation identifiers taken from the inbound request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub channel_id: Option<String>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            channel_id: None,
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The request-id layer normally sets the header; generate one if it did not run.
        let request_id = header_value(parts, REQUEST_ID_HEADER)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            request_id,
            channel_id: header_value(parts, CHANNEL_ID_HEADER),
        })
    }
}
