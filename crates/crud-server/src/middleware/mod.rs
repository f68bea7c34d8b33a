//! Middleware for the CRUD server
//!
//! This module provides middleware for:
//! - CORS (Cross-Origin Resource Sharing)
//! - Request logging with tracing
//! - Request id assignment and propagation

use axum::http::{header, HeaderName, Method};
use crud_common::constants::{REQUEST_ID_HEADER, REQUIRED_REQUEST_HEADERS, SERVICE_KEY_HEADER};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::CorsConfig;

/// Create CORS layer from configuration
///
/// Returns `None` when CORS is disabled.
pub fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let mut allowed_headers = vec![
        header::ACCEPT,
        header::CONTENT_TYPE,
        HeaderName::from_static(SERVICE_KEY_HEADER),
    ];
    allowed_headers.extend(REQUIRED_REQUEST_HEADERS.map(HeaderName::from_static));

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(allowed_headers)
        .max_age(Duration::from_secs(3600));

    let wildcard =
        config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");

    if wildcard {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Browsers refuse credentials with a wildcard origin.
    if config.allow_credentials && !wildcard {
        cors = cors.allow_credentials(true);
    }

    Some(cors)
}

/// Create tracing/logging layer
pub fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Assigns a UUID `x-request-id` to requests that arrive without one
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER), MakeRequestUuid)
}

/// Copies `x-request-id` from the request onto the response
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors_config(enabled: bool, origins: &[&str], allow_credentials: bool) -> CorsConfig {
        CorsConfig {
            enabled,
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
            allow_credentials,
        }
    }

    #[test]
    fn test_cors_disabled() {
        assert!(cors_layer(&cors_config(false, &["http://localhost:3000"], true)).is_none());
    }

    #[test]
    fn test_cors_layer_with_specific_origins() {
        let config = cors_config(
            true,
            &["http://localhost:3000", "https://example.com"],
            true,
        );
        assert!(cors_layer(&config).is_some());
    }

    #[test]
    fn test_cors_layer_with_wildcard_and_credentials() {
        // Would panic inside tower-http if credentials were combined with `Any`.
        let config = cors_config(true, &["*"], true);
        assert!(cors_layer(&config).is_some());
    }
}
