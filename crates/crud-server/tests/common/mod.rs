//! Shared helpers for the router-level tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use crud_server::{
    app::{create_router, AppState},
    config::{Config, Environment},
    health::{HealthIndicator, HealthService, IndicatorResult},
    store::{memory::MemoryDataSource, DataSource},
};

pub const TEMPLATE_PATH: &str = "/api/v1/crud-template";

/// Test configuration: in-memory store, no auth, no ping
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.app.environment = Environment::Test;
    config
}

/// Health indicator with a fixed answer
pub struct StaticIndicator {
    pub key: &'static str,
    pub up: bool,
}

#[async_trait::async_trait]
impl HealthIndicator for StaticIndicator {
    fn key(&self) -> &str {
        self.key
    }

    async fn check(&self) -> IndicatorResult {
        if self.up {
            IndicatorResult::up(self.key, Default::default())
        } else {
            IndicatorResult::down(self.key, Default::default())
        }
    }
}

pub fn healthy_checks() -> HealthService {
    HealthService::new()
        .with_disk(StaticIndicator { key: "ms-disk", up: true })
        .with_memory(StaticIndicator { key: "memory_heap", up: true })
        .with_memory(StaticIndicator { key: "memory_rss", up: true })
}

pub fn app_with(config: Config) -> Router {
    let state = AppState::new(config, DataSource::Memory(MemoryDataSource::new()))
        .with_health(healthy_checks());
    create_router(state)
}

pub fn app() -> Router {
    app_with(test_config())
}

pub fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-request-id", "test-request")
        .header("x-channel-id", "tests");

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
