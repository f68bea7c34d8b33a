//! Service key authentication on the versioned API routes

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use crud_common::constants::INVALID_SERVICE_KEY_MESSAGE;
use crud_server::config::parse_api_keys;

use common::{app_with, body_json, json_request, send, test_config, TEMPLATE_PATH};

fn secured_app() -> axum::Router {
    let mut config = test_config();
    config.auth.api_keys = parse_api_keys(r#"["svc-key-1", "svc-key-2"]"#).unwrap();
    app_with(config)
}

fn with_key(key: &str) -> Request<Body> {
    let mut request = json_request(Method::GET, TEMPLATE_PATH, None);
    request
        .headers_mut()
        .insert("x-service-key", key.parse().unwrap());
    request
}

#[tokio::test]
async fn test_valid_key_passes() {
    let app = secured_app();

    let response = send(&app, with_key("svc-key-1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, with_key("svc-key-2")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_key_is_unauthorized() {
    let app = secured_app();

    let response = send(&app, with_key("svc-key-3")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["message"], INVALID_SERVICE_KEY_MESSAGE);
}

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let app = secured_app();
    let response = send(&app, json_request(Method::GET, TEMPLATE_PATH, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_root_are_open() {
    let app = secured_app();

    let response = send(&app, json_request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, json_request(Method::GET, "/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_no_keys_configured_leaves_routes_open() {
    let app = app_with(test_config());
    let response = send(&app, json_request(Method::GET, TEMPLATE_PATH, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
