//! Router-level tests for the template CRUD endpoints
//!
//! Each test builds a fresh router over an empty in-memory store.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{app, body_json, json_request, send, TEMPLATE_PATH};

fn item_path(id: &str) -> String {
    format!("{TEMPLATE_PATH}/{id}")
}

#[tokio::test]
async fn test_create_and_fetch() {
    let app = app();

    let response = send(
        &app,
        json_request(
            Method::POST,
            TEMPLATE_PATH,
            Some(json!({ "_id": "t-1", "name": "First", "tags": ["a"] })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["_id"], "t-1");

    let response = send(&app, json_request(Method::GET, &item_path("t-1"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["data"],
        json!({ "_id": "t-1", "name": "First", "tags": ["a"] })
    );

    let response = send(&app, json_request(Method::GET, TEMPLATE_PATH, None)).await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_missing_entity_returns_null() {
    let app = app();
    let response = send(&app, json_request(Method::GET, &item_path("nope"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!(null));
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let app = app();
    let record = json!({ "_id": "t-1", "name": "First" });

    send(&app, json_request(Method::POST, TEMPLATE_PATH, Some(record.clone()))).await;
    let response = send(&app, json_request(Method::POST, TEMPLATE_PATH, Some(record))).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(body["error"]["message"], "Data already exists");
    assert_eq!(body["error"]["details"]["requestId"], "test-request");
}

#[tokio::test]
async fn test_invalid_bodies_are_rejected() {
    let app = app();

    let missing_name = send(
        &app,
        json_request(Method::POST, TEMPLATE_PATH, Some(json!({ "_id": "t-1" }))),
    )
    .await;
    assert_eq!(missing_name.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing_name).await["error"]["code"], "VALIDATION_ERROR");

    let blank_name = send(
        &app,
        json_request(
            Method::POST,
            TEMPLATE_PATH,
            Some(json!({ "_id": "t-1", "name": " " })),
        ),
    )
    .await;
    assert_eq!(blank_name.status(), StatusCode::BAD_REQUEST);

    let not_an_object = send(
        &app,
        json_request(Method::PUT, &item_path("t-1"), Some(json!(["x"]))),
    )
    .await;
    assert_eq!(not_an_object.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_fields_are_not_stored() {
    let app = app();
    send(
        &app,
        json_request(
            Method::POST,
            TEMPLATE_PATH,
            Some(json!({ "_id": "t-1", "name": "First", "role": "admin" })),
        ),
    )
    .await;

    let body = body_json(send(&app, json_request(Method::GET, &item_path("t-1"), None)).await).await;
    assert!(body["data"].get("role").is_none());
}

#[tokio::test]
async fn test_search_by_query_string() {
    let app = app();
    let batch = json!([
        { "_id": "t-1", "name": "alpha", "tags": ["red"] },
        { "_id": "t-2", "name": "beta", "tags": ["blue"] },
        { "_id": "t-3", "name": "alpha", "tags": ["blue"] }
    ]);
    send(
        &app,
        json_request(Method::POST, &format!("{TEMPLATE_PATH}/batch"), Some(batch)),
    )
    .await;

    let response = send(
        &app,
        json_request(Method::GET, &format!("{TEMPLATE_PATH}/search?name=alpha"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let mut ids: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["t-1", "t-3"]);

    let body = body_json(
        send(
            &app,
            json_request(Method::GET, &format!("{TEMPLATE_PATH}/search?tags=blue&name=beta"), None),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_batch_create_skips_existing() {
    let app = app();
    send(
        &app,
        json_request(
            Method::POST,
            TEMPLATE_PATH,
            Some(json!({ "_id": "t-1", "name": "First" })),
        ),
    )
    .await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("{TEMPLATE_PATH}/batch"),
            Some(json!([
                { "_id": "t-1", "name": "First again" },
                { "_id": "t-2", "name": "Second" }
            ])),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["insertedCount"], 1);
    assert_eq!(body["data"]["insertedIds"], json!(["t-2"]));
    assert_eq!(body["data"]["skippedIds"], json!(["t-1"]));

    let first = body_json(send(&app, json_request(Method::GET, &item_path("t-1"), None)).await).await;
    assert_eq!(first["data"]["name"], "First");

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("{TEMPLATE_PATH}/batch"),
            Some(json!([{ "_id": "t-2", "name": "Second" }])),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Bulk data not created"
    );
}

#[tokio::test]
async fn test_partial_update_merges() {
    let app = app();
    send(
        &app,
        json_request(
            Method::POST,
            TEMPLATE_PATH,
            Some(json!({
                "_id": "t-1",
                "name": "First",
                "description": "original",
                "metadata": { "owner": "ops", "tier": 1 }
            })),
        ),
    )
    .await;

    let response = send(
        &app,
        json_request(
            Method::PUT,
            &item_path("t-1"),
            Some(json!({ "name": "Renamed", "metadata": { "tier": 2 } })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["data"],
        json!({
            "_id": "t-1",
            "name": "Renamed",
            "description": "original",
            "tags": [],
            "metadata": { "owner": "ops", "tier": 2 }
        })
    );
}

#[tokio::test]
async fn test_update_missing_is_bad_request() {
    let app = app();
    let response = send(
        &app,
        json_request(Method::PUT, &item_path("ghost"), Some(json!({ "name": "x" }))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Entity not found to update"
    );

    let after = body_json(send(&app, json_request(Method::GET, TEMPLATE_PATH, None)).await).await;
    assert_eq!(after["data"], json!([]));
}

#[tokio::test]
async fn test_delete() {
    let app = app();
    send(
        &app,
        json_request(
            Method::POST,
            TEMPLATE_PATH,
            Some(json!({ "_id": "t-1", "name": "First" })),
        ),
    )
    .await;

    let response = send(&app, json_request(Method::DELETE, &item_path("t-1"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], "Deleted record successfully!");

    let response = send(&app, json_request(Method::DELETE, &item_path("t-1"), None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "No record found to delete");
    assert!(body["error"]["details"].get("stack").is_none());
}

#[tokio::test]
async fn test_error_stack_when_enabled() {
    let mut config = common::test_config();
    config.app.enable_error_stack = true;
    let app = common::app_with(config);

    let response = send(&app, json_request(Method::DELETE, &item_path("ghost"), None)).await;
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"]["stack"], json!([]));
}

#[tokio::test]
async fn test_search_matches_numbers_and_strings() {
    let app = app();
    let batch = json!([
        { "_id": "t-1", "name": "alpha", "metadata": { "tier": 2, "active": true } },
        { "_id": "t-2", "name": "beta", "metadata": { "tier": "2" } },
        { "_id": "t-3", "name": "gamma", "metadata": { "tier": 3 } }
    ]);
    send(
        &app,
        json_request(Method::POST, &format!("{TEMPLATE_PATH}/batch"), Some(batch)),
    )
    .await;

    let search = |query: &str| json_request(Method::GET, &format!("{TEMPLATE_PATH}/search?{query}"), None);

    let body = body_json(send(&app, search("metadata.tier=2")).await).await;
    let mut ids: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["t-1", "t-2"]);

    let body = body_json(send(&app, search("metadata.active=true")).await).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["_id"], "t-1");
}
