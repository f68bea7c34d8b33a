//! Generic REST controller
//!
//! # Route Structure
//!
//! Relative to wherever the router is nested (for example
//! `/api/v1/crud-template`):
//!
//! - `GET /` - every entity
//! - `GET /search?field=value` - entities matching the query-string filter
//! - `GET /:id` - one entity by the configured identifier field
//! - `POST /` - create one entity
//! - `POST /batch` - create many, skipping identifiers that already exist
//! - `PUT /:id` - partial update (deep merge)
//! - `DELETE /:id` - delete one entity

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{BulkResult, CrudService, Entity, RequestContext};
use crate::api::ApiResponse;
use crate::error::{ApiResult, AppError, CrudError};
use crate::store::{any_of, Document};

/// Router state for one entity type
pub struct CrudController<T: Entity> {
    service: Arc<CrudService<T>>,
    field_identifier: Arc<str>,
    component: Arc<str>,
    expose_error_source: bool,
}

// Derive would require `T: Clone`.
impl<T: Entity> Clone for CrudController<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            field_identifier: self.field_identifier.clone(),
            component: self.component.clone(),
            expose_error_source: self.expose_error_source,
        }
    }
}

impl<T: Entity> CrudController<T> {
    pub fn new(
        service: CrudService<T>,
        field_identifier: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            service: Arc::new(service),
            field_identifier: Arc::from(field_identifier.into()),
            component: Arc::from(component.into()),
            expose_error_source: false,
        }
    }

    /// Include the error source chain in 500 bodies
    pub fn with_error_source(mut self, expose: bool) -> Self {
        self.expose_error_source = expose;
        self
    }

    pub fn field_identifier(&self) -> &str {
        &self.field_identifier
    }

    /// Builds the router with this controller as its state
    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(find_all::<T>).post(create::<T>))
            .route("/search", get(find_many::<T>))
            .route("/batch", post(create_many::<T>))
            .route(
                "/:id",
                get(find_one::<T>).put(update::<T>).delete(remove::<T>),
            )
            .with_state(self)
    }

    fn fail(&self, error: CrudError) -> AppError {
        AppError::crud(error, self.expose_error_source)
    }
}

/// Decodes a JSON body, turning any rejection into a 400
fn body<B>(payload: Result<Json<B>, JsonRejection>, ctx: &RequestContext) -> ApiResult<B> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text(), &ctx.request_id))
}

fn validate<T: Entity>(entity: &T, ctx: &RequestContext) -> ApiResult<()> {
    entity
        .validate()
        .map_err(|message| AppError::validation(message, &ctx.request_id))
}

/// List every entity
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
async fn find_all<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
) -> ApiResult<ApiResponse<Vec<T>>> {
    tracing::info!(component = %controller.component, channel_id = ?ctx.channel_id, "GET all");

    let entities = controller
        .service
        .find_all(&ctx.request_id)
        .await
        .map_err(|e| controller.fail(e))?;

    Ok(ApiResponse::success(entities))
}

/// Filter by query-string fields. A value that reads as a number or boolean
/// matches either that scalar or the literal string.
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
async fn find_many<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<ApiResponse<Vec<T>>> {
    tracing::info!(component = %controller.component, ?params, "GET search");

    let filter: Document = params
        .into_iter()
        .map(|(key, value)| (key, query_value(value)))
        .collect();

    let entities = controller
        .service
        .find_many(filter, &ctx.request_id)
        .await
        .map_err(|e| controller.fail(e))?;

    Ok(ApiResponse::success(entities))
}

fn query_value(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        Ok(scalar @ (Value::Number(_) | Value::Bool(_))) => any_of(vec![Value::String(raw), scalar]),
        _ => Value::String(raw),
    }
}

/// Fetch one entity. Absent entities yield `data: null`.
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, id = %id))]
async fn find_one<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Option<T>>> {
    tracing::info!(component = %controller.component, "GET one");

    let entity = controller
        .service
        .find_one(Value::String(id), &ctx.request_id, &controller.field_identifier)
        .await
        .map_err(|e| controller.fail(e))?;

    Ok(ApiResponse::success(entity))
}

/// Create one entity
///
/// - `201 Created` - stored entity
/// - `400 Bad Request` - malformed body
/// - `409 Conflict` - identifier already exists
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
async fn create<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
    payload: Result<Json<T>, JsonRejection>,
) -> ApiResult<Response> {
    let data = body(payload, &ctx)?;
    validate(&data, &ctx)?;
    tracing::info!(component = %controller.component, "POST create");

    let created = controller
        .service
        .create(data, &ctx.request_id, &controller.field_identifier)
        .await
        .map_err(|e| controller.fail(e))?;

    Ok((StatusCode::CREATED, ApiResponse::success(created)).into_response())
}

/// Create a batch
///
/// - `201 Created` - [`BulkResult`] with inserted and skipped identifiers
/// - `409 Conflict` - nothing left to insert
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
async fn create_many<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
    payload: Result<Json<Vec<T>>, JsonRejection>,
) -> ApiResult<Response> {
    let data = body(payload, &ctx)?;
    for entity in &data {
        validate(entity, &ctx)?;
    }
    tracing::info!(component = %controller.component, count = data.len(), "POST batch");

    let result: BulkResult = controller
        .service
        .create_many(data, &ctx.request_id, &controller.field_identifier)
        .await
        .map_err(|e| controller.fail(e))?;

    Ok((StatusCode::CREATED, ApiResponse::success(result)).into_response())
}

/// Partially update one entity
///
/// - `200 OK` - entity after the merge
/// - `400 Bad Request` - unknown identifier or a body that does not fit the entity
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, id = %id))]
async fn update<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<ApiResponse<T>> {
    let partial = body(payload, &ctx)?;
    tracing::info!(component = %controller.component, "PUT update");

    let updated = controller
        .service
        .update(
            Value::String(id),
            partial,
            &ctx.request_id,
            &controller.field_identifier,
        )
        .await
        .map_err(|e| controller.fail(e))?;

    Ok(ApiResponse::success(updated))
}

/// Delete one entity
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, id = %id))]
async fn remove<T: Entity>(
    State(controller): State<CrudController<T>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<String>> {
    tracing::info!(component = %controller.component, "DELETE");

    let message = controller
        .service
        .remove(Value::String(id), &ctx.request_id, &controller.field_identifier)
        .await
        .map_err(|e| controller.fail(e))?;

    Ok(ApiResponse::success(message))
}
