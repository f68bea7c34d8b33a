//! Server-specific error types
//!
//! [`CrudError`] is what the repository raises: every store failure is
//! translated into exactly one of three kinds. [`AppError`] is what handlers
//! return and owns the mapping onto HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use std::error::Error as _;
use thiserror::Error;

use crate::api::ErrorResponse;
use crate::store::StoreError;

/// Result type alias for CRUD operations
pub type CrudResult<T> = std::result::Result<T, CrudError>;

/// Alias for handler results
pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Repository-level failures
#[derive(Error, Debug)]
pub enum CrudError {
    #[error("Conflict: {description}")]
    Conflict {
        description: String,
        request_id: String,
    },

    #[error("Bad request: {description}")]
    BadRequest {
        description: String,
        request_id: String,
    },

    #[error("Internal error: {description}")]
    Internal {
        description: String,
        request_id: String,
        #[source]
        source: Option<StoreError>,
    },
}

impl CrudError {
    pub fn conflict(description: impl Into<String>, request_id: &str) -> Self {
        CrudError::Conflict {
            description: description.into(),
            request_id: request_id.to_string(),
        }
    }

    pub fn bad_request(description: impl Into<String>, request_id: &str) -> Self {
        CrudError::BadRequest {
            description: description.into(),
            request_id: request_id.to_string(),
        }
    }

    pub fn internal(description: impl Into<String>, request_id: &str) -> Self {
        CrudError::Internal {
            description: description.into(),
            request_id: request_id.to_string(),
            source: None,
        }
    }

    /// Wraps a store failure, keeping it as the error source
    pub fn store(source: StoreError, request_id: &str) -> Self {
        CrudError::Internal {
            description: source.to_string(),
            request_id: request_id.to_string(),
            source: Some(source),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            CrudError::Conflict { description, .. }
            | CrudError::BadRequest { description, .. }
            | CrudError::Internal { description, .. } => description,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            CrudError::Conflict { request_id, .. }
            | CrudError::BadRequest { request_id, .. }
            | CrudError::Internal { request_id, .. } => request_id,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CrudError::Conflict { .. } => StatusCode::CONFLICT,
            CrudError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            CrudError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            CrudError::Conflict { .. } => "CONFLICT",
            CrudError::BadRequest { .. } => "BAD_REQUEST",
            CrudError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// A repository failure. `expose_source` adds the error chain to the body.
    #[error("{error}")]
    Crud {
        #[source]
        error: CrudError,
        expose_source: bool,
    },

    #[error("Validation error: {message}")]
    Validation { message: String, request_id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn crud(error: CrudError, expose_source: bool) -> Self {
        AppError::Crud {
            error,
            expose_source,
        }
    }

    pub fn validation(message: impl Into<String>, request_id: &str) -> Self {
        AppError::Validation {
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }
}

impl From<CrudError> for AppError {
    fn from(error: CrudError) -> Self {
        AppError::crud(error, false)
    }
}

fn source_chain(error: &CrudError) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Crud {
                error,
                expose_source,
            } => {
                let status = error.status();
                if status.is_server_error() {
                    tracing::error!(
                        request_id = %error.request_id(),
                        error = ?error,
                        "Request failed"
                    );
                } else {
                    tracing::warn!(
                        request_id = %error.request_id(),
                        error = %error,
                        "Request rejected"
                    );
                }

                let mut details = Map::new();
                details.insert("requestId".to_string(), json!(error.request_id()));
                if expose_source {
                    details.insert("stack".to_string(), json!(source_chain(&error)));
                }

                ErrorResponse::with_details(
                    error.code(),
                    error.description(),
                    Value::Object(details),
                )
                .into_response_with(status)
            },
            AppError::Validation {
                message,
                request_id,
            } => ErrorResponse::with_details(
                "VALIDATION_ERROR",
                message,
                json!({ "requestId": request_id }),
            )
            .into_response_with(StatusCode::BAD_REQUEST),
            AppError::Unauthorized(message) => ErrorResponse::new("UNAUTHORIZED", message)
                .into_response_with(StatusCode::UNAUTHORIZED),
        }
    }
}
