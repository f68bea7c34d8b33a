//! CRUD Server Library
//!
//! Skeleton for REST CRUD microservices over a document database.
//!
//! # Overview
//!
//! - **Generic CRUD**: controller, service and repository generic over one
//!   [`crud::Entity`] type, with create, read, search, update, delete and
//!   bulk create
//! - **Document store**: MongoDB in production, an in-memory store elsewhere
//! - **Auth**: service API keys checked on the versioned API routes
//! - **Health**: disk, memory and optional HTTP ping checks at `/health`
//! - **Configuration**: environment variables with typed defaults
//!
//! # Request flow
//!
//! ```text
//! HTTP -> CrudController<T> -> CrudService<T> -> CrudRepository<T> -> DocumentStore
//! ```
//!
//! Every layer receives the request id from the `x-request-id` header and
//! logs with it, so one request can be followed across the log.
//!
//! # Example
//!
//! ```no_run
//! use crud_server::{app, config::Config, store::DataSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let data_source = DataSource::from_config(&config).await?;
//!     let router = app::create_router(app::AppState::new(config, data_source));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod crud;
pub mod crypto;
pub mod error;
pub mod health;
pub mod middleware;
pub mod store;
pub mod template;

pub use error::{ApiResult, AppError, CrudError, CrudResult};
