//! Generic CRUD layer
//!
//! Three layers, each generic over one [`Entity`] type:
//!
//! - [`CrudController`] maps REST verbs to service calls and validates bodies
//! - [`CrudService`] logs and delegates
//! - [`CrudRepository`] talks to the [`DocumentStore`](crate::store::DocumentStore)
//!   and translates failures into [`CrudError`](crate::error::CrudError)
//!
//! Wiring a new entity takes a type and one router call:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Customer {
//!     #[serde(rename = "_id")]
//!     id: String,
//!     name: String,
//! }
//!
//! impl Entity for Customer {
//!     const COLLECTION: &'static str = "customers";
//! }
//!
//! let repository = CrudRepository::<Customer>::new(source.store(Customer::COLLECTION), "CustomerRepository");
//! let service = CrudService::new(repository, "CustomerService");
//! let routes = CrudController::new(service, DEFAULT_FIELD_IDENTIFIER, "CustomerController").router();
//! ```

pub mod context;
pub mod controller;
pub mod merge;
pub mod repository;
pub mod service;

use serde::{de::DeserializeOwned, Serialize};

pub use context::RequestContext;
pub use controller::CrudController;
pub use repository::{BulkResult, CrudRepository};
pub use service::CrudService;

/// Identifier field used when a deployment does not override it
pub const DEFAULT_FIELD_IDENTIFIER: &str = "_id";

/// A record type the CRUD layer can store
///
/// Fields the type does not declare are dropped when a payload is decoded
/// into it, so the type doubles as the accepted shape of request bodies.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (table) the entity lives in
    const COLLECTION: &'static str;

    /// Boundary checks beyond the shape serde already enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
