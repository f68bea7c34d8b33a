//! Sample entity wired through the generic CRUD layer
//!
//! Copy this module to add a new resource: define the record, implement
//! [`Entity`], and mount [`routes`] under its versioned path.

use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crud::{CrudController, CrudRepository, CrudService, Entity, DEFAULT_FIELD_IDENTIFIER};
use crate::store::DataSource;

/// Controller segment of the mount path (`/api/v1/crud-template`)
pub const CONTROLLER_PATH: &str = "crud-template";

/// API version the template is served under
pub const API_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Entity for TemplateRecord {
    const COLLECTION: &'static str = "crud-template";

    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("_id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Builds the template router on top of `source`
pub fn routes(source: &DataSource, expose_error_source: bool) -> Router {
    let repository = CrudRepository::<TemplateRecord>::new(
        source.store(TemplateRecord::COLLECTION),
        "TemplateRepository",
    );
    let service = CrudService::new(repository, "TemplateService");

    CrudController::new(service, DEFAULT_FIELD_IDENTIFIER, "TemplateController")
        .with_error_source(expose_error_source)
        .router()
}
