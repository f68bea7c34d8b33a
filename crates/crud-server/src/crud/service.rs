//! Generic service layer

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{BulkResult, CrudRepository, Entity};
use crate::error::CrudResult;
use crate::store::Document;

/// Thin layer over [`CrudRepository`] that logs each operation.
///
/// Entity-specific business rules belong in a wrapper around this type.
pub struct CrudService<T: Entity> {
    repository: Arc<CrudRepository<T>>,
    component: String,
}

impl<T: Entity> CrudService<T> {
    pub fn new(repository: CrudRepository<T>, component: impl Into<String>) -> Self {
        Self {
            repository: Arc::new(repository),
            component: component.into(),
        }
    }

    pub fn repository(&self) -> &CrudRepository<T> {
        &self.repository
    }

    pub async fn find_all(&self, request_id: &str) -> CrudResult<Vec<T>> {
        info!(component = %self.component, operation = "find_all", request_id);
        self.repository.find_all(request_id).await
    }

    pub async fn find_many(&self, filter: Document, request_id: &str) -> CrudResult<Vec<T>> {
        info!(component = %self.component, operation = "find_many", request_id);
        self.repository.find_many(filter, request_id).await
    }

    pub async fn find_one(
        &self,
        value: Value,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<Option<T>> {
        info!(component = %self.component, operation = "find_one", request_id);
        self.repository.find_one(value, request_id, field_identifier).await
    }

    pub async fn create(&self, data: T, request_id: &str, field_identifier: &str) -> CrudResult<T> {
        info!(component = %self.component, operation = "create", request_id);
        self.repository.create(data, request_id, field_identifier).await
    }

    pub async fn create_many(
        &self,
        data: Vec<T>,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<BulkResult> {
        info!(component = %self.component, operation = "create_many", request_id);
        self.repository.create_many(data, request_id, field_identifier).await
    }

    pub async fn update(
        &self,
        field_value: Value,
        partial: Document,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<T> {
        info!(component = %self.component, operation = "update", request_id);
        self.repository
            .update(field_value, partial, request_id, field_identifier)
            .await
    }

    pub async fn remove(
        &self,
        field_value: Value,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<String> {
        info!(component = %self.component, operation = "remove", request_id);
        self.repository.remove(field_value, request_id, field_identifier).await
    }
}
