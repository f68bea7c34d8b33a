//! Generic repository over a document store

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

use super::{merge, Entity};
use crate::error::{CrudError, CrudResult};
use crate::store::{field_filter, get_path, Document, DocumentStore, StoreError};

/// Outcome of [`CrudRepository::create_many`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub inserted_count: usize,
    pub inserted_ids: Vec<Value>,
    /// Identifiers dropped because they already existed
    pub skipped_ids: Vec<Value>,
}

/// Persistence for one entity type
pub struct CrudRepository<T: Entity> {
    store: Arc<dyn DocumentStore>,
    component: String,
    _entity: PhantomData<fn() -> T>,
}

fn to_document<T: Entity>(entity: &T, request_id: &str) -> CrudResult<Document> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(CrudError::bad_request(
            "Entity must serialize to a JSON object",
            request_id,
        )),
        Err(e) => Err(CrudError::internal(
            format!("Failed to serialize entity: {e}"),
            request_id,
        )),
    }
}

fn from_document<T: Entity>(document: Document, request_id: &str) -> CrudResult<T> {
    serde_json::from_value(Value::Object(document)).map_err(|e| {
        CrudError::store(
            StoreError::InvalidDocument(format!("stored document does not match entity: {e}")),
            request_id,
        )
    })
}

/// Key used to compare identifier values regardless of their JSON type
fn identity_key(value: &Value) -> String {
    value.to_string()
}

impl<T: Entity> CrudRepository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, component: impl Into<String>) -> Self {
        Self {
            store,
            component: component.into(),
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    /// Every stored entity
    pub async fn find_all(&self, request_id: &str) -> CrudResult<Vec<T>> {
        info!(component = %self.component, request_id, "Fetching all entities");
        self.find_many(Document::new(), request_id).await
    }

    /// Entities matching `filter`; the filter reaches the store unchanged.
    pub async fn find_many(&self, filter: Document, request_id: &str) -> CrudResult<Vec<T>> {
        info!(component = %self.component, request_id, ?filter, "Fetching entities by filter");

        let documents = self
            .store
            .find(&filter)
            .await
            .map_err(|e| CrudError::store(e, request_id))?;

        documents
            .into_iter()
            .map(|document| from_document(document, request_id))
            .collect()
    }

    /// Single entity by an arbitrary field
    pub async fn find_one(
        &self,
        value: Value,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<Option<T>> {
        info!(
            component = %self.component,
            request_id,
            field = field_identifier,
            %value,
            "Fetching entity"
        );

        self.find_document(value, request_id, field_identifier)
            .await?
            .map(|document| from_document(document, request_id))
            .transpose()
    }

    async fn find_document(
        &self,
        value: Value,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<Option<Document>> {
        self.store
            .find_one(&field_filter(field_identifier, value))
            .await
            .map_err(|e| CrudError::store(e, request_id))
    }

    /// Inserts `data` unless an entity with the same identifier exists.
    pub async fn create(&self, data: T, request_id: &str, field_identifier: &str) -> CrudResult<T> {
        info!(component = %self.component, request_id, "Creating entity");

        let document = to_document(&data, request_id)?;
        let identifier = get_path(&document, field_identifier)
            .filter(|v| !v.is_null())
            .cloned();

        if let Some(identifier) = identifier {
            if self
                .find_document(identifier.clone(), request_id, field_identifier)
                .await?
                .is_some()
            {
                warn!(component = %self.component, request_id, %identifier, "Entity already exists");
                return Err(CrudError::conflict("Data already exists", request_id));
            }
        }

        let stored = self
            .store
            .insert_one(document)
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent create.
                StoreError::DuplicateKey(_) => CrudError::conflict("Data already exists", request_id),
                other => CrudError::store(other, request_id),
            })?;

        from_document(stored, request_id)
    }

    /// Bulk insert that skips entities whose identifier already exists.
    pub async fn create_many(
        &self,
        data: Vec<T>,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<BulkResult> {
        info!(component = %self.component, request_id, count = data.len(), "Creating entities in bulk");

        let existing = self
            .store
            .find(&Document::new())
            .await
            .map_err(|e| CrudError::store(e, request_id))?;

        let mut seen: HashSet<String> = existing
            .iter()
            .filter_map(|document| get_path(document, field_identifier))
            .map(identity_key)
            .collect();

        let mut batch = Vec::with_capacity(data.len());
        let mut skipped_ids = Vec::new();
        for entity in &data {
            let document = to_document(entity, request_id)?;
            match get_path(&document, field_identifier).filter(|v| !v.is_null()) {
                Some(identifier) if !seen.insert(identity_key(identifier)) => {
                    skipped_ids.push(identifier.clone());
                },
                _ => batch.push(document),
            }
        }

        if !skipped_ids.is_empty() {
            warn!(
                component = %self.component,
                request_id,
                skipped = skipped_ids.len(),
                "Skipping entities that already exist"
            );
        }

        let summary = self
            .store
            .insert_many(batch)
            .await
            .map_err(|e| CrudError::store(e, request_id))?
            .filter(|summary| summary.inserted_count > 0)
            .ok_or_else(|| CrudError::conflict("Bulk data not created", request_id))?;

        if !summary.rejected_ids.is_empty() {
            // Created concurrently after the existing-id scan.
            warn!(
                component = %self.component,
                request_id,
                rejected = summary.rejected_ids.len(),
                "Store rejected entities that already exist"
            );
            skipped_ids.extend(summary.rejected_ids);
        }

        Ok(BulkResult {
            inserted_count: summary.inserted_count,
            inserted_ids: summary.inserted_ids,
            skipped_ids,
        })
    }

    /// Deep-merges `partial` into the stored entity and writes the result back.
    pub async fn update(
        &self,
        field_value: Value,
        partial: Document,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<T> {
        info!(
            component = %self.component,
            request_id,
            field = field_identifier,
            value = %field_value,
            "Updating entity"
        );

        let existing = self
            .find_document(field_value.clone(), request_id, field_identifier)
            .await?
            .ok_or_else(|| CrudError::bad_request("Entity not found to update", request_id))?;

        let merged = merge::deep_merge(&existing, &partial);

        // Decoding drops undeclared fields and rejects type mismatches.
        let entity: T = serde_json::from_value(Value::Object(merged)).map_err(|e| {
            CrudError::bad_request(format!("Invalid update payload: {e}"), request_id)
        })?;
        let replacement = to_document(&entity, request_id)?;

        let updated = self
            .store
            .replace_upsert(&field_filter(field_identifier, field_value), replacement)
            .await
            .map_err(|e| CrudError::store(e, request_id))?
            .ok_or_else(|| CrudError::internal("Entity was not updated", request_id))?;

        from_document(updated, request_id)
    }

    /// Deletes by identifier
    pub async fn remove(
        &self,
        field_value: Value,
        request_id: &str,
        field_identifier: &str,
    ) -> CrudResult<String> {
        info!(
            component = %self.component,
            request_id,
            field = field_identifier,
            value = %field_value,
            "Removing entity"
        );

        self.store
            .delete_one(&field_filter(field_identifier, field_value))
            .await
            .map_err(|e| CrudError::store(e, request_id))?
            .ok_or_else(|| CrudError::internal("No record found to delete", request_id))?;

        Ok("Deleted record successfully!".to_string())
    }
}
