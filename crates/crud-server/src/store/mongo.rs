//! MongoDB adapter

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, ReturnDocument},
    Client, Collection, Database,
};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use super::{BulkWriteSummary, Document, DocumentStore, StoreError, StoreResult};
use crate::config::{DatabaseConfig, DEFAULT_MONGO_DATABASE};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Connected MongoDB database
#[derive(Clone)]
pub struct MongoDataSource {
    database: Database,
}

impl MongoDataSource {
    /// Connects with the configured timeouts and verifies the server answers.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.server_selection_timeout =
            Some(Duration::from_millis(config.server_selection_timeout_ms));
        options.connect_timeout = Some(Duration::from_millis(config.connect_timeout_ms));

        let name = database_name(config.database.as_deref(), options.default_database.as_deref());

        let client = Client::with_options(options)?;
        let source = Self {
            database: client.database(&name),
        };

        source.ping().await?;
        tracing::info!(database = %name, "Connected to MongoDB");

        Ok(source)
    }

    pub fn store(&self, collection: &str) -> MongoStore {
        MongoStore {
            collection: self.database.collection(collection),
        }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// One MongoDB collection
pub struct MongoStore {
    collection: Collection<bson::Document>,
}

/// `MONGO_DATABASE` wins, then the database named in the URI.
fn database_name(configured: Option<&str>, from_uri: Option<&str>) -> String {
    configured
        .or(from_uri)
        .unwrap_or(DEFAULT_MONGO_DATABASE)
        .to_string()
}

fn to_bson(document: &Document) -> StoreResult<bson::Document> {
    Ok(bson::to_document(document)?)
}

/// Builds a BSON filter. A string `_id` that parses as an ObjectId matches
/// either representation.
fn to_filter(filter: &Document) -> StoreResult<bson::Document> {
    let mut converted = to_bson(filter)?;
    if let Some(Value::String(id)) = filter.get("_id") {
        if let Ok(oid) = ObjectId::parse_str(id) {
            converted.insert("_id", doc! { "$in": [id.as_str(), oid] });
        }
    }
    Ok(converted)
}

fn id_to_json(id: Bson) -> Value {
    match id {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        other => other.into_relaxed_extjson(),
    }
}

fn from_bson(mut document: bson::Document) -> StoreResult<Document> {
    let id = document.remove("_id");
    let mut converted = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::InvalidDocument(format!(
                "expected an object, got {other}"
            )))
        },
    };
    if let Some(id) = id {
        converted.insert("_id".to_string(), id_to_json(id));
    }
    Ok(converted)
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|w| w.code == DUPLICATE_KEY_CODE)),
        _ => false,
    }
}

/// Batch positions refused for a duplicate key, when that is the only
/// reason an unordered bulk insert failed.
fn duplicate_key_indexes(error: &mongodb::error::Error) -> Option<HashSet<usize>> {
    match error.kind.as_ref() {
        ErrorKind::InsertMany(e) if e.write_concern_error.is_none() => {
            let errors = e.write_errors.as_ref()?;
            errors
                .iter()
                .all(|w| w.code == DUPLICATE_KEY_CODE)
                .then(|| errors.iter().map(|w| w.index).collect())
        },
        _ => None,
    }
}

fn summarize_bulk_insert(ids: Vec<Bson>, rejected: &HashSet<usize>) -> BulkWriteSummary {
    let (rejected_ids, inserted_ids): (Vec<_>, Vec<_>) = ids
        .into_iter()
        .enumerate()
        .partition(|(index, _)| rejected.contains(index));

    let inserted_ids: Vec<Value> = inserted_ids.into_iter().map(|(_, id)| id_to_json(id)).collect();
    BulkWriteSummary {
        inserted_count: inserted_ids.len(),
        inserted_ids,
        rejected_ids: rejected_ids.into_iter().map(|(_, id)| id_to_json(id)).collect(),
    }
}

fn map_write_error(collection: &str, error: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&error) {
        StoreError::DuplicateKey(format!("{collection}: {error}"))
    } else {
        StoreError::Mongo(error)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection(&self) -> &str {
        self.collection.name()
    }

    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        let cursor = self.collection.find(to_filter(filter)?).await?;
        let documents: Vec<bson::Document> = cursor.try_collect().await?;
        documents.into_iter().map(from_bson).collect()
    }

    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>> {
        self.collection
            .find_one(to_filter(filter)?)
            .await?
            .map(from_bson)
            .transpose()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        let mut stored = to_bson(&document)?;
        let result = self
            .collection
            .insert_one(&stored)
            .await
            .map_err(|e| map_write_error(self.collection(), e))?;
        stored.insert("_id", result.inserted_id);
        from_bson(stored)
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
    ) -> StoreResult<Option<BulkWriteSummary>> {
        if documents.is_empty() {
            return Ok(None);
        }

        let mut batch = documents.iter().map(to_bson).collect::<StoreResult<Vec<_>>>()?;
        // Ids are assigned up front so a partially applied batch can be reported.
        let ids: Vec<Bson> = batch
            .iter_mut()
            .map(|document| {
                document
                    .entry("_id".to_string())
                    .or_insert(Bson::ObjectId(ObjectId::new()))
                    .clone()
            })
            .collect();

        let rejected = match self.collection.insert_many(&batch).ordered(false).await {
            Ok(_) => HashSet::new(),
            Err(e) => match duplicate_key_indexes(&e) {
                Some(indexes) => indexes,
                None => return Err(map_write_error(self.collection(), e)),
            },
        };

        Ok(Some(summarize_bulk_insert(ids, &rejected)))
    }

    async fn replace_upsert(
        &self,
        filter: &Document,
        replacement: Document,
    ) -> StoreResult<Option<Document>> {
        let mut replacement = to_bson(&replacement)?;
        // `_id` cannot be changed by a replace; the server keeps the original.
        replacement.remove("_id");

        self.collection
            .find_one_and_replace(to_filter(filter)?, replacement)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_write_error(self.collection(), e))?
            .map(from_bson)
            .transpose()
    }

    async fn delete_one(&self, filter: &Document) -> StoreResult<Option<Document>> {
        self.collection
            .find_one_and_delete(to_filter(filter)?)
            .await?
            .map(from_bson)
            .transpose()
    }
}
