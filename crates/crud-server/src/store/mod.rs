//! Document store port
//!
//! The CRUD layer talks to persistence through [`DocumentStore`], one handle
//! per collection. Documents are schema-flexible JSON objects; the adapters
//! translate them to and from the backend's native representation.
//!
//! Two adapters ship with the skeleton:
//!
//! - [`mongo::MongoDataSource`] - MongoDB, used in production
//! - [`memory::MemoryDataSource`] - in-process collections for development and tests
//!
//! Filters are equality maps. Dotted keys (`address.city`) address nested
//! fields; anything richer is up to the backend.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, Environment};

/// A stored document
pub type Document = Map<String, Value>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a document store adapter
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON conversion error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Outcome of a bulk insert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWriteSummary {
    pub inserted_count: usize,
    pub inserted_ids: Vec<Value>,
    /// Ids refused by the store's unique index, e.g. after a concurrent create
    pub rejected_ids: Vec<Value>,
}

/// Operations the CRUD layer needs from a single collection
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the backing collection
    fn collection(&self) -> &str;

    /// All documents matching `filter` (an empty filter matches everything)
    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>>;

    /// First document matching `filter`
    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>>;

    /// Inserts one document and returns it as stored (with its `_id`)
    async fn insert_one(&self, document: Document) -> StoreResult<Document>;

    /// Inserts a batch in one round trip.
    ///
    /// Documents whose `_id` is already taken are reported in
    /// `rejected_ids`; the rest of the batch is still written. Returns `None`
    /// for an empty batch.
    async fn insert_many(&self, documents: Vec<Document>)
        -> StoreResult<Option<BulkWriteSummary>>;

    /// Replaces the first match wholesale, inserting when nothing matches,
    /// and returns the document after the write.
    async fn replace_upsert(
        &self,
        filter: &Document,
        replacement: Document,
    ) -> StoreResult<Option<Document>>;

    /// Deletes the first match and returns it
    async fn delete_one(&self, filter: &Document) -> StoreResult<Option<Document>>;
}

/// Connection to a document database, handing out per-collection stores
#[derive(Clone)]
pub enum DataSource {
    Mongo(mongo::MongoDataSource),
    Memory(memory::MemoryDataSource),
}

impl DataSource {
    /// Connects to MongoDB in production and falls back to the in-memory
    /// backend everywhere else.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.app.environment {
            Environment::Production => {
                let source = mongo::MongoDataSource::connect(&config.database).await?;
                Ok(DataSource::Mongo(source))
            },
            Environment::Development | Environment::Test => {
                tracing::warn!(
                    environment = ?config.app.environment,
                    "Using in-memory document store; data is lost on shutdown"
                );
                Ok(DataSource::Memory(memory::MemoryDataSource::new()))
            },
        }
    }

    /// Handle for one collection
    pub fn store(&self, collection: &str) -> Arc<dyn DocumentStore> {
        match self {
            DataSource::Mongo(source) => Arc::new(source.store(collection)),
            DataSource::Memory(source) => {
                let store: Arc<dyn DocumentStore> = source.store(collection);
                store
            },
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            DataSource::Mongo(_) => "mongodb",
            DataSource::Memory(_) => "memory",
        }
    }
}

/// Builds a single-field equality filter.
pub fn field_filter(field: &str, value: impl Into<Value>) -> Document {
    let mut filter = Document::new();
    filter.insert(field.to_string(), value.into());
    filter
}

/// Looks up a possibly dotted path (`address.city`) in a document.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    if let Some(value) = document.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Filter value matching a field equal to any of `candidates` (`$in`).
pub fn any_of(candidates: Vec<Value>) -> Value {
    let mut operator = Map::new();
    operator.insert(IN_OPERATOR.to_string(), Value::Array(candidates));
    Value::Object(operator)
}

const IN_OPERATOR: &str = "$in";

/// Equality match of every filter entry; array fields match when they
/// contain the filter value. An `{"$in": [...]}` entry matches any candidate.
pub fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(path, expected)| {
        let actual = get_path(document, path);
        match expected {
            Value::Object(operator) if operator.len() == 1 => match operator.get(IN_OPERATOR) {
                Some(Value::Array(candidates)) => candidates.iter().any(|c| matches_value(actual, c)),
                _ => matches_value(actual, expected),
            },
            _ => matches_value(actual, expected),
        }
    })
}

fn matches_value(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(actual) => actual == expected,
        None => expected.is_null(),
    }
}
