use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Document};

use crate::error::StoreResult;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// MongoDB sort direction value.
    pub fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Options applied to multi-document reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
}

impl FindOptions {
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }
}

/// Single-field index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: String,
    pub field: String,
    pub unique: bool,
}

impl IndexSpec {
    pub fn unique(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            unique: true,
        }
    }

    /// Plain lookup index.
    pub fn ascending(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            unique: false,
        }
    }

    /// Index name following the MongoDB `<field>_1` convention.
    pub fn name(&self) -> String {
        format!("{}_1", self.field)
    }
}

/// Persistence driver used by the object-document mapper.
///
/// Every method addresses a collection by name and works on raw BSON
/// documents. Documents carry their identifier under `_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Check that the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Insert a document, assigning an `_id` when it has none.
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<ObjectId>;

    /// Return every document matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>>;

    /// Return the first document matching `filter`.
    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>>;

    /// Set `changes` on the first document matching `filter` and return the
    /// document as it is after the update.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: Document,
    ) -> StoreResult<Option<Document>>;

    /// Remove the first document matching `filter`. Returns whether a
    /// document was removed.
    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<bool>;

    /// Create the index if it does not exist yet.
    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()>;
}
