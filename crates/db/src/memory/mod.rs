//! In-memory document store.
//!
//! Documents live in insertion order per collection behind an async
//! read-write lock. Unique indexes are enforced under the write lock, so
//! concurrent inserts of the same key resolve to one success and one
//! [`StoreError::DuplicateKey`].

mod evaluator;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use crate::{
    error::{StoreError, StoreResult},
    store::{DocumentStore, FindOptions, IndexSpec, SortOrder},
};

use evaluator::{sort_order, values_equal, DocumentEvaluator};

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    /// collection name -> fields carrying a unique index
    unique_fields: HashMap<String, Vec<String>>,
}

impl State {
    fn collection(&self, name: &str) -> &[Document] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check `candidate` against every other document's unique keys.
    /// `skip` is the position of the document being replaced, if any.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        skip: Option<usize>,
    ) -> StoreResult<()> {
        let Some(fields) = self.unique_fields.get(collection) else {
            return Ok(());
        };

        for field in fields {
            let Some(value) = candidate.get(field) else {
                continue;
            };

            let clash = self
                .collection(collection)
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .any(|(_, existing)| {
                    existing
                        .get(field)
                        .is_some_and(|other| values_equal(other, value))
                });

            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    key: format!("{{ {field}: {value} }}"),
                });
            }
        }

        Ok(())
    }

    fn position(&self, collection: &str, filter: &Document) -> StoreResult<Option<usize>> {
        for (position, document) in self.collection(collection).iter().enumerate() {
            if DocumentEvaluator::new(document).matches(filter)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }
}

/// Process-local [`DocumentStore`].
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> StoreResult<ObjectId> {
        let id = match document.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "_id must be an ObjectId, got {other}"
                )))
            }
            None => {
                let id = ObjectId::new();
                document.insert("_id", id);
                id
            }
        };

        let mut state = self.state.write().await;

        if state.position(collection, &mongodb::bson::doc! { "_id": id })?.is_some() {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key: format!("{{ _id: {id} }}"),
            });
        }
        state.check_unique(collection, &document, None)?;

        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document);

        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let state = self.state.read().await;

        let mut found = Vec::new();
        for document in state.collection(collection) {
            if DocumentEvaluator::new(document).matches(&filter)? {
                found.push(document.clone());
            }
        }

        if !options.sort.is_empty() {
            found.sort_by(|left, right| {
                options
                    .sort
                    .iter()
                    .map(|(field, order)| {
                        let ordering = sort_order(left.get(field), right.get(field));
                        match order {
                            SortOrder::Ascending => ordering,
                            SortOrder::Descending => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        Ok(found)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        let state = self.state.read().await;
        let position = state.position(collection, &filter)?;
        Ok(position.map(|position| state.collection(collection)[position].clone()))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: Document,
    ) -> StoreResult<Option<Document>> {
        if changes.contains_key("_id") {
            return Err(StoreError::InvalidDocument("_id is immutable".to_string()));
        }

        let mut state = self.state.write().await;
        let Some(position) = state.position(collection, &filter)? else {
            return Ok(None);
        };

        let mut updated = state.collection(collection)[position].clone();
        for (field, value) in changes {
            updated.insert(field, value);
        }
        state.check_unique(collection, &updated, Some(position))?;

        if let Some(documents) = state.collections.get_mut(collection) {
            documents[position] = updated.clone();
        }

        Ok(Some(updated))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(position) = state.position(collection, &filter)? else {
            return Ok(false);
        };

        if let Some(documents) = state.collections.get_mut(collection) {
            documents.remove(position);
        }

        Ok(true)
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        if !index.unique {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let fields = state
            .unique_fields
            .entry(index.collection.clone())
            .or_default();

        if !fields.contains(&index.field) {
            fields.push(index.field.clone());
            tracing::debug!(
                collection = %index.collection,
                field = %index.field,
                "unique index registered"
            );
        }

        Ok(())
    }
}
