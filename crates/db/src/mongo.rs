//! MongoDB implementation of [`DocumentStore`].

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneAndUpdateOptions, FindOptions as MongoFindOptions, IndexOptions,
        ReturnDocument,
    },
    Client, Collection, Database, IndexModel,
};

use crate::{
    error::{StoreError, StoreResult},
    store::{DocumentStore, FindOptions, IndexSpec},
};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Document store backed by a MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            database: client.database(database),
        }
    }

    /// Parse `uri`, build a client, and bind it to `database`.
    ///
    /// The driver connects lazily; [`DocumentStore::ping`] verifies the
    /// server is reachable.
    pub async fn connect(uri: &str, database: &str, app_name: Option<&str>) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.app_name = app_name.map(str::to_string);

        let client =
            Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(database, "MongoDB client configured");
        Ok(Self::new(client, database))
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

/// Map driver errors, surfacing unique index violations as
/// [`StoreError::DuplicateKey`].
fn map_write_error(collection: &str, err: mongodb::error::Error) -> StoreError {
    let message = match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => {
            Some(e.message.clone())
        }
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY_CODE => Some(e.message.clone()),
        _ => None,
    };

    match message {
        Some(message) => StoreError::DuplicateKey {
            collection: collection.to_string(),
            key: duplicate_key(&message),
        },
        None => StoreError::from(err),
    }
}

/// Extract the `{ field: value }` part of an E11000 message.
fn duplicate_key(message: &str) -> String {
    message
        .split("dup key: ")
        .nth(1)
        .unwrap_or(message)
        .trim()
        .to_string()
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
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

        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| map_write_error(collection, e))?;

        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let mut find_options = MongoFindOptions::default();
        if !options.sort.is_empty() {
            find_options.sort = Some(
                options
                    .sort
                    .iter()
                    .map(|(field, order)| (field.clone(), Bson::Int32(order.as_i32())))
                    .collect(),
            );
        }

        let documents = self
            .collection(collection)
            .find(filter)
            .with_options(find_options)
            .await?
            .try_collect::<Vec<Document>>()
            .await?;

        Ok(documents)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: Document,
    ) -> StoreResult<Option<Document>> {
        // `$set` rejects an empty document
        if changes.is_empty() {
            return self.find_one(collection, filter).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection(collection)
            .find_one_and_update(filter, doc! { "$set": changes })
            .with_options(options)
            .await
            .map_err(|e| map_write_error(collection, e))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<bool> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        let model = IndexModel::builder()
            .keys(doc! { index.field.as_str(): 1 })
            .options(
                IndexOptions::builder()
                    .unique(index.unique)
                    .name(index.name())
                    .build(),
            )
            .build();

        self.collection(&index.collection)
            .create_index(model)
            .await?;

        tracing::info!(
            collection = %index.collection,
            field = %index.field,
            unique = index.unique,
            "index ensured"
        );
        Ok(())
    }
}
