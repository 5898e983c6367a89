use std::{marker::PhantomData, sync::Arc};

use folio_db::{
    bson::{doc, oid::ObjectId, Bson, Document},
    DocumentStore, FindOptions, IndexSpec,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    convert::document_to_json,
    error::{ModelError, ModelResult},
    hooks::{QueryContext, QueryOp, SaveContext},
    query::ListQuery,
    schema::Schema,
};

/// Read-time relation to documents of another model.
///
/// Nothing is stored on the owning document; populating `name` runs
/// `find(collection, { foreign_field: <local_field value> })` with the
/// related model's query hooks around it.
#[derive(Clone, Copy)]
pub struct VirtualField {
    pub name: &'static str,
    pub collection: &'static str,
    pub foreign_field: &'static str,
    pub local_field: &'static str,
    pre_query: fn(&mut QueryContext),
    post_query: fn(&QueryContext, &[Document]),
}

impl VirtualField {
    /// Relation to `R` documents whose `foreign_field` equals this
    /// document's `local_field`.
    pub const fn of<R: DocumentModel>(
        name: &'static str,
        foreign_field: &'static str,
        local_field: &'static str,
    ) -> Self {
        Self {
            name,
            collection: R::COLLECTION,
            foreign_field,
            local_field,
            pre_query: R::pre_query,
            post_query: R::post_query,
        }
    }
}

impl std::fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualField")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("foreign_field", &self.foreign_field)
            .field("local_field", &self.local_field)
            .finish_non_exhaustive()
    }
}

/// A persisted type with a schema and lifecycle hooks.
///
/// The type is decoded from the stored document rendered as JSON, so its
/// serde attributes must accept `_id` as a hex string.
pub trait DocumentModel: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Singular resource name used in messages.
    const NAME: &'static str;
    const COLLECTION: &'static str;

    fn schema() -> &'static Schema;

    fn virtuals() -> &'static [VirtualField] {
        &[]
    }

    /// Runs once per document right before its first insert.
    fn pre_save(_ctx: &mut SaveContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Runs before every `find*` operation.
    fn pre_query(_ctx: &mut QueryContext) {}

    /// Runs after every `find*` operation with the raw result set.
    fn post_query(_ctx: &QueryContext, _documents: &[Document]) {}

    fn indexes() -> Vec<IndexSpec> {
        Self::schema().indexes(Self::COLLECTION)
    }
}

/// Operations on one model type backed by a document store.
pub struct Model<M> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for Model<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Model<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("type", &std::any::type_name::<M>())
            .field("store", &self.store)
            .finish()
    }
}

impl<M: DocumentModel> Model<M> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn find(&self, filter: Document, options: FindOptions) -> ModelResult<Vec<M>> {
        let mut ctx = QueryContext::new(QueryOp::Find, M::COLLECTION, filter);
        before_query::<M>(&mut ctx);

        let documents = self
            .store
            .find(M::COLLECTION, ctx.filter().clone(), options)
            .await?;
        after_query::<M>(&ctx, &documents);

        documents.iter().map(decode).collect()
    }

    pub async fn list(&self, query: ListQuery) -> ModelResult<Vec<M>> {
        self.find(query.filter, query.options).await
    }

    /// Fetch by hex id, expanding the named virtual fields.
    ///
    /// A malformed id cannot match any document and yields `None`.
    pub async fn find_by_id(&self, id: &str, populate: &[&str]) -> ModelResult<Option<M>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };

        let mut ctx = QueryContext::new(QueryOp::FindOne, M::COLLECTION, doc! { "_id": oid });
        before_query::<M>(&mut ctx);

        let found = self
            .store
            .find_one(M::COLLECTION, ctx.filter().clone())
            .await?;
        after_query::<M>(&ctx, found.as_slice());

        let Some(mut document) = found else {
            return Ok(None);
        };
        for name in populate {
            self.populate(&mut document, name).await?;
        }

        decode(&document).map(Some)
    }

    pub async fn create(&self, payload: &Value) -> ModelResult<M> {
        let mut document = M::schema().validate_create(payload)?;
        M::pre_save(&mut SaveContext::new(M::COLLECTION, &mut document))?;

        let id = self
            .store
            .insert_one(M::COLLECTION, document.clone())
            .await?;
        document.insert("_id", id);

        tracing::debug!(model = M::NAME, id = %id, "document created");
        decode(&document)
    }

    /// Apply the fields present in `payload`. Derived fields are left as
    /// they were written at creation.
    pub async fn update_by_id(&self, id: &str, payload: &Value) -> ModelResult<Option<M>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let changes = M::schema().validate_update(payload)?;

        let mut ctx = QueryContext::new(QueryOp::UpdateOne, M::COLLECTION, doc! { "_id": oid });
        before_query::<M>(&mut ctx);

        let updated = self
            .store
            .update_one(M::COLLECTION, ctx.into_filter(), changes)
            .await?;

        updated.as_ref().map(decode).transpose()
    }

    pub async fn delete_by_id(&self, id: &str) -> ModelResult<bool> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };

        let mut ctx = QueryContext::new(QueryOp::DeleteOne, M::COLLECTION, doc! { "_id": oid });
        before_query::<M>(&mut ctx);

        let deleted = self
            .store
            .delete_one(M::COLLECTION, ctx.into_filter())
            .await?;
        if deleted {
            tracing::debug!(model = M::NAME, id = %oid, "document deleted");
        }
        Ok(deleted)
    }

    async fn populate(&self, document: &mut Document, name: &str) -> ModelResult<()> {
        let relation = M::virtuals()
            .iter()
            .find(|relation| relation.name == name)
            .ok_or_else(|| ModelError::UnknownVirtual(name.to_string()))?;

        let key = document
            .get(relation.local_field)
            .cloned()
            .unwrap_or(Bson::Null);
        let mut filter = Document::new();
        filter.insert(relation.foreign_field, key);

        let mut ctx = QueryContext::new(QueryOp::Find, relation.collection, filter);
        (relation.pre_query)(&mut ctx);

        let related = self
            .store
            .find(relation.collection, ctx.filter().clone(), FindOptions::default())
            .await?;
        (relation.post_query)(&ctx, &related);
        document.insert(
            relation.name,
            related.into_iter().map(Bson::Document).collect::<Vec<_>>(),
        );

        Ok(())
    }
}

fn before_query<M: DocumentModel>(ctx: &mut QueryContext) {
    if ctx.op().is_find() {
        M::pre_query(ctx);
    }
}

fn after_query<M: DocumentModel>(ctx: &QueryContext, documents: &[Document]) {
    if ctx.op().is_find() {
        M::post_query(ctx, documents);
    }
}

fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn decode<M: DeserializeOwned>(document: &Document) -> ModelResult<M> {
    serde_json::from_value(document_to_json(document))
        .map_err(|err| ModelError::Decode(err.to_string()))
}
