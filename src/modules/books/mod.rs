pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use folio_db::{DocumentStore, IndexSpec};
use folio_http::{crud_router, factory, CrudOptions};
use folio_kernel::{InitCtx, Module};
use folio_odm::DocumentModel;

use models::Book;

/// Book catalogue: CRUD over the `books` collection with reviews populated
/// on get-one.
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }

    fn options() -> CrudOptions {
        CrudOptions::new().populate("reviews")
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            backend = ctx.store.backend(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self, store: &Arc<dyn DocumentStore>) -> Router {
        crud_router::<Book>(Arc::clone(store), Self::options())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(factory::openapi::<Book>(&Self::options()))
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        Book::indexes()
    }
}

/// Create the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}
