pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use folio_db::{DocumentStore, IndexSpec};
use folio_http::{crud_router, factory, CrudOptions};
use folio_kernel::Module;
use folio_odm::DocumentModel;

use models::Review;

/// Reader reviews, linked to books through the `book` id.
pub struct ReviewsModule;

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
    }

    fn routes(&self, store: &Arc<dyn DocumentStore>) -> Router {
        crud_router::<Review>(Arc::clone(store), CrudOptions::new())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(factory::openapi::<Review>(&CrudOptions::new()))
    }

    /// Populating a book's reviews filters on `book`.
    fn indexes(&self) -> Vec<IndexSpec> {
        let mut indexes = Review::indexes();
        indexes.push(IndexSpec::ascending(Review::COLLECTION, "book"));
        indexes
    }
}

pub fn create_module() -> Arc<dyn Module> {
    Arc::new(ReviewsModule)
}
