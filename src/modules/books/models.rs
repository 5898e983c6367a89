use folio_db::bson::{doc, Document};
use folio_odm::{
    slugify, DocumentModel, FieldSpec, ModelError, ModelResult, QueryContext, SaveContext, Schema,
    VirtualField,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::modules::reviews::models::Review;

static BOOK_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        FieldSpec::text("name")
            .describe("Title of the book")
            .required("A book must have a name")
            .unique()
            .trim()
            .max_length(40, "A book name must have less or equal then 40 characters")
            .min_length(3, "A book name must have more or equal then 3 characters"),
        FieldSpec::text("slug")
            .describe("URL-friendly name, set once at creation")
            .derived(),
        FieldSpec::integer("pages")
            .describe("Number of pages")
            .required("A book must have a number of pages"),
        FieldSpec::decimal("ratingsAverage")
            .default_value(4.5)
            .min(1.0, "Rating must be above 1.0")
            .max(5.0, "Rating must be below 5.0")
            .round_to(1),
        FieldSpec::integer("ratingsQuantity").default_value(0_i64),
        FieldSpec::text("description")
            .required("A book must have a description")
            .trim(),
        FieldSpec::text("imageCover")
            .describe("Cover image reference")
            .required("A book must have a cover image"),
        FieldSpec::boolean("secretBook")
            .describe("Hidden from every read endpoint")
            .default_value(false),
    ])
});

const BOOK_VIRTUALS: &[VirtualField] = &[VirtualField::of::<Review>("reviews", "book", "_id")];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename(deserialize = "_id"))]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub pages: i64,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub description: String,
    pub image_cover: String,
    pub secret_book: bool,
    /// Present only when populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

/// Condition appended to every read so secret books stay hidden.
fn hide_secret_books() -> Document {
    doc! { "secretBook": { "$ne": true } }
}

impl DocumentModel for Book {
    const NAME: &'static str = "book";
    const COLLECTION: &'static str = "books";

    fn schema() -> &'static Schema {
        &BOOK_SCHEMA
    }

    fn virtuals() -> &'static [VirtualField] {
        BOOK_VIRTUALS
    }

    fn pre_save(ctx: &mut SaveContext<'_>) -> ModelResult<()> {
        let name = ctx
            .get_str("name")
            .ok_or_else(|| ModelError::Hook("cannot derive slug without a name".to_string()))?;
        let slug = slugify(name);
        tracing::debug!(collection = ctx.collection, slug = %slug, "slug derived");
        ctx.set("slug", slug);
        Ok(())
    }

    fn pre_query(ctx: &mut QueryContext) {
        ctx.restrict(hide_secret_books());
        ctx.mark_started();
    }

    fn post_query(ctx: &QueryContext, documents: &[Document]) {
        if let Some(elapsed) = ctx.elapsed() {
            tracing::info!(
                collection = ctx.collection(),
                op = ctx.op().name(),
                documents = documents.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Query took {} milliseconds",
                elapsed.as_millis()
            );
        }
    }
}
