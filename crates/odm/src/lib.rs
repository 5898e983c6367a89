//! FOLIO object-document mapper.
//!
//! A model type implements [`DocumentModel`]: it names its collection,
//! declares a [`Schema`] of per-field constraints, and may override the
//! lifecycle hooks. [`Model`] executes operations for that type against a
//! [`folio_db::DocumentStore`], running validation and hooks around each
//! call.
//!
//! ```text
//! payload ──▶ Schema::validate_* ──▶ pre_save ──▶ store write
//! filter  ──▶ pre_query ──▶ store read ──▶ post_query ──▶ populate ──▶ M
//! ```

pub mod convert;
pub mod error;
pub mod hooks;
pub mod model;
pub mod query;
pub mod schema;
pub mod slug;

pub use error::{ModelError, ModelResult};
pub use hooks::{QueryContext, QueryOp, SaveContext};
pub use model::{DocumentModel, Model, VirtualField};
pub use query::ListQuery;
pub use schema::{FieldKind, FieldSpec, FieldViolation, Schema, ValidationErrors};
pub use slug::slugify;
