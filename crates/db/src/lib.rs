//! Document store facade for FOLIO.
//!
//! The [`DocumentStore`] trait is the only persistence seam the rest of the
//! workspace talks to. Two backends are provided:
//!
//! - [`MongoStore`] - the production backend built on the `mongodb` driver
//! - [`MemoryStore`] - a process-local backend for development and tests
//!
//! Filters are plain BSON documents in MongoDB query syntax, so the same
//! filter runs unchanged against either backend.

pub mod error;
pub mod memory;
pub mod mongo;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use store::{DocumentStore, FindOptions, IndexSpec, SortOrder};

/// Re-export of the BSON crate used by every store signature.
pub use mongodb::bson;
