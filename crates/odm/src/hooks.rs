//! Explicit contexts handed to model lifecycle hooks.

use std::time::{Duration, Instant};

use folio_db::bson::{doc, Bson, Document};

/// Store operation a query hook is running around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Find,
    FindOne,
    UpdateOne,
    DeleteOne,
}

impl QueryOp {
    pub fn name(self) -> &'static str {
        match self {
            QueryOp::Find => "find",
            QueryOp::FindOne => "findOne",
            QueryOp::UpdateOne => "updateOne",
            QueryOp::DeleteOne => "deleteOne",
        }
    }

    /// Query hooks only fire for read operations.
    pub fn is_find(self) -> bool {
        self.name().starts_with("find")
    }
}

/// Document about to be inserted for the first time.
#[derive(Debug)]
pub struct SaveContext<'a> {
    pub collection: &'a str,
    pub document: &'a mut Document,
}

impl<'a> SaveContext<'a> {
    pub fn new(collection: &'a str, document: &'a mut Document) -> Self {
        Self {
            collection,
            document,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.document.get_str(field).ok()
    }

    pub fn set(&mut self, field: &str, value: impl Into<Bson>) {
        self.document.insert(field, value.into());
    }
}

/// One read in flight. Created per call and dropped when it returns.
#[derive(Debug, Clone)]
pub struct QueryContext {
    op: QueryOp,
    collection: String,
    filter: Document,
    started_at: Option<Instant>,
}

impl QueryContext {
    pub fn new(op: QueryOp, collection: impl Into<String>, filter: Document) -> Self {
        Self {
            op,
            collection: collection.into(),
            filter,
            started_at: None,
        }
    }

    pub fn op(&self) -> QueryOp {
        self.op
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn into_filter(self) -> Document {
        self.filter
    }

    /// Narrow the query with an additional condition.
    ///
    /// The caller's filter is kept intact; both must hold.
    pub fn restrict(&mut self, condition: Document) {
        if self.filter.is_empty() {
            self.filter = condition;
        } else {
            let current = std::mem::take(&mut self.filter);
            self.filter = doc! { "$and": [current, condition] };
        }
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Time since [`mark_started`](Self::mark_started), if it was called.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }
}
