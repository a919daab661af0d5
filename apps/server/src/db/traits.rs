//! Store abstractions used by the import and search services

use async_trait::async_trait;
use capview_ingest::{EntityDescriptor, EntityKind, TypedRecord, ID_COLUMN};

use crate::db::search::{SearchSource, SearchTerm};
use crate::{Error, Result};

/// Opens one write transaction per imported file.
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ImportTransaction>>;
}

/// A file-scoped write transaction. Nothing is visible to readers before
/// `commit`; `rollback` (or dropping the transaction) discards every upsert.
#[async_trait]
pub trait ImportTransaction: Send {
    /// Insert the record, or overwrite the descriptor's update columns of the
    /// row that already holds the same conflict key. Returns affected rows.
    async fn upsert(&mut self, descriptor: &EntityDescriptor, record: &TypedRecord)
        -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Read side: candidate-key queries for the search fan-out and plain
/// filtered/paginated record fetches for hydration and the read API.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Distinct, non-null business keys of `source` rows matching `term`.
    async fn find_candidate_keys(
        &self,
        source: &SearchSource,
        term: &SearchTerm,
    ) -> Result<Vec<String>>;

    async fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<TypedRecord>>;

    /// Number of rows matching the query filter. Ordering and paging are ignored.
    async fn count_records(&self, query: &RecordQuery) -> Result<i64>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub entity: EntityKind,
    pub filter: Option<ColumnFilter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl RecordQuery {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Keep rows whose `column` equals `value`.
    pub fn filter_eq(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.filter = Some(ColumnFilter {
            column,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: &'static str, descending: bool) -> Self {
        self.order.push(OrderBy { column, descending });
        self
    }

    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit.max(0));
        self.offset = offset.max(0);
        self
    }

    /// Reject column names the entity does not declare.
    pub fn validate(&self) -> Result<()> {
        let descriptor = self.entity.descriptor();
        let known = |column: &str| column == ID_COLUMN || descriptor.has_column(column);

        let referenced = self
            .filter
            .iter()
            .map(|f| f.column)
            .chain(self.order.iter().map(|o| o.column));
        for column in referenced {
            if !known(column) {
                return Err(Error::Internal(format!(
                    "unknown column '{}' for entity {}",
                    column, self.entity
                )));
            }
        }
        Ok(())
    }
}
