//! In-process store used by tests and `import --dry-run`.
//!
//! Emulates the PostgreSQL behavior the services rely on: file transactions
//! that are invisible until commit, `ON CONFLICT` upserts (a null conflict
//! value never conflicts, as with a unique index), generated identifiers and
//! primary-key uniqueness. Failures can be injected per row, per commit and
//! per search source.

use async_trait::async_trait;
use capview_ingest::{EntityDescriptor, EntityKind, TypedRecord, ID_COLUMN};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    db::search::{SearchSource, SearchTerm},
    db::traits::{ImportStore, ImportTransaction, OrderBy, RecordQuery, RecordStore},
    Error, Result,
};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<TypedRecord>,
    next_id: i64,
}

impl Table {
    /// Mirrors `INSERT .. ON CONFLICT DO UPDATE` on an identity column: a
    /// missing id draws from the sequence before the conflict check, and an
    /// explicit id leaves the sequence where it was.
    fn upsert(&mut self, descriptor: &EntityDescriptor, record: &TypedRecord) -> Result<u64> {
        let mut row = record.clone();
        if row.id().is_none() {
            self.next_id += 1;
            row.set_id(Some(self.next_id));
        }

        let conflict_key: Option<Vec<String>> = descriptor
            .conflict_columns()
            .iter()
            .map(|c| row.column_value(c))
            .collect();

        if let Some(key) = conflict_key {
            let existing = self.rows.iter_mut().find(|existing| {
                descriptor
                    .conflict_columns()
                    .iter()
                    .zip(&key)
                    .all(|(c, v)| existing.column_value(c).as_deref() == Some(v.as_str()))
            });
            if let Some(existing) = existing {
                for column in descriptor.update_columns() {
                    existing.set(column, row.get(column).map(str::to_string));
                }
                return Ok(1);
            }
        }

        if self.rows.iter().any(|r| r.id() == row.id()) {
            return Err(Error::Internal(format!(
                "duplicate key value violates unique constraint \"{}_pkey\" (id={})",
                descriptor.table(),
                row.id().unwrap_or_default()
            )));
        }
        self.rows.push(row);
        Ok(1)
    }

    /// Move the sequence to the highest stored id.
    fn resync_identity(&mut self) {
        self.next_id = self.rows.iter().filter_map(|r| r.id()).max().unwrap_or(0).max(0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UpsertFault {
    entity: EntityKind,
    column: &'static str,
    value: String,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<EntityKind, Table>,
    upsert_faults: Vec<UpsertFault>,
    fail_next_commit: bool,
    failing_sources: HashSet<&'static str>,
}

#[derive(Clone, Default)]
pub struct InMemoryRegistryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        lock(&self.inner)
    }

    /// Make every upsert of `entity` whose `column` equals `value` fail.
    pub fn fail_upserts_matching(
        &self,
        entity: EntityKind,
        column: &'static str,
        value: impl Into<String>,
    ) -> Result<()> {
        self.lock()?.upsert_faults.push(UpsertFault {
            entity,
            column,
            value: value.into(),
        });
        Ok(())
    }

    /// Make the next commit fail (and discard its changes).
    pub fn fail_next_commit(&self) -> Result<()> {
        self.lock()?.fail_next_commit = true;
        Ok(())
    }

    /// Make candidate-key queries against the named search source fail.
    pub fn fail_search_source(&self, source: &'static str) -> Result<()> {
        self.lock()?.failing_sources.insert(source);
        Ok(())
    }

    /// Write a record directly, as if imported and committed on its own.
    pub fn seed(&self, record: TypedRecord) -> Result<()> {
        let descriptor = record.descriptor();
        let mut inner = self.lock()?;
        let table = inner.tables.entry(record.kind()).or_default();
        table.upsert(descriptor, &record)?;
        if record.id().is_some() {
            table.resync_identity();
        }
        Ok(())
    }

    /// Committed rows of `entity`, in insertion order.
    pub fn rows(&self, entity: EntityKind) -> Result<Vec<TypedRecord>> {
        Ok(self
            .lock()?
            .tables
            .get(&entity)
            .map(|t| t.rows.clone())
            .unwrap_or_default())
    }

    pub fn row_count(&self, entity: EntityKind) -> Result<usize> {
        Ok(self
            .lock()?
            .tables
            .get(&entity)
            .map_or(0, |t| t.rows.len()))
    }
}

fn lock(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>> {
    inner
        .lock()
        .map_err(|_| Error::Internal("in-memory store lock poisoned".to_string()))
}

pub struct MemoryImportTransaction {
    inner: Arc<Mutex<Inner>>,
    // Copy-on-first-write snapshot of every table this transaction touched
    staged: HashMap<EntityKind, Table>,
    // Tables written with explicit ids since their last sequence resync
    explicit_ids: HashSet<EntityKind>,
}

#[async_trait]
impl ImportStore for InMemoryRegistryStore {
    async fn begin(&self) -> Result<Box<dyn ImportTransaction>> {
        Ok(Box::new(MemoryImportTransaction {
            inner: Arc::clone(&self.inner),
            staged: HashMap::new(),
            explicit_ids: HashSet::new(),
        }))
    }
}

#[async_trait]
impl ImportTransaction for MemoryImportTransaction {
    async fn upsert(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &TypedRecord,
    ) -> Result<u64> {
        let kind = descriptor.kind();
        {
            let inner = lock(&self.inner)?;
            let injected = inner.upsert_faults.iter().any(|f| {
                f.entity == kind && record.column_value(f.column).as_deref() == Some(&f.value)
            });
            if injected {
                return Err(Error::Internal(format!(
                    "injected upsert failure for {}",
                    descriptor.name()
                )));
            }
            if !self.staged.contains_key(&kind) {
                let snapshot = inner.tables.get(&kind).cloned().unwrap_or_default();
                self.staged.insert(kind, snapshot);
            }
        }

        let table = self.staged.entry(kind).or_default();
        if record.id().is_some() {
            self.explicit_ids.insert(kind);
        } else if self.explicit_ids.remove(&kind) {
            table.resync_identity();
        }
        table.upsert(descriptor, record)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryImportTransaction {
            inner,
            mut staged,
            explicit_ids,
        } = *self;
        for kind in explicit_ids {
            if let Some(table) = staged.get_mut(&kind) {
                table.resync_identity();
            }
        }
        let mut guard = lock(&inner)?;
        if std::mem::take(&mut guard.fail_next_commit) {
            return Err(Error::Internal("injected commit failure".to_string()));
        }
        guard.tables.extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRegistryStore {
    async fn find_candidate_keys(
        &self,
        source: &SearchSource,
        term: &SearchTerm,
    ) -> Result<Vec<String>> {
        let inner = self.lock()?;
        if inner.failing_sources.contains(source.name) {
            return Err(Error::Internal(format!(
                "injected query failure for source {}",
                source.name
            )));
        }

        let Some(table) = inner.tables.get(&source.entity) else {
            return Ok(Vec::new());
        };
        let keys: BTreeSet<String> = table
            .rows
            .iter()
            .filter(|row| {
                source.predicates.iter().any(|p| {
                    row.get(p.column)
                        .is_some_and(|value| term.matches(p.mode, value))
                })
            })
            .filter_map(|row| row.get(source.key_column))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<TypedRecord>> {
        query.validate()?;
        let inner = self.lock()?;
        let mut rows: Vec<TypedRecord> = inner
            .tables
            .get(&query.entity)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|row| matches_filter(row, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| compare_rows(a, b, &query.order));

        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(0));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_records(&self, query: &RecordQuery) -> Result<i64> {
        query.validate()?;
        let inner = self.lock()?;
        let count = inner
            .tables
            .get(&query.entity)
            .map_or(0, |t| t.rows.iter().filter(|row| matches_filter(row, query)).count());
        Ok(count as i64)
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

fn matches_filter(row: &TypedRecord, query: &RecordQuery) -> bool {
    match &query.filter {
        Some(filter) => row.column_value(filter.column).as_deref() == Some(filter.value.as_str()),
        None => true,
    }
}

// PostgreSQL default ordering: NULLS LAST ascending, NULLS FIRST descending.
fn compare_rows(a: &TypedRecord, b: &TypedRecord, order: &[OrderBy]) -> Ordering {
    for o in order {
        let ordering = if o.column == ID_COLUMN {
            compare_nullable(a.id(), b.id())
        } else {
            compare_nullable(a.get(o.column), b.get(o.column))
        };
        let ordering = if o.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_nullable<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
