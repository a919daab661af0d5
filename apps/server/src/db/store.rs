//! PostgreSQL-backed `ImportStore` and `RecordStore` implementation

use async_trait::async_trait;
use capview_ingest::{EntityDescriptor, EntityKind, TypedRecord, ID_COLUMN};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};

use crate::{
    db::search::{MatchMode, SearchSource, SearchTerm},
    db::traits::{ImportStore, ImportTransaction, RecordQuery, RecordStore},
    Error, Result,
};

#[derive(Clone)]
pub struct PostgresRegistryStore {
    pub(crate) pool: PgPool,
}

impl PostgresRegistryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgImportTransaction {
    tx: Transaction<'static, Postgres>,
    // Upsert statement per (entity, identifier bound)
    statements: HashMap<(EntityKind, bool), String>,
    // Tables written with explicit ids since their last sequence resync
    explicit_ids: HashSet<EntityKind>,
}

impl PgImportTransaction {
    async fn resync_identity(&mut self, kind: EntityKind) -> Result<()> {
        sqlx::query(&resync_identity_sql(kind.descriptor()))
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl ImportStore for PostgresRegistryStore {
    async fn begin(&self) -> Result<Box<dyn ImportTransaction>> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        Ok(Box::new(PgImportTransaction {
            tx,
            statements: HashMap::new(),
            explicit_ids: HashSet::new(),
        }))
    }
}

#[async_trait]
impl ImportTransaction for PgImportTransaction {
    async fn upsert(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &TypedRecord,
    ) -> Result<u64> {
        let kind = descriptor.kind();
        let with_id = record.id().is_some();
        // Explicit ids do not advance the identity sequence.
        if with_id {
            self.explicit_ids.insert(kind);
        } else if self.explicit_ids.remove(&kind) {
            self.resync_identity(kind).await?;
        }

        let sql = self
            .statements
            .entry((kind, with_id))
            .or_insert_with(|| upsert_sql(descriptor, with_id));

        let mut query = sqlx::query(sql.as_str());
        if let Some(id) = record.id() {
            query = query.bind(id);
        }
        for (_, value) in record.columns() {
            query = query.bind(value);
        }

        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        for kind in std::mem::take(&mut this.explicit_ids) {
            this.resync_identity(kind).await?;
        }
        this.tx.commit().await.map_err(Error::Database)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(Error::Database)
    }
}

#[async_trait]
impl RecordStore for PostgresRegistryStore {
    async fn find_candidate_keys(
        &self,
        source: &SearchSource,
        term: &SearchTerm,
    ) -> Result<Vec<String>> {
        let (sql, params) = candidate_keys_query(source, term);
        let mut q = sqlx::query(&sql);
        for param in &params {
            q = q.bind(param.as_str());
        }
        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("key").map_err(Error::Database))
            .collect()
    }

    async fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<TypedRecord>> {
        query.validate()?;
        let descriptor = query.entity.descriptor();

        let columns = descriptor
            .fields()
            .iter()
            .map(|f| quote_ident(f.column))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns,
            quote_ident(descriptor.table())
        );
        let mut next_param = 1;
        if let Some(filter) = &query.filter {
            sql.push_str(&format!(
                " WHERE {} = ${}",
                filter_expr(filter.column),
                next_param
            ));
            next_param += 1;
        }
        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|o| {
                    format!(
                        "{} {}",
                        quote_ident(o.column),
                        if o.descending { "DESC" } else { "ASC" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        if query.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${next_param}"));
            next_param += 1;
        }
        sql.push_str(&format!(" OFFSET ${next_param}"));

        let mut q = sqlx::query(&sql);
        if let Some(filter) = &query.filter {
            q = q.bind(filter.value.as_str());
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }
        q = q.bind(query.offset);

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        rows.iter()
            .map(|row| decode_record(descriptor, row))
            .collect()
    }

    async fn count_records(&self, query: &RecordQuery) -> Result<i64> {
        query.validate()?;
        let descriptor = query.entity.descriptor();

        let mut sql = format!("SELECT COUNT(*) AS total FROM {}", quote_ident(descriptor.table()));
        if let Some(filter) = &query.filter {
            sql.push_str(&format!(" WHERE {} = $1", filter_expr(filter.column)));
        }

        let mut q = sqlx::query(&sql);
        if let Some(filter) = &query.filter {
            q = q.bind(filter.value.as_str());
        }
        let row = q.fetch_one(&self.pool).await.map_err(Error::Database)?;
        row.try_get("total").map_err(Error::Database)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// The identifier is BIGINT; every other column is TEXT and compared as such.
fn filter_expr(column: &str) -> String {
    if column == ID_COLUMN {
        format!("{}::TEXT", quote_ident(column))
    } else {
        quote_ident(column)
    }
}

/// `INSERT ... ON CONFLICT (<conflict>) DO UPDATE SET <update> = EXCLUDED.<update>`.
///
/// Parameters: `$1` is the identifier when `with_id`, then one parameter per
/// text column in field order.
/// Move the identity sequence of `descriptor`'s table to its highest id, so
/// the next generated id cannot collide with an explicit one.
pub(crate) fn resync_identity_sql(descriptor: &EntityDescriptor) -> String {
    let table = quote_ident(descriptor.table());
    let id = quote_ident(ID_COLUMN);
    format!(
        "SELECT setval(pg_get_serial_sequence('{table}', '{ID_COLUMN}'), \
         GREATEST(COALESCE(MAX({id}), 0), 1), COALESCE(MAX({id}), 0) >= 1) FROM {table}"
    )
}

pub(crate) fn upsert_sql(descriptor: &EntityDescriptor, with_id: bool) -> String {
    let mut columns: Vec<&str> = Vec::with_capacity(descriptor.fields().len());
    if with_id {
        columns.push(ID_COLUMN);
    }
    columns.extend(
        descriptor
            .fields()
            .iter()
            .filter(|f| !f.is_id())
            .map(|f| f.column),
    );

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let conflict = descriptor
        .conflict_columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let action = if descriptor.update_columns().is_empty() {
        "DO NOTHING".to_string()
    } else {
        let set = descriptor
            .update_columns()
            .iter()
            .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {set}")
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        quote_ident(descriptor.table()),
        column_list,
        placeholders,
        conflict,
        action
    )
}

/// `SELECT DISTINCT <key> ... WHERE <predicates>` plus its parameters.
///
/// Only the parameters the source references are bound: the lowered term for
/// equality predicates and the escaped LIKE pattern for substring predicates.
pub(crate) fn candidate_keys_query(source: &SearchSource, term: &SearchTerm) -> (String, Vec<String>) {
    let mut params = Vec::new();
    let mut equals_param = None;
    let mut contains_param = None;

    let predicates = source
        .predicates
        .iter()
        .map(|p| match p.mode {
            MatchMode::Equals => {
                let n = *equals_param.get_or_insert_with(|| {
                    params.push(term.lowered().to_string());
                    params.len()
                });
                format!("LOWER({}) = ${n}", quote_ident(p.column))
            }
            MatchMode::Contains => {
                let n = *contains_param.get_or_insert_with(|| {
                    params.push(term.like_pattern());
                    params.len()
                });
                format!("LOWER({}) LIKE ${n} ESCAPE '\\'", quote_ident(p.column))
            }
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    let key = quote_ident(source.key_column);

    let sql = format!(
        "SELECT DISTINCT {key} AS key FROM {} WHERE {key} IS NOT NULL AND {key} <> '' AND ({predicates})",
        quote_ident(source.entity.descriptor().table()),
    );
    (sql, params)
}

fn decode_record(descriptor: &EntityDescriptor, row: &PgRow) -> Result<TypedRecord> {
    let mut record = TypedRecord::new(descriptor.kind());
    for field in descriptor.fields() {
        if field.is_id() {
            let id: i64 = row.try_get(field.column).map_err(Error::Database)?;
            record.set_id(Some(id));
        } else {
            let value: Option<String> = row.try_get(field.column).map_err(Error::Database)?;
            record.set(field.column, value);
        }
    }
    Ok(record)
}
