//! Shared fixtures for the integration suites: CSV directories, an
//! in-memory backed application and record builders.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use capview::{
    api::create_router,
    config::{Config, ImportConfig},
    db::InMemoryRegistryStore,
    services::ImportService,
    state::AppState,
};
use capview_ingest::{EntityKind, TypedRecord};
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// CSV fixtures
// ============================================================================

/// A temporary directory of `;`-delimited source files.
pub struct CsvDir {
    dir: TempDir,
}

impl CsvDir {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `lines` (header first) to `file_name`.
    pub fn write(&self, file_name: &str, lines: &[&str]) -> anyhow::Result<PathBuf> {
        let path = self.dir.path().join(file_name);
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn write_raw(&self, file_name: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.dir.path().join(file_name);
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Import service over `store`, restricted to `entities` (all when empty).
pub fn import_service(
    store: &InMemoryRegistryStore,
    entities: &[&str],
) -> anyhow::Result<ImportService> {
    let config = ImportConfig {
        entities: entities.iter().map(|e| e.to_string()).collect(),
        ..ImportConfig::default()
    };
    Ok(ImportService::new(Arc::new(store.clone()), &config)?)
}

// ============================================================================
// HTTP harness
// ============================================================================

pub struct TestApp {
    pub state: AppState,
    pub store: InMemoryRegistryStore,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = InMemoryRegistryStore::new();
        let state = AppState::with_store(config, Arc::new(store.clone()));
        let router = create_router(state.clone());
        Self {
            state,
            store,
            router,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, body.to_vec()))
    }

    pub async fn get_json(&self, path: &str) -> anyhow::Result<(StatusCode, serde_json::Value)> {
        let (status, _headers, body) = self.request(Method::GET, path).await?;
        let json = serde_json::from_slice(&body)?;
        Ok((status, json))
    }
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "{context}: unexpected status {actual}");
}

// ============================================================================
// Record builders
// ============================================================================

pub fn record(kind: EntityKind, id: Option<i64>, values: &[(&str, &str)]) -> TypedRecord {
    let mut record = TypedRecord::new(kind);
    record.set_id(id);
    for (column, value) in values {
        assert!(
            record.set(column, Some(value.to_string())),
            "{kind} has no column {column}"
        );
    }
    record
}

pub fn register(regcode: &str, name: &str) -> TypedRecord {
    record(
        EntityKind::Registers,
        None,
        &[("regcode", regcode), ("name", name)],
    )
}

pub fn member(id: i64, regcode: &str, name: &str) -> TypedRecord {
    record(
        EntityKind::Members,
        Some(id),
        &[("legal_entity_registration_number", regcode), ("name", name)],
    )
}

pub fn beneficial_owner(id: i64, regcode: &str, forename: &str, surname: &str) -> TypedRecord {
    record(
        EntityKind::BeneficialOwners,
        Some(id),
        &[
            ("legal_entity_registration_number", regcode),
            ("forename", forename),
            ("surname", surname),
        ],
    )
}

pub fn financial_statement(id: i64, regcode: &str, year: &str) -> TypedRecord {
    record(
        EntityKind::FinancialStatements,
        Some(id),
        &[("legal_entity_registration_number", regcode), ("year", year)],
    )
}

/// A sub-statement row (income, balance or cash flow) of `statement_id`.
pub fn sub_statement(kind: EntityKind, statement_id: i64) -> TypedRecord {
    record(kind, None, &[("statement_id", &statement_id.to_string())])
}
