//! Company registry ingestion and lookup.
//!
//! ```text
//!   extract files ──► ImportService ──► ImportStore (one transaction per file)
//!                          │
//!                 capview-ingest (reader, mapper, descriptors)
//!
//!   GET /api/v1/search/detailed ──► SearchService ──► RecordStore
//!        fan-out (one task per source) → merge → sort/page keys → hydrate
//! ```
//!
//! Both stores are traits with a PostgreSQL implementation ([`db::PostgresRegistryStore`])
//! and an in-memory one ([`db::InMemoryRegistryStore`]) used by tests and dry runs.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use error::{Error, Result};
