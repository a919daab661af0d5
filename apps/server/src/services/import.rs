//! Import driver and per-file upsert engine.
//!
//! Each configured entity is imported from its own file inside its own
//! transaction. Row-level problems (malformed lines, unmappable fields) skip
//! the row; the first upsert failure rolls back the whole file. A failed file
//! never stops the run.

use capview_ingest::{
    map_row, DelimitedReader, EntityDescriptor, EntityKind, ReaderError, ReaderOptions, RowError,
    TypedRecord,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{config::ImportConfig, db::ImportStore, Error, Result};

/// Rows buffered between the blocking reader thread and the upsert loop.
const ROW_BUFFER: usize = 1024;

type RowResult = std::result::Result<MappedRow, RowError>;

/// A successfully mapped row and the source line it came from.
#[derive(Debug, Clone)]
pub struct MappedRow {
    pub line: u64,
    pub record: TypedRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub rows_read: u64,
    pub rows_upserted: u64,
    pub rows_failed: u64,
}

impl ImportCounts {
    /// Counts after a rollback: nothing survived.
    fn discarded(self) -> Self {
        Self {
            rows_read: self.rows_read,
            rows_upserted: 0,
            rows_failed: self.rows_read,
        }
    }

    fn add(&mut self, other: ImportCounts) {
        self.rows_read += other.rows_read;
        self.rows_upserted += other.rows_upserted;
        self.rows_failed += other.rows_failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FileNotFound,
    EmptyFile,
}

/// Why a whole file was rejected.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("could not begin transaction: {0}")]
    BeginFailed(#[source] Error),

    #[error("upsert failed at line {line}: {source}")]
    UpsertFailed {
        line: u64,
        #[source]
        source: Error,
    },

    #[error("commit failed: {0}")]
    CommitFailed(#[source] Error),

    #[error("file unreadable: {0}")]
    Unreadable(String),
}

#[derive(Debug)]
pub enum FileOutcome {
    Imported(ImportCounts),
    Skipped(SkipReason),
    Failed { counts: ImportCounts, error: FileError },
}

impl FileOutcome {
    pub fn counts(&self) -> ImportCounts {
        match self {
            FileOutcome::Imported(counts) | FileOutcome::Failed { counts, .. } => *counts,
            FileOutcome::Skipped(_) => ImportCounts::default(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub entity: EntityKind,
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<FileReport>,
}

impl ImportSummary {
    pub fn totals(&self) -> ImportCounts {
        let mut totals = ImportCounts::default();
        for report in &self.reports {
            totals.add(report.outcome.counts());
        }
        totals
    }

    pub fn failed_files(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn skipped_files(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, FileOutcome::Skipped(_)))
            .count()
    }

    pub fn report(&self, entity: EntityKind) -> Option<&FileReport> {
        self.reports.iter().find(|r| r.entity == entity)
    }
}

pub struct ImportService {
    store: Arc<dyn ImportStore>,
    options: ReaderOptions,
    entities: Vec<EntityKind>,
    progress_every: u64,
}

impl ImportService {
    pub fn new(store: Arc<dyn ImportStore>, config: &ImportConfig) -> Result<Self> {
        Ok(Self {
            store,
            options: config.reader_options().map_err(Error::Config)?,
            entities: config.selected_entities().map_err(Error::Config)?,
            progress_every: config.progress_every.max(1),
        })
    }

    pub fn entities(&self) -> &[EntityKind] {
        &self.entities
    }

    /// Import every configured entity from `dir`, in import order.
    ///
    /// Only a missing directory fails the run; file-level problems end up in
    /// the summary.
    pub async fn run(&self, dir: &Path) -> Result<ImportSummary> {
        if !dir.is_dir() {
            return Err(Error::DirectoryNotFound(dir.to_path_buf()));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            %run_id,
            dir = %dir.display(),
            entities = self.entities.len(),
            "Starting import run"
        );

        let mut reports = Vec::with_capacity(self.entities.len());
        for kind in &self.entities {
            reports.push(self.import_entity(dir, *kind).await);
        }

        let summary = ImportSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            reports,
        };
        let totals = summary.totals();
        tracing::info!(
            %run_id,
            files = summary.reports.len(),
            failed_files = summary.failed_files(),
            skipped_files = summary.skipped_files(),
            rows_read = totals.rows_read,
            rows_upserted = totals.rows_upserted,
            rows_failed = totals.rows_failed,
            duration_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "Import run finished"
        );
        Ok(summary)
    }

    /// Import one entity's file from `dir`.
    pub async fn import_entity(&self, dir: &Path, kind: EntityKind) -> FileReport {
        let descriptor = kind.descriptor();
        let path = dir.join(descriptor.source_file_name());
        let started = Instant::now();

        let outcome = match DelimitedReader::open(&path, self.options) {
            Err(ReaderError::NotFound(_)) => {
                tracing::warn!(entity = %kind, path = %path.display(), "File not found, skipping entity");
                FileOutcome::Skipped(SkipReason::FileNotFound)
            }
            Err(ReaderError::EmptyFile(_)) => {
                tracing::warn!(entity = %kind, path = %path.display(), "File is empty, skipping entity");
                FileOutcome::Skipped(SkipReason::EmptyFile)
            }
            Err(e) => FileOutcome::Failed {
                counts: ImportCounts::default(),
                error: FileError::Unreadable(e.to_string()),
            },
            Ok(reader) => {
                tracing::info!(entity = %kind, path = %path.display(), "Importing file");
                let header = reader.header().clone();
                let rows = reader.map(move |row| -> RowResult {
                    let raw = row?;
                    let record = map_row(&raw, &header, descriptor)?;
                    Ok(MappedRow {
                        line: raw.line,
                        record,
                    })
                });
                self.import_rows(descriptor, rows).await
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            FileOutcome::Imported(counts) => tracing::info!(
                entity = %kind,
                rows_read = counts.rows_read,
                rows_upserted = counts.rows_upserted,
                rows_failed = counts.rows_failed,
                elapsed_ms,
                "File imported"
            ),
            FileOutcome::Failed { counts, error } => tracing::error!(
                entity = %kind,
                path = %path.display(),
                rows_read = counts.rows_read,
                rows_failed = counts.rows_failed,
                error = %error,
                elapsed_ms,
                "File import failed"
            ),
            FileOutcome::Skipped(_) => {}
        }

        FileReport {
            entity: kind,
            path,
            outcome,
        }
    }

    /// Upsert mapped rows inside a single transaction.
    ///
    /// `rows` is drained on a blocking thread so file parsing never runs on
    /// the async workers. Rows that failed to read or map are counted and
    /// skipped. The first upsert error (or an I/O error of the source) rolls
    /// back everything written for this file.
    pub async fn import_rows<I>(&self, descriptor: &EntityDescriptor, rows: I) -> FileOutcome
    where
        I: IntoIterator<Item = RowResult> + Send + 'static,
        I::IntoIter: Send,
    {
        let entity = descriptor.name();
        let mut counts = ImportCounts::default();

        let (sender, mut receiver) = mpsc::channel(ROW_BUFFER);
        let producer = tokio::task::spawn_blocking(move || {
            for row in rows {
                // The upsert loop hung up after a file-level failure.
                if sender.blocking_send(row).is_err() {
                    break;
                }
            }
        });

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                return FileOutcome::Failed {
                    counts,
                    error: FileError::BeginFailed(e),
                }
            }
        };

        while let Some(row) = receiver.recv().await {
            let row = match row {
                Ok(row) => row,
                Err(err) if err.is_skippable() => {
                    counts.rows_read += 1;
                    counts.rows_failed += 1;
                    tracing::warn!(entity, line = err.line(), error = %err, "Skipping row");
                    continue;
                }
                Err(err) => {
                    if let Err(e) = tx.rollback().await {
                        tracing::warn!(entity, error = %e, "Rollback failed");
                    }
                    return FileOutcome::Failed {
                        counts: counts.discarded(),
                        error: FileError::Unreadable(err.to_string()),
                    };
                }
            };
            counts.rows_read += 1;

            if let Err(source) = tx.upsert(descriptor, &row.record).await {
                tracing::error!(
                    entity,
                    line = row.line,
                    error = %source,
                    "Upsert failed, rolling back file"
                );
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(entity, error = %e, "Rollback failed");
                }
                return FileOutcome::Failed {
                    counts: counts.discarded(),
                    error: FileError::UpsertFailed {
                        line: row.line,
                        source,
                    },
                };
            }
            counts.rows_upserted += 1;

            if counts.rows_read % self.progress_every == 0 {
                tracing::info!(
                    entity,
                    rows_read = counts.rows_read,
                    rows_upserted = counts.rows_upserted,
                    rows_failed = counts.rows_failed,
                    "Import progress"
                );
            }
        }

        // The channel also closes when the reader panics; never commit then.
        if let Err(join_error) = producer.await {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(entity, error = %e, "Rollback failed");
            }
            return FileOutcome::Failed {
                counts: counts.discarded(),
                error: FileError::Unreadable(format!("row reader stopped: {join_error}")),
            };
        }

        match tx.commit().await {
            Ok(()) => FileOutcome::Imported(counts),
            Err(source) => FileOutcome::Failed {
                counts: counts.discarded(),
                error: FileError::CommitFailed(source),
            },
        }
    }
}
