use std::path::PathBuf;
use thiserror::Error;

/// Lookup failures against the descriptor registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
}

/// Failures while opening a delimited file.
///
/// `NotFound` and `EmptyFile` are "skip this entity" signals for the caller,
/// everything else means the file could not be read at all.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read header of {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A single field that could not be mapped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("identifier column '{column}' is empty")]
    MissingRequiredKey { column: &'static str },

    #[error("identifier column '{column}' has non-numeric value '{value}'")]
    InvalidIdentifier { column: &'static str, value: String },

    #[error("row has {len} cells, column '{column}' is at index {index}")]
    ShortRow {
        column: &'static str,
        index: usize,
        len: usize,
    },
}

/// Row-level failures. All of them skip the row; only `Io` ends the stream.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("Malformed row at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("Row at line {line} rejected: {}", join_field_errors(.errors))]
    Mapping { line: u64, errors: Vec<FieldError> },

    #[error("I/O error after line {line}: {source}")]
    Io {
        line: u64,
        #[source]
        source: std::io::Error,
    },
}

impl RowError {
    pub fn line(&self) -> u64 {
        match self {
            RowError::Malformed { line, .. }
            | RowError::Mapping { line, .. }
            | RowError::Io { line, .. } => *line,
        }
    }

    /// Whether the stream can continue after this error.
    pub fn is_skippable(&self) -> bool {
        !matches!(self, RowError::Io { .. })
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
