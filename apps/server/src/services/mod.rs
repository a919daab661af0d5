//! Business logic layer
//!
//! Services orchestrate operations by coordinating the stores, applying
//! the import and search rules, and managing transactions.

pub mod company;
pub mod import;
pub mod search;

pub use company::CompanyService;
pub use import::{
    FileError, FileOutcome, FileReport, ImportCounts, ImportService, ImportSummary, MappedRow,
    SkipReason,
};
pub use search::{CandidateKeySet, KeyPage, SearchService};
