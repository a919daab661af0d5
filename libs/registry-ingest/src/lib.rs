//! Schema-driven ingestion primitives for company-registry extracts.
//!
//! The crate turns delimited text files into typed records without knowing
//! anything about the destination store:
//!
//! ```text
//! DelimitedReader (file → RawRow) → map_row (RawRow + EntityDescriptor → TypedRecord)
//! ```
//!
//! - [`EntityDescriptor`] is the static, per-entity metadata (table, fields,
//!   conflict target, derived update columns, alias override). All seven
//!   descriptors live in one [`DescriptorRegistry`] built on first use.
//! - [`DelimitedReader`] streams a file, normalizes the header and reports
//!   malformed rows as skippable errors.
//! - [`map_row`] coerces one row into a [`TypedRecord`], collecting every
//!   field error of the row before rejecting it.
//!
//! Writing records (transactions, upserts) is the job of the caller.

mod descriptor;
mod error;
mod mapper;
mod reader;
mod record;

pub use descriptor::{
    registry, AliasOverride, DescriptorRegistry, EntityDescriptor, EntityKind, FieldDescriptor,
    FieldKind, ID_COLUMN,
};
pub use error::{FieldError, ReaderError, RegistryError, RowError};
pub use mapper::map_row;
pub use reader::{DelimitedReader, HeaderIndex, RawRow, ReaderOptions};
pub use record::TypedRecord;
