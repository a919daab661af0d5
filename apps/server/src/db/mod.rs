//! Persistence layer: store traits, PostgreSQL and in-memory implementations

mod memory;
mod search;
mod store;
mod traits;

pub use memory::InMemoryRegistryStore;
pub use search::{MatchMode, SearchPredicate, SearchSource, SearchTerm, SEARCH_SOURCES};
pub use store::PostgresRegistryStore;
pub use traits::{
    ColumnFilter, ImportStore, ImportTransaction, OrderBy, RecordQuery, RecordStore,
};
