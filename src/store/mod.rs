//! Persistence layer: document-store trait and the SQLite backend.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    DocumentStore, EvidenceFilter, OpenStore, PromiseFilter, StorageError, StorageResult,
};
