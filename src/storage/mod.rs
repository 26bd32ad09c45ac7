//! Storage backends for catalogued records
//!
//! All backends implement the `RecordStore` trait. `SqliteStore` is the
//! persistent implementation; `MemoryStore` backs tests and dry runs.

mod memory;
mod oracle;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use oracle::StoreOracle;
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};
