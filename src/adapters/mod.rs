//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `sqlite`: SQLite for local storage
//! - `packages`: temporary files handed to platform matching
//! - `sanitize`: secret filtering for logs

pub mod packages;
pub mod sanitize;
pub mod sqlite;

pub use packages::TempDirPackageWriter;
// Re-export storage error for lib.rs
pub use sqlite::{SqliteStore, StorageError};
