//! Core of the single-table data access layer.
//!
//! Everything here is pure: key encoding, the item codec, the condition
//! compiler, schema declaration, cursors, and the [`storage::StorageEngine`]
//! trait that engine implementations provide.

pub mod codec;
pub mod condition;
pub mod cursor;
pub mod keys;
pub mod schema;
pub mod storage;

pub use cursor::Cursor;
pub use schema::{Entity, IndexId, IndexSchema, SchemaBuilder, TableSchema};
pub use storage::{Result, StorageError};
