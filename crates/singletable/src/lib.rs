//! Typed single-table access to key-value storage engines.
//!
//! Many record types share one physical table. Each type declares, once, how
//! its fields compose the partition key, the sort key and up to five
//! secondary index keys; the crate derives those keys on every write and
//! compiles sort-key filters into engine key conditions on every query.
//!
//! ```no_run
//! # async fn example() -> singletable::Result<()> {
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use singletable::{Client, Config, Entity, SortKeyFilter};
//!
//! #[derive(Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Task {
//!     user_id: String,
//!     task_id: String,
//!     status: String,
//!     updated_at: u64,
//! }
//!
//! impl Entity for Task {
//!     const FIELDS: &'static [&'static str] = &["userId", "taskId", "status", "updatedAt"];
//! }
//!
//! let client = Client::in_memory(&Config::from_env());
//! let tasks = client
//!     .table::<Task>("Task")
//!     .key(&["userId"], &["taskId"])
//!     .gsi1("byStatus", &["userId"], &["status", "updatedAt"])
//!     .build();
//!
//! let recent = tasks
//!     .index("byStatus")?
//!     .query(&json!({ "userId": "u1" }))?
//!     .sort_key(SortKeyFilter::default().eq("status", "active").gte("updatedAt", 1000))
//!     .all()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod batch;
pub mod client;
pub mod config;
pub mod query;
pub mod storage;
pub mod table;

#[cfg(all(test, feature = "inmemory"))]
mod testing;

pub use client::Client;
pub use config::Config;
pub use query::{Page, Query};
pub use table::{IndexQuery, Table, TableBuilder};

pub use singletable_core::condition::{Filter, SortKeyFilter};
pub use singletable_core::{Cursor, Entity, IndexId, Result, StorageError};
