#![forbid(unsafe_code)]
//! SQLite storage for `listrank-core`.
//!
//! `SqliteListStore` runs the list manager's statements on a `rusqlite::Connection`. The host
//! keeps using the same connection (via `connection()`) for its own rows, so list updates and
//! row inserts/deletes share one transaction.

mod storage;

pub use storage::{SqliteListStore, DEFAULT_BUSY_TIMEOUT};
