#![forbid(unsafe_code)]
//! Postgres-backed `ListStore` for `listrank-core`.
//!
//! Scope locks combine a transaction-scoped advisory lock (so writers on an empty scope still
//! serialize) with `SELECT .. FOR UPDATE` on the scope's members.

mod lock_key;
mod schema;
mod store;

pub use lock_key::scope_lock_key;
pub use schema::ensure_scope_index;
pub use store::{PgListStore, PgStoreOptions, DEFAULT_LOCK_TIMEOUT};
