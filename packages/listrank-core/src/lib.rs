#![forbid(unsafe_code)]
//! Dense, gapless list positions for rows grouped into scopes.
//! This crate holds the ordering algorithm and stays independent of concrete storage engines:
//! any transactional store that can satisfy `ListStore` (row locks, ordered scoped reads and
//! a set-based update) can back it.

pub mod config;
pub mod error;
pub mod ids;
pub mod list;
pub mod memory;
pub mod plan;
pub mod predicate;
pub mod registry;
pub mod schema;
pub mod scope;
#[cfg(feature = "sql-storage")]
pub mod sql;
pub mod traits;
pub mod tx;

pub use config::{ListConfig, DEFAULT_POSITION_COLUMN};
pub use error::{Error, Result};
pub use ids::{ItemId, ListEntry, Position, Reposition, Value};
pub use list::{Hook, ListTable, OrderedList};
pub use memory::{MemoryListStore, Row};
pub use plan::{Plan, Shift};
pub use predicate::PredicateTemplate;
pub use registry::ListRegistry;
pub use schema::{Association, AssociationKind, EntitySchema};
pub use scope::{Scope, ScopeCondition, ScopeSpec};
pub use traits::{HasPosition, HasScopeKey, ListItem, ListStore, Window};
pub use tx::transaction;
