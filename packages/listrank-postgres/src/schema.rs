use postgres::Client;

use listrank_core::sql::scope_index;
use listrank_core::{Error, OrderedList, Result};

const SCHEMA_LOCK_KEY: i64 = 0x6c69737472616e6b; // "listrank"

/// Create the `(scope columns.., position)` index for `list` if it does not exist.
pub fn ensure_scope_index(client: &mut Client, list: &OrderedList) -> Result<()> {
    // Concurrent `CREATE INDEX IF NOT EXISTS` can still collide in the catalog; serialize it.
    client
        .query_one("SELECT pg_advisory_lock($1)", &[&SCHEMA_LOCK_KEY])
        .map_err(|e| Error::Storage(format!("{e:?}")))?;

    let res = client
        .batch_execute(&scope_index(list))
        .map_err(|e| Error::Storage(format!("{e:?}")));

    // Session lock; also released when the connection is dropped.
    let _ = client.query_one("SELECT pg_advisory_unlock($1)", &[&SCHEMA_LOCK_KEY]);

    res
}
