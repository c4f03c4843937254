use std::path::Path;
use std::time::Duration;

use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::trace;

use listrank_core::sql::{self, Placeholder, SqlStatement};
use listrank_core::{
    Error, ItemId, ListEntry, ListStore, ListTable, OrderedList, Plan, Result, ScopeCondition,
    Value, Window,
};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Classify a driver error: busy/locked is contention, constraint failures keep their kind.
pub(crate) fn storage_error(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(code, _) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Error::Contention(e.to_string()),
            ErrorCode::ConstraintViolation => Error::Constraint(e.to_string()),
            _ => Error::Storage(e.to_string()),
        },
        _ => Error::Storage(e.to_string()),
    }
}

fn to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

#[derive(Debug)]
enum Frame {
    Transaction,
    Savepoint(String),
}

/// `ListStore` over a single SQLite connection.
///
/// The outermost `begin` on an idle connection issues `BEGIN IMMEDIATE`, so the database
/// write lock is taken before any member is read. Nested `begin` calls (and calls made while
/// the host already has a transaction open on the connection) use savepoints; scope locks
/// then come from a no-op `UPDATE` that forces the write lock.
pub struct SqliteListStore {
    conn: Connection,
    frames: Vec<Frame>,
}

impl SqliteListStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, setting the default busy timeout.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(storage_error)?;
        Ok(Self {
            conn,
            frames: Vec::new(),
        })
    }

    /// How long a writer waits for a competing writer before failing with `Contention`.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        self.conn.busy_timeout(timeout).map_err(storage_error)?;
        Ok(self)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Open transactions and savepoints started through this store.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Index the list's scope columns and position column, if not already indexed.
    pub fn ensure_scope_index(&self, list: &OrderedList) -> Result<()> {
        self.batch(&sql::scope_index(list))
    }

    fn batch(&self, sql: &str) -> Result<()> {
        trace!(sql, "sqlite batch");
        self.conn.execute_batch(sql).map_err(storage_error)
    }

    fn execute(&self, stmt: &SqlStatement) -> Result<usize> {
        trace!(sql = %stmt.sql, params = ?stmt.params, "sqlite execute");
        let mut prepared = self.conn.prepare_cached(&stmt.sql).map_err(storage_error)?;
        prepared
            .execute(params_from_iter(stmt.params.iter().map(to_sql)))
            .map_err(storage_error)
    }

    fn query_entries(&self, stmt: &SqlStatement) -> Result<Vec<ListEntry>> {
        trace!(sql = %stmt.sql, params = ?stmt.params, "sqlite query");
        let mut prepared = self.conn.prepare_cached(&stmt.sql).map_err(storage_error)?;
        let rows = prepared
            .query_map(params_from_iter(stmt.params.iter().map(to_sql)), |row| {
                Ok(ListEntry {
                    id: ItemId(row.get(0)?),
                    position: row.get(1)?,
                })
            })
            .map_err(storage_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)
    }
}

impl ListStore for SqliteListStore {
    fn begin(&mut self) -> Result<()> {
        if self.frames.is_empty() && self.conn.is_autocommit() {
            self.batch("BEGIN IMMEDIATE")?;
            self.frames.push(Frame::Transaction);
        } else {
            let name = format!("listrank_sp_{}", self.frames.len());
            self.batch(&format!("SAVEPOINT {name}"))?;
            self.frames.push(Frame::Savepoint(name));
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.frames.last() {
            None => Err(Error::Storage("commit without an open transaction".into())),
            Some(Frame::Transaction) => {
                self.batch("COMMIT")?;
                self.frames.pop();
                Ok(())
            }
            Some(Frame::Savepoint(name)) => {
                self.batch(&format!("RELEASE SAVEPOINT {name}"))?;
                self.frames.pop();
                Ok(())
            }
        }
    }

    fn rollback(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::Storage("rollback without an open transaction".into()))?;
        match frame {
            // Already rolled back by SQLite (e.g. after a failed COMMIT) counts as done.
            Frame::Transaction if self.conn.is_autocommit() => Ok(()),
            Frame::Transaction => self.batch("ROLLBACK"),
            Frame::Savepoint(name) => {
                self.batch(&format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"))
            }
        }
    }

    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>> {
        // SQLite locks the whole database; make sure this connection holds the write lock
        // even when the enclosing transaction was started deferred.
        self.batch(&format!(
            "UPDATE {t} SET {c} = {c} WHERE 0",
            t = sql::quote_ident(&table.table),
            c = sql::quote_ident(&table.column)
        ))?;
        let stmt = sql::lock_entries(table, scope, Placeholder::Question, false);
        self.query_entries(&stmt)
    }

    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>> {
        let stmt = sql::select_entries(table, scope, window, Placeholder::Question);
        self.query_entries(&stmt)
    }

    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64> {
        let mut written = 0;
        for stmt in sql::write_positions(table, scope, plan, Placeholder::Question) {
            written += self.execute(&stmt)? as u64;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listrank_core::{Reposition, Shift};

    fn table() -> ListTable {
        ListTable {
            table: "cards".into(),
            primary_key: "id".into(),
            column: "position".into(),
        }
    }

    fn store_with_cards() -> SqliteListStore {
        let store = SqliteListStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE cards (id INTEGER PRIMARY KEY, board_id INTEGER, position INTEGER);
                 INSERT INTO cards (id, board_id, position) VALUES
                   (1, 7, 1), (2, 7, 2), (3, 7, 3), (4, 8, 1), (5, 7, NULL);",
            )
            .unwrap();
        store
    }

    fn board(id: i64) -> ScopeCondition {
        ScopeCondition::new(vec![("board_id".into(), Value::Int(id))])
    }

    fn assign(store: &mut SqliteListStore, writes: &[(i64, Option<i64>)]) -> u64 {
        let plan = Plan::assign(
            writes
                .iter()
                .map(|(id, position)| Reposition {
                    id: ItemId(*id),
                    position: *position,
                })
                .collect(),
        );
        store.write_positions(&table(), &board(7), &plan).unwrap()
    }

    fn stored(store: &SqliteListStore, id: i64) -> Option<i64> {
        store
            .connection()
            .query_row("SELECT position FROM cards WHERE id = ?1", [id], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn nested_begin_uses_savepoints() {
        let mut store = store_with_cards();
        store.begin().unwrap();
        assert!(!store.connection().is_autocommit());
        assign(&mut store, &[(1, Some(9))]);

        store.begin().unwrap();
        assert_eq!(store.depth(), 2);
        assign(&mut store, &[(1, None)]);
        store.rollback().unwrap();
        assert_eq!(stored(&store, 1), Some(9));

        store.commit().unwrap();
        assert!(store.connection().is_autocommit());
        assert_eq!(store.depth(), 0);
        assert_eq!(stored(&store, 1), Some(9));
        assert!(store.commit().is_err());
    }

    #[test]
    fn host_transaction_is_joined_with_a_savepoint() {
        let mut store = store_with_cards();
        store.connection().execute_batch("BEGIN").unwrap();
        store.begin().unwrap();
        assign(&mut store, &[(2, Some(5))]);
        store.commit().unwrap();
        assert!(!store.connection().is_autocommit());
        store.connection().execute_batch("ROLLBACK").unwrap();
        assert_eq!(stored(&store, 2), Some(2));
    }

    #[test]
    fn reads_skip_unlisted_rows_and_other_scopes() {
        let mut store = store_with_cards();
        store.begin().unwrap();
        let locked = store.lock_ordered_ids(&table(), &board(7)).unwrap();
        store.commit().unwrap();
        let ids: Vec<i64> = locked.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let last = store.entries(&table(), &board(7), Window::Last).unwrap();
        assert_eq!(last, vec![ListEntry { id: ItemId(3), position: 3 }]);
        assert!(store.entries(&table(), &board(99), Window::All).unwrap().is_empty());
        assert_eq!(stored(&store, 5), None);
    }

    #[test]
    fn one_statement_writes_every_row() {
        let mut store = store_with_cards();
        let written = assign(&mut store, &[(3, Some(1)), (1, Some(2)), (2, Some(3)), (77, Some(4))]);
        assert_eq!(written, 3);
        let ids: Vec<i64> = store
            .entries(&table(), &board(7), Window::All)
            .unwrap()
            .iter()
            .map(|e| e.id.0)
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn shift_leaves_other_scopes_and_unlisted_rows_alone() {
        let mut store = store_with_cards();
        let plan = Plan {
            writes: vec![Reposition {
                id: ItemId(3),
                position: Some(1),
            }],
            shift: Some(Shift {
                from: 1,
                to: 2,
                delta: 1,
                rows: 2,
            }),
            position: Some(1),
        };
        assert_eq!(store.write_positions(&table(), &board(7), &plan).unwrap(), 3);
        assert_eq!(
            [1, 2, 3, 4, 5].map(|id| stored(&store, id)),
            [Some(2), Some(3), Some(1), Some(1), None]
        );
    }

    #[test]
    fn driver_errors_are_classified() {
        let store = store_with_cards();
        let dup = store
            .connection()
            .execute("INSERT INTO cards (id) VALUES (1)", [])
            .unwrap_err();
        assert!(matches!(storage_error(dup), Error::Constraint(_)));

        let missing = store
            .connection()
            .execute("SELECT * FROM nowhere", [])
            .unwrap_err();
        assert!(matches!(storage_error(missing), Error::Storage(_)));
    }

    #[test]
    fn competing_writer_reports_contention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.db");
        let mut first = SqliteListStore::open(&path).unwrap();
        first
            .connection()
            .execute_batch("CREATE TABLE cards (id INTEGER PRIMARY KEY, board_id INTEGER, position INTEGER);")
            .unwrap();
        let mut second = SqliteListStore::open(&path)
            .unwrap()
            .with_busy_timeout(Duration::from_millis(10))
            .unwrap();

        first.begin().unwrap();
        first.lock_ordered_ids(&table(), &board(1)).unwrap();
        let err = second.begin().unwrap_err();
        assert!(err.is_retryable());
        first.commit().unwrap();

        second.begin().unwrap();
        assert!(second.lock_ordered_ids(&table(), &board(1)).unwrap().is_empty());
        second.commit().unwrap();
    }
}
