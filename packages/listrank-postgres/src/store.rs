use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, Row, Statement};
use tracing::trace;

use listrank_core::sql::{self, Placeholder, SqlStatement};
use listrank_core::{
    Error, ItemId, ListEntry, ListStore, ListTable, OrderedList, Plan, Position, Result,
    ScopeCondition, Value, Window,
};

use crate::lock_key::scope_lock_key;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Classify a driver error by SQLSTATE: lock waits and deadlocks are contention, class 23
/// is a constraint violation.
fn storage_error(e: postgres::Error) -> Error {
    match e.code() {
        Some(code)
            if *code == SqlState::LOCK_NOT_AVAILABLE
                || *code == SqlState::T_R_DEADLOCK_DETECTED
                || *code == SqlState::T_R_SERIALIZATION_FAILURE =>
        {
            Error::Contention(e.to_string())
        }
        Some(code) if code.code().starts_with("23") => Error::Constraint(e.to_string()),
        _ => Error::Storage(format!("{e:?}")),
    }
}

fn to_sql(value: &Value) -> Box<dyn ToSql + Sync> {
    match value {
        Value::Null => Box::new(Option::<i64>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => Box::new(*i),
        Value::Text(s) => Box::new(s.clone()),
    }
}

fn entry(row: &Row) -> Result<ListEntry> {
    let id: i64 = row.try_get(0).map_err(storage_error)?;
    let position: Position = row.try_get(1).map_err(storage_error)?;
    Ok(ListEntry {
        id: ItemId(id),
        position,
    })
}

#[derive(Clone, Debug)]
pub struct PgStoreOptions {
    /// `lock_timeout` applied to every transaction the store opens. A scope lock that is not
    /// granted in time fails with `Error::Contention`.
    pub lock_timeout: Duration,
}

impl Default for PgStoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// `ListStore` over a shared Postgres client.
///
/// The client is shared with the host so its own inserts and updates run in the same
/// transaction. Hosts must open transactions through `begin` on this store: the driver does
/// not report whether a transaction is already open, so the store tracks nesting itself and
/// uses savepoints below the outermost level.
pub struct PgListStore {
    client: Rc<RefCell<Client>>,
    options: PgStoreOptions,
    depth: usize,
    statements: HashMap<String, Statement>,
}

impl PgListStore {
    pub fn new(client: Rc<RefCell<Client>>) -> Self {
        Self::with_options(client, PgStoreOptions::default())
    }

    pub fn with_options(client: Rc<RefCell<Client>>, options: PgStoreOptions) -> Self {
        Self {
            client,
            options,
            depth: 0,
            statements: HashMap::new(),
        }
    }

    pub fn client(&self) -> &Rc<RefCell<Client>> {
        &self.client
    }

    pub fn options(&self) -> &PgStoreOptions {
        &self.options
    }

    /// Open transactions and savepoints started through this store.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn ensure_scope_index(&self, list: &OrderedList) -> Result<()> {
        crate::schema::ensure_scope_index(&mut self.client.borrow_mut(), list)
    }

    fn batch(&self, sql: &str) -> Result<()> {
        trace!(sql, "postgres batch");
        self.client
            .borrow_mut()
            .batch_execute(sql)
            .map_err(storage_error)
    }

    fn statement(&mut self, sql: &str) -> Result<Statement> {
        if let Some(stmt) = self.statements.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = self
            .client
            .borrow_mut()
            .prepare(sql)
            .map_err(storage_error)?;
        self.statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }

    fn execute(&mut self, stmt: &SqlStatement) -> Result<u64> {
        trace!(sql = %stmt.sql, params = ?stmt.params, "postgres execute");
        let prepared = self.statement(&stmt.sql)?;
        let params: Vec<Box<dyn ToSql + Sync>> = stmt.params.iter().map(to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        self.client
            .borrow_mut()
            .execute(&prepared, &refs)
            .map_err(storage_error)
    }

    fn query(&mut self, stmt: &SqlStatement) -> Result<Vec<Row>> {
        trace!(sql = %stmt.sql, params = ?stmt.params, "postgres query");
        let prepared = self.statement(&stmt.sql)?;
        let params: Vec<Box<dyn ToSql + Sync>> = stmt.params.iter().map(to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        self.client
            .borrow_mut()
            .query(&prepared, &refs)
            .map_err(storage_error)
    }

    fn savepoint_name(depth: usize) -> String {
        format!("listrank_sp_{depth}")
    }
}

impl ListStore for PgListStore {
    fn begin(&mut self) -> Result<()> {
        if self.depth == 0 {
            let ms = self.options.lock_timeout.as_millis();
            self.batch(&format!("BEGIN; SET LOCAL lock_timeout = '{ms}ms'"))?;
        } else {
            self.batch(&format!("SAVEPOINT {}", Self::savepoint_name(self.depth)))?;
        }
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.depth {
            0 => Err(Error::Storage("commit without an open transaction".into())),
            1 => {
                // On failure the depth stays; the following ROLLBACK is a no-op on the server.
                self.batch("COMMIT")?;
                self.depth = 0;
                Ok(())
            }
            depth => {
                self.batch(&format!("RELEASE SAVEPOINT {}", Self::savepoint_name(depth - 1)))?;
                self.depth -= 1;
                Ok(())
            }
        }
    }

    fn rollback(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::Storage("rollback without an open transaction".into()));
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.batch("ROLLBACK")
        } else {
            let name = Self::savepoint_name(self.depth);
            self.batch(&format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"))
        }
    }

    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>> {
        if self.depth == 0 {
            return Err(Error::Storage(
                "scope lock requested outside a transaction".into(),
            ));
        }
        // Row locks alone cannot cover an empty scope; the advisory lock serializes inserts
        // into it as well.
        let key = scope_lock_key(table, scope);
        trace!(key, scope = %scope, "postgres scope lock");
        self.execute(&SqlStatement {
            sql: "SELECT pg_advisory_xact_lock(CAST($1 AS BIGINT))".into(),
            params: vec![Value::Int(key)],
        })?;
        let stmt = sql::lock_entries(table, scope, Placeholder::Dollar, true);
        self.query(&stmt)?.iter().map(entry).collect()
    }

    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>> {
        let stmt = sql::select_entries(table, scope, window, Placeholder::Dollar);
        self.query(&stmt)?.iter().map(entry).collect()
    }

    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64> {
        let mut written = 0;
        for stmt in sql::write_positions(table, scope, plan, Placeholder::Dollar) {
            written += self.execute(&stmt)?;
        }
        Ok(written)
    }
}
