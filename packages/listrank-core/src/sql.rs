//! SQL text shared by the relational backends.
//!
//! Identifiers come from a resolved `ListTable` (plain identifiers only) and are quoted.
//! Values are always bound as parameters and wrapped in `CAST(.. AS ..)` so both SQLite and
//! Postgres infer the same parameter types.

use crate::ids::{Reposition, Value};
use crate::list::{ListTable, OrderedList};
use crate::plan::{Plan, Shift};
use crate::scope::{Scope, ScopeCondition};
use crate::traits::Window;

/// Placeholder syntax of the target engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placeholder {
    /// `?1`, `?2`, ... (SQLite)
    Question,
    /// `$1`, `$2`, ... (Postgres)
    Dollar,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

struct Builder {
    style: Placeholder,
    params: Vec<Value>,
}

impl Builder {
    fn new(style: Placeholder) -> Self {
        Self {
            style,
            params: Vec::new(),
        }
    }

    fn placeholder(&self, index: usize) -> String {
        match self.style {
            Placeholder::Question => format!("?{index}"),
            Placeholder::Dollar => format!("${index}"),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let sql_type = match &value {
            Value::Null => return "NULL".to_string(),
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "BIGINT",
            Value::Text(_) => "TEXT",
        };
        self.params.push(value);
        format!("CAST({} AS {sql_type})", self.placeholder(self.params.len()))
    }

    fn bind_int(&mut self, v: i64) -> String {
        self.bind(Value::Int(v))
    }

    fn scope_clause(&mut self, scope: &ScopeCondition) -> String {
        let mut parts = Vec::with_capacity(scope.terms().len());
        for (column, value) in scope.terms() {
            if value.is_null() {
                parts.push(format!("{} IS NULL", quote_ident(column)));
            } else {
                let p = self.bind(value.clone());
                parts.push(format!("{} = {p}", quote_ident(column)));
            }
        }
        if parts.is_empty() {
            "1 = 1".to_string()
        } else {
            parts.join(" AND ")
        }
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            params: self.params,
        }
    }
}

/// Ordered `(id, position)` rows of a scope, restricted to `window`.
pub fn select_entries(
    table: &ListTable,
    scope: &ScopeCondition,
    window: Window,
    style: Placeholder,
) -> SqlStatement {
    let mut b = Builder::new(style);
    let pk = quote_ident(&table.primary_key);
    let col = quote_ident(&table.column);
    let where_scope = b.scope_clause(scope);

    let mut sql = format!(
        "SELECT {pk}, {col} FROM {} WHERE {where_scope} AND {col} IS NOT NULL",
        quote_ident(&table.table)
    );
    let (order, limit) = match window {
        Window::All => ("ASC", false),
        Window::First => ("ASC", true),
        Window::Last => ("DESC", true),
        Window::Before(p) => {
            sql.push_str(&format!(" AND {col} < {}", b.bind_int(p)));
            ("ASC", false)
        }
        Window::After(p) => {
            sql.push_str(&format!(" AND {col} > {}", b.bind_int(p)));
            ("ASC", false)
        }
        Window::At(p) => {
            sql.push_str(&format!(" AND {col} = {}", b.bind_int(p)));
            ("ASC", true)
        }
    };
    sql.push_str(&format!(" ORDER BY {col} {order}, {pk} {order}"));
    if limit {
        sql.push_str(" LIMIT 1");
    }
    b.finish(sql)
}

/// All members of a scope in order, optionally with a trailing `FOR UPDATE`.
pub fn lock_entries(
    table: &ListTable,
    scope: &ScopeCondition,
    style: Placeholder,
    for_update: bool,
) -> SqlStatement {
    let mut stmt = select_entries(table, scope, Window::All, style);
    if for_update {
        stmt.sql.push_str(" FOR UPDATE");
    }
    stmt
}

/// Explicit assignments per statement, well below the bound-parameter limits of both
/// engines.
pub const WRITE_CHUNK: usize = 400;

/// Statements applying `plan`, to be executed in order inside one transaction.
///
/// A plan with a shift becomes one `UPDATE` whose parameter count does not depend on how
/// many rows move: the subject row through a `CASE` arm, everything else through
/// `col + delta` on the scoped range. Plans without a shift are explicit assignments,
/// `WRITE_CHUNK` rows per statement.
pub fn write_positions(
    table: &ListTable,
    scope: &ScopeCondition,
    plan: &Plan,
    style: Placeholder,
) -> Vec<SqlStatement> {
    match plan.shift {
        Some(shift) => vec![shift_update(table, scope, &plan.writes, shift, style)],
        None => plan
            .writes
            .chunks(WRITE_CHUNK)
            .map(|chunk| assign_update(table, chunk, style))
            .collect(),
    }
}

fn case_arms(b: &mut Builder, writes: &[Reposition]) -> (String, Vec<String>) {
    let mut arms = String::new();
    let mut ids = Vec::with_capacity(writes.len());
    for write in writes {
        let id = b.bind_int(write.id.0);
        let position = match write.position {
            Some(p) => b.bind_int(p),
            None => "CAST(NULL AS BIGINT)".to_string(),
        };
        arms.push_str(&format!(" WHEN {id} THEN {position}"));
        ids.push(id);
    }
    (arms, ids)
}

fn assign_update(table: &ListTable, writes: &[Reposition], style: Placeholder) -> SqlStatement {
    let mut b = Builder::new(style);
    let pk = quote_ident(&table.primary_key);
    let (arms, ids) = case_arms(&mut b, writes);
    let sql = format!(
        "UPDATE {} SET {} = CASE {pk}{arms} END WHERE {pk} IN ({})",
        quote_ident(&table.table),
        quote_ident(&table.column),
        ids.join(", ")
    );
    b.finish(sql)
}

fn shift_update(
    table: &ListTable,
    scope: &ScopeCondition,
    writes: &[Reposition],
    shift: Shift,
    style: Placeholder,
) -> SqlStatement {
    let mut b = Builder::new(style);
    let pk = quote_ident(&table.primary_key);
    let col = quote_ident(&table.column);
    let (arms, ids) = case_arms(&mut b, writes);
    let delta = b.bind_int(shift.delta);
    let where_scope = b.scope_clause(scope);
    let from = b.bind_int(shift.from);
    let to = b.bind_int(shift.to);
    let range = format!("({where_scope} AND {col} BETWEEN {from} AND {to})");

    let sql = if ids.is_empty() {
        format!(
            "UPDATE {} SET {col} = {col} + {delta} WHERE {range}",
            quote_ident(&table.table)
        )
    } else {
        format!(
            "UPDATE {} SET {col} = CASE {pk}{arms} ELSE {col} + {delta} END \
             WHERE {pk} IN ({}) OR {range}",
            quote_ident(&table.table),
            ids.join(", ")
        )
    };
    b.finish(sql)
}

/// `CREATE INDEX IF NOT EXISTS` over the scope columns followed by the position column.
pub fn scope_index(list: &OrderedList) -> String {
    let table = list.table();
    let mut columns: Vec<&str> = match list.scope() {
        Scope::Attributes(attrs) => attrs.iter().map(String::as_str).collect(),
        Scope::Predicate(template) => template.clauses().iter().map(|c| c.column.as_str()).collect(),
    };
    columns.push(&table.column);
    let name = format!("idx_{}_{}_scope", table.table, table.column);
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(&name),
        quote_ident(&table.table),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
    )
}
