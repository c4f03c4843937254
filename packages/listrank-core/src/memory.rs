use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::ids::{ItemId, ListEntry, Value};
use crate::list::ListTable;
use crate::plan::Plan;
use crate::scope::ScopeCondition;
use crate::traits::{ListStore, Window};

pub type Row = BTreeMap<String, Value>;
type Tables = BTreeMap<String, BTreeMap<ItemId, Row>>;

/// In-memory table store for tests and prototyping.
///
/// Transactions snapshot every table on `begin` and restore it on `rollback`; nested
/// `begin` calls behave like savepoints. There is a single writer, so locks are no-ops.
#[derive(Clone, Debug, Default)]
pub struct MemoryListStore {
    tables: Tables,
    snapshots: Vec<Tables>,
    next_id: i64,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open transactions (including savepoints).
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Insert a row, assigning the next id when `id` is `None`.
    pub fn insert_row(&mut self, table: &str, id: Option<ItemId>, row: Row) -> Result<ItemId> {
        let id = match id {
            Some(id) => id,
            None => {
                let next = self.tables.get(table).and_then(|t| t.keys().next_back()).map(|k| k.0);
                ItemId(next.unwrap_or(0).max(self.next_id) + 1)
            }
        };
        self.next_id = self.next_id.max(id.0);
        let rows = self.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(Error::Constraint(format!("{table}: duplicate primary key {id}")));
        }
        rows.insert(id, row);
        Ok(id)
    }

    /// Overwrite the given columns of an existing row.
    pub fn update_row(&mut self, table: &str, id: ItemId, columns: Row) -> Result<()> {
        let row = self
            .tables
            .get_mut(table)
            .and_then(|t| t.get_mut(&id))
            .ok_or_else(|| Error::NotFound(format!("{table} row {id}")))?;
        row.extend(columns);
        Ok(())
    }

    pub fn delete_row(&mut self, table: &str, id: ItemId) -> Result<()> {
        self.tables
            .get_mut(table)
            .and_then(|t| t.remove(&id))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{table} row {id}")))
    }

    pub fn row(&self, table: &str, id: ItemId) -> Option<&Row> {
        self.tables.get(table).and_then(|t| t.get(&id))
    }

    pub fn rows(&self, table: &str) -> impl Iterator<Item = (ItemId, &Row)> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|t| t.iter().map(|(id, row)| (*id, row)))
    }

    fn members(&self, table: &ListTable, scope: &ScopeCondition) -> Vec<ListEntry> {
        let mut out: Vec<ListEntry> = self
            .rows(&table.table)
            .filter(|(_, row)| scope.matches(|column| row.get(column).cloned()))
            .filter_map(|(id, row)| match row.get(&table.column) {
                Some(Value::Int(position)) => Some(ListEntry {
                    id,
                    position: *position,
                }),
                _ => None,
            })
            .collect();
        out.sort_by_key(|e| (e.position, e.id));
        out
    }
}

impl ListStore for MemoryListStore {
    fn begin(&mut self) -> Result<()> {
        self.snapshots.push(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshots
            .pop()
            .map(|_| ())
            .ok_or_else(|| Error::Storage("commit without an open transaction".into()))
    }

    fn rollback(&mut self) -> Result<()> {
        let snapshot = self
            .snapshots
            .pop()
            .ok_or_else(|| Error::Storage("rollback without an open transaction".into()))?;
        self.tables = snapshot;
        Ok(())
    }

    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>> {
        Ok(self.members(table, scope))
    }

    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>> {
        let members = self.members(table, scope);
        let out = match window {
            Window::All => members,
            Window::First => members.into_iter().take(1).collect(),
            Window::Last => members.into_iter().last().into_iter().collect(),
            Window::Before(p) => members.into_iter().filter(|e| e.position < p).collect(),
            Window::After(p) => members.into_iter().filter(|e| e.position > p).collect(),
            Window::At(p) => members.into_iter().filter(|e| e.position == p).collect(),
        };
        Ok(out)
    }

    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64> {
        let Some(rows) = self.tables.get_mut(&table.table) else {
            return Ok(0);
        };
        let mut written = 0;
        for write in &plan.writes {
            if let Some(row) = rows.get_mut(&write.id) {
                let value = write.position.map(Value::Int).unwrap_or(Value::Null);
                row.insert(table.column.clone(), value);
                written += 1;
            }
        }
        if let Some(shift) = plan.shift {
            for (id, row) in rows.iter_mut() {
                if plan.writes.iter().any(|w| w.id == *id)
                    || !scope.matches(|column| row.get(column).cloned())
                {
                    continue;
                }
                if let Some(Value::Int(p)) = row.get_mut(&table.column) {
                    if (shift.from..=shift.to).contains(&*p) {
                        *p += shift.delta;
                        written += 1;
                    }
                }
            }
        }
        Ok(written)
    }
}
