use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::{ItemId, ListEntry, Position};
use crate::plan::{self, Plan};
use crate::scope::{unknown_attribute, Scope, ScopeCondition};
use crate::traits::{HasPosition, HasScopeKey, ListItem, ListStore, Window};
use crate::tx::transaction;

/// Table and column names a list lives in. Validated identifiers only.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListTable {
    pub table: String,
    pub primary_key: String,
    pub column: String,
}

/// Lifecycle points a host persistence layer must call the list manager from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hook {
    /// Before inserting a new row: append, or insert at the explicit position.
    BeforeCreate,
    /// Before deleting a row: close the gap it leaves.
    BeforeDestroy,
    /// Before updating a row: move it when a scope attribute changed.
    BeforeSave,
}

/// Dense position maintenance for one entity type.
///
/// Every mutation runs in one transaction that first locks the item's scope, re-reads the
/// ordered members, and writes all affected rows with a single statement. The in-memory
/// position of the item is only updated once that transaction committed.
#[derive(Clone, Debug)]
pub struct OrderedList {
    entity: String,
    table: ListTable,
    scope: Scope,
}

impl OrderedList {
    pub(crate) fn new(entity: String, table: ListTable, scope: Scope) -> Self {
        Self {
            entity,
            table,
            scope,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &ListTable {
        &self.table
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn position_column(&self) -> &str {
        &self.table.column
    }

    /// Condition selecting the list the item currently belongs to.
    pub fn scope_condition<T: HasScopeKey + ?Sized>(&self, item: &T) -> Result<ScopeCondition> {
        self.scope.condition_with(|attr| {
            item.scope_value(attr)
                .ok_or_else(|| unknown_attribute(&self.entity, attr))
        })
    }

    fn persisted_scope_condition<T: HasScopeKey + ?Sized>(&self, item: &T) -> Result<ScopeCondition> {
        self.scope.condition_with(|attr| {
            item.persisted_scope_value(attr)
                .ok_or_else(|| unknown_attribute(&self.entity, attr))
        })
    }

    // ---- queries (no lock) ----

    pub fn in_list<T: HasPosition + ?Sized>(&self, item: &T) -> bool {
        item.id().is_some() && item.position().is_some()
    }

    pub fn current_position<T: HasPosition + ?Sized>(&self, item: &T) -> Position {
        item.position().unwrap_or(0)
    }

    pub fn is_first<T: HasPosition + ?Sized>(&self, item: &T) -> bool {
        self.in_list(item) && self.current_position(item) == 1
    }

    pub fn is_last<S, T>(&self, store: &mut S, item: &T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        if !self.in_list(item) {
            return Ok(false);
        }
        Ok(self.current_position(item) == self.last_position(store, item)?)
    }

    pub fn first_item<S, T>(&self, store: &mut S, item: &T) -> Result<Option<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: HasScopeKey + ?Sized,
    {
        self.read_one(store, item, Window::First)
    }

    pub fn last_item<S, T>(&self, store: &mut S, item: &T) -> Result<Option<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: HasScopeKey + ?Sized,
    {
        self.read_one(store, item, Window::Last)
    }

    /// Highest position in the item's list, 0 when the list is empty.
    pub fn last_position<S, T>(&self, store: &mut S, item: &T) -> Result<Position>
    where
        S: ListStore + ?Sized,
        T: HasScopeKey + ?Sized,
    {
        Ok(self.last_item(store, item)?.map(|e| e.position).unwrap_or(0))
    }

    pub fn item_at_offset<S, T>(
        &self,
        store: &mut S,
        item: &T,
        offset: i64,
    ) -> Result<Option<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        if !self.in_list(item) {
            return Ok(None);
        }
        match self.current_position(item).checked_add(offset) {
            Some(at) => self.read_one(store, item, Window::At(at)),
            None => Ok(None),
        }
    }

    pub fn higher_item<S, T>(&self, store: &mut S, item: &T) -> Result<Option<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        self.item_at_offset(store, item, -1)
    }

    pub fn lower_item<S, T>(&self, store: &mut S, item: &T) -> Result<Option<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        self.item_at_offset(store, item, 1)
    }

    /// Members ranked above the item, top first.
    pub fn higher_items<S, T>(&self, store: &mut S, item: &T) -> Result<Vec<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        if !self.in_list(item) {
            return Ok(Vec::new());
        }
        let scope = self.scope_condition(item)?;
        store.entries(&self.table, &scope, Window::Before(self.current_position(item)))
    }

    /// Members ranked below the item, top first.
    pub fn lower_items<S, T>(&self, store: &mut S, item: &T) -> Result<Vec<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        if !self.in_list(item) {
            return Ok(Vec::new());
        }
        let scope = self.scope_condition(item)?;
        store.entries(&self.table, &scope, Window::After(self.current_position(item)))
    }

    /// All members of the item's list, top first.
    pub fn list_scope<S, T>(&self, store: &mut S, item: &T) -> Result<Vec<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: HasScopeKey + ?Sized,
    {
        let scope = self.scope_condition(item)?;
        store.entries(&self.table, &scope, Window::All)
    }

    fn read_one<S, T>(&self, store: &mut S, item: &T, window: Window) -> Result<Option<ListEntry>>
    where
        S: ListStore + ?Sized,
        T: HasScopeKey + ?Sized,
    {
        let scope = self.scope_condition(item)?;
        Ok(store.entries(&self.table, &scope, window)?.into_iter().next())
    }

    /// Whether saving the item would move it to another list.
    pub fn will_leave_list<T: ListItem + ?Sized>(&self, item: &T) -> Result<bool> {
        if !self.in_list(item) {
            return Ok(false);
        }
        for attr in self.scope.key_attributes() {
            let current = item
                .scope_value(attr)
                .ok_or_else(|| unknown_attribute(&self.entity, attr))?;
            let persisted = item
                .persisted_scope_value(attr)
                .ok_or_else(|| unknown_attribute(&self.entity, attr))?;
            if current != persisted {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ---- mutations ----

    /// Put the item at the bottom of its list, taking it out of its current rank first.
    /// `false` for an item that has not been inserted yet; `before_create` places those.
    pub fn append<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let Some(id) = item.id() else {
            return Ok(false);
        };
        let position = self.place(store, item, Some(id), i64::MAX, "append")?;
        item.set_position(Some(position));
        Ok(true)
    }

    /// Move the item to `target`, clamped to the list bounds. Returns the final position.
    ///
    /// The item must already be stored; `Error::NotFound` otherwise.
    pub fn insert_at<S, T>(&self, store: &mut S, item: &mut T, target: i64) -> Result<Position>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let id = item
            .id()
            .ok_or_else(|| Error::NotFound(format!("insert_at on unsaved {}", self.entity)))?;
        let position = self.place(store, item, Some(id), target, "insert_at")?;
        item.set_position(Some(position));
        Ok(position)
    }

    pub fn move_higher<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        self.move_member(store, item, "move_higher", |_, rank| {
            (rank > 0).then_some(rank as i64)
        })
    }

    pub fn move_lower<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        self.move_member(store, item, "move_lower", |len, rank| {
            (rank + 1 < len).then_some(rank as i64 + 2)
        })
    }

    pub fn move_to_top<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        self.move_member(store, item, "move_to_top", |_, rank| (rank > 0).then_some(1))
    }

    pub fn move_to_bottom<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        self.move_member(store, item, "move_to_bottom", |len, rank| {
            (rank + 1 < len).then_some(len as i64)
        })
    }

    /// Take the item out of its list. `false` when it was not a member.
    pub fn remove_from_list<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let Some(id) = item.id() else {
            return Ok(false);
        };
        let scope = self.scope_condition(item)?;
        let removed = transaction(store, |s| {
            let entries = s.lock_ordered_ids(&self.table, &scope)?;
            if plan::rank_of(&entries, id).is_none() {
                return Ok(false);
            }
            let plan = plan::remove(&entries, id);
            self.apply(s, "remove_from_list", &scope, Some(id), &plan)?;
            Ok(true)
        })?;
        if removed {
            item.set_position(None);
        }
        Ok(removed)
    }

    /// Close the gap below the item without touching its own row (used right before the row
    /// is deleted).
    pub fn decrement_lower_items<S, T>(&self, store: &mut S, item: &T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let Some(id) = item.id() else {
            return Ok(false);
        };
        let scope = self.persisted_scope_condition(item)?;
        transaction(store, |s| {
            let entries = s.lock_ordered_ids(&self.table, &scope)?;
            if plan::rank_of(&entries, id).is_none() {
                return Ok(false);
            }
            let plan = plan::close_gap(&entries, id);
            self.apply(s, "decrement_lower_items", &scope, Some(id), &plan)?;
            Ok(true)
        })
    }

    /// Move the item from the list of its persisted scope key to the bottom of the list of
    /// its current one. `false` when the key did not change or the item was not a member.
    pub fn handle_rescope<S, T>(&self, store: &mut S, item: &mut T) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let Some(id) = item.id() else {
            return Ok(false);
        };
        let old = self.persisted_scope_condition(item)?;
        let new = self.scope_condition(item)?;
        if old == new {
            return Ok(false);
        }

        let position = transaction(store, |s| {
            // Fixed lock order keeps crossing re-scopes from deadlocking each other.
            let (old_entries, new_entries) = if old <= new {
                let o = s.lock_ordered_ids(&self.table, &old)?;
                (o, s.lock_ordered_ids(&self.table, &new)?)
            } else {
                let n = s.lock_ordered_ids(&self.table, &new)?;
                (s.lock_ordered_ids(&self.table, &old)?, n)
            };
            if plan::rank_of(&old_entries, id).is_none() {
                return Ok(None);
            }

            let leave = plan::close_gap(&old_entries, id);
            self.apply(s, "handle_rescope", &old, Some(id), &leave)?;
            let join = plan::append(&new_entries, Some(id));
            self.apply(s, "handle_rescope", &new, Some(id), &join)?;
            Ok(join.position)
        })?;

        match position {
            Some(p) => {
                item.set_position(Some(p));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ---- lifecycle hooks ----

    /// Before-create: append, or open a slot at the explicitly requested position.
    ///
    /// The row does not exist yet, so only the other members are written; the item's new
    /// position is set in memory for the host's insert. Call it inside the host's insert
    /// transaction so the scope lock is held until the row is visible.
    pub fn before_create<S, T>(&self, store: &mut S, item: &mut T) -> Result<()>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let target = item.position().unwrap_or(i64::MAX);
        let position = self.place(store, item, None, target, "before_create")?;
        item.set_position(Some(position));
        Ok(())
    }

    pub fn before_destroy<S, T>(&self, store: &mut S, item: &T) -> Result<()>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        if self.in_list(item) {
            self.decrement_lower_items(store, item)?;
        }
        Ok(())
    }

    pub fn before_save<S, T>(&self, store: &mut S, item: &mut T) -> Result<()>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        if self.will_leave_list(item)? {
            self.handle_rescope(store, item)?;
        }
        Ok(())
    }

    pub fn run_hook<S, T>(&self, hook: Hook, store: &mut S, item: &mut T) -> Result<()>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        match hook {
            Hook::BeforeCreate => self.before_create(store, item),
            Hook::BeforeDestroy => self.before_destroy(store, item),
            Hook::BeforeSave => self.before_save(store, item),
        }
    }

    // ---- internals ----

    fn place<S, T>(
        &self,
        store: &mut S,
        item: &T,
        subject: Option<ItemId>,
        target: i64,
        op: &'static str,
    ) -> Result<Position>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let scope = self.scope_condition(item)?;
        let plan = transaction(store, |s| {
            let entries = s.lock_ordered_ids(&self.table, &scope)?;
            let plan = plan::insert_at(&entries, subject, target);
            self.apply(s, op, &scope, subject, &plan)?;
            Ok(plan)
        })?;
        plan.position
            .ok_or_else(|| Error::Storage(format!("{op}: planner produced no position")))
    }

    fn move_member<S, T>(
        &self,
        store: &mut S,
        item: &mut T,
        op: &'static str,
        target: impl Fn(usize, usize) -> Option<i64>,
    ) -> Result<bool>
    where
        S: ListStore + ?Sized,
        T: ListItem + ?Sized,
    {
        let Some(id) = item.id() else {
            return Ok(false);
        };
        let scope = self.scope_condition(item)?;
        let outcome = transaction(store, |s| {
            let entries = s.lock_ordered_ids(&self.table, &scope)?;
            let Some(rank) = plan::rank_of(&entries, id) else {
                return Ok(None);
            };
            match target(entries.len(), rank) {
                None => Ok(Some(entries[rank].position)),
                Some(to) => {
                    let plan = plan::insert_at(&entries, Some(id), to);
                    self.apply(s, op, &scope, Some(id), &plan)?;
                    Ok(plan.position)
                }
            }
        })?;
        match outcome {
            Some(position) => {
                item.set_position(Some(position));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn apply<S: ListStore + ?Sized>(
        &self,
        store: &mut S,
        op: &'static str,
        scope: &ScopeCondition,
        subject: Option<ItemId>,
        plan: &Plan,
    ) -> Result<()> {
        if plan.is_noop() {
            debug!(entity = %self.entity, op, item = ?subject, scope = %scope, position = ?plan.position, "list unchanged");
            return Ok(());
        }
        let written = store.write_positions(&self.table, scope, plan)?;
        if written != plan.rows() {
            return Err(Error::NotFound(format!(
                "{op} on {}: expected to update {} rows, updated {written}",
                self.entity,
                plan.rows()
            )));
        }
        debug!(entity = %self.entity, op, item = ?subject, scope = %scope, position = ?plan.position, rows = written, "list updated");
        Ok(())
    }
}
