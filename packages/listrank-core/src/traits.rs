use crate::error::Result;
use crate::ids::{ItemId, ListEntry, Position, Value};
use crate::list::ListTable;
use crate::plan::Plan;
use crate::scope::ScopeCondition;

/// Which members of a scope an unlocked read returns. Results are ordered by position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Window {
    All,
    First,
    Last,
    /// Members with a position strictly lower than the bound ("higher" in the list).
    Before(Position),
    /// Members with a position strictly greater than the bound.
    After(Position),
    At(Position),
}

/// Transactional row store the list manager is layered on.
///
/// `begin` may be called while a transaction is already open; implementations must then
/// open a savepoint so the inner `rollback` only undoes the inner work.
pub trait ListStore {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Ordered members of the scope, locked against concurrent mutation of the same scope
    /// until the enclosing transaction ends. Must also serialize writers on an empty scope.
    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>>;

    /// Unlocked, read-committed view of the scope.
    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>>;

    /// Apply a plan inside the open transaction: the explicit assignments by primary key,
    /// and the plan's shift to members of `scope` whose position lies in its range. Explicit
    /// rows take precedence over the shift. Returns rows written.
    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64>;
}

impl<S: ListStore + ?Sized> ListStore for &mut S {
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }

    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>> {
        (**self).lock_ordered_ids(table, scope)
    }

    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>> {
        (**self).entries(table, scope, window)
    }

    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64> {
        (**self).write_positions(table, scope, plan)
    }
}

/// Identity and position of a host entity.
pub trait HasPosition {
    /// `None` until the row has been inserted.
    fn id(&self) -> Option<ItemId>;
    fn position(&self) -> Option<Position>;
    fn set_position(&mut self, position: Option<Position>);
}

/// Scope-key attribute access for a host entity.
pub trait HasScopeKey {
    /// Current (possibly unsaved) value of `attribute`; `None` if the entity has no such
    /// attribute.
    fn scope_value(&self, attribute: &str) -> Option<Value>;

    /// Value as last persisted. Entities without dirty tracking return the current value.
    fn persisted_scope_value(&self, attribute: &str) -> Option<Value> {
        self.scope_value(attribute)
    }
}

pub trait ListItem: HasPosition + HasScopeKey {}

impl<T: HasPosition + HasScopeKey + ?Sized> ListItem for T {}
