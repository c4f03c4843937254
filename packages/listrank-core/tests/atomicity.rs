mod common;

use common::{find, ids_in, positions_in, seeded};
use listrank_core::{
    transaction, Error, ItemId, ListEntry, ListStore, ListTable, MemoryListStore, Plan, Result,
    ScopeCondition, Window,
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Fault {
    None,
    Write,
    Commit,
    ShortWrite,
    Busy,
}

/// Delegates to a memory store and injects one kind of failure.
struct Faulty<'a> {
    inner: &'a mut MemoryListStore,
    fault: Fault,
}

impl ListStore for Faulty<'_> {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        if self.fault == Fault::Commit {
            return Err(Error::Storage("disk full".into()));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>> {
        if self.fault == Fault::Busy {
            return Err(Error::Contention(format!("{scope} is locked")));
        }
        self.inner.lock_ordered_ids(table, scope)
    }

    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>> {
        self.inner.entries(table, scope, window)
    }

    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64> {
        match self.fault {
            Fault::Write => Err(Error::Storage("connection reset".into())),
            Fault::ShortWrite => {
                let written = self.inner.write_positions(table, scope, plan)?;
                Ok(written.saturating_sub(1))
            }
            _ => self.inner.write_positions(table, scope, plan),
        }
    }
}

#[test]
fn failed_write_leaves_rows_and_item_untouched() {
    let (mut store, list) = seeded();
    let mut item = find(&mut store, ItemId(1));
    let mut faulty = Faulty {
        inner: &mut store,
        fault: Fault::Write,
    };
    let err = list.move_to_bottom(&mut faulty, &mut item).unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(item.pos, Some(1));
    assert_eq!(ids_in(&store, 5), vec![1, 2, 3, 4]);
    assert_eq!(store.depth(), 0);
}

#[test]
fn failed_commit_rolls_back() {
    let (mut store, list) = seeded();
    let mut item = find(&mut store, ItemId(2));
    let mut faulty = Faulty {
        inner: &mut store,
        fault: Fault::Commit,
    };
    assert!(list.remove_from_list(&mut faulty, &mut item).is_err());
    assert_eq!(item.pos, Some(2));
    assert_eq!(positions_in(&store, 5), vec![1, 2, 3, 4]);
    assert_eq!(store.depth(), 0);
}

#[test]
fn vanished_rows_abort_the_operation() {
    let (mut store, list) = seeded();
    let mut item = find(&mut store, ItemId(4));
    let mut faulty = Faulty {
        inner: &mut store,
        fault: Fault::ShortWrite,
    };
    let err = list.move_to_top(&mut faulty, &mut item).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(item.pos, Some(4));
    assert_eq!(ids_in(&store, 5), vec![1, 2, 3, 4]);
}

#[test]
fn contention_is_retryable_and_changes_nothing() {
    let (mut store, list) = seeded();
    let mut item = find(&mut store, ItemId(3));
    let mut faulty = Faulty {
        inner: &mut store,
        fault: Fault::Busy,
    };
    let err = list.insert_at(&mut faulty, &mut item, 1).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(item.pos, Some(3));

    faulty.fault = Fault::None;
    assert_eq!(list.insert_at(&mut faulty, &mut item, 1).unwrap(), 1);
    assert_eq!(ids_in(&store, 5), vec![3, 1, 2, 4]);
}

#[test]
fn operations_join_an_ambient_transaction() {
    let (mut store, list) = seeded();
    let mut item = find(&mut store, ItemId(1));

    let result: Result<()> = transaction(&mut store, |s| {
        list.move_to_bottom(s, &mut item)?;
        assert_eq!(ids_in(s, 5), vec![2, 3, 4, 1]);
        Err(Error::Constraint("host insert failed".into()))
    });
    assert!(result.is_err());
    assert_eq!(ids_in(&store, 5), vec![1, 2, 3, 4]);
    assert_eq!(store.depth(), 0);
}
