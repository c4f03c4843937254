use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use postgres::{Client, NoTls};
use uuid::Uuid;

use listrank_core::{Error, ItemId, ListStore, Result, ScopeCondition, Value};
use listrank_postgres::{PgListStore, PgStoreOptions};
use listrank_test_support::{
    conformance_suite, create, init_tracing, mixin_list, positions, Mixin, MixinScope, MixinTable,
};

fn connect() -> Option<Client> {
    let url = std::env::var("LISTRANK_POSTGRES_URL").ok()?;
    Client::connect(&url, NoTls).ok()
}

fn sql_error(e: postgres::Error) -> Error {
    Error::Storage(format!("{e:?}"))
}

/// A uniquely named `mixins` table per test.
#[derive(Clone)]
struct PgMixins {
    name: String,
}

impl PgMixins {
    fn setup() -> Option<(PgListStore, PgMixins)> {
        let mut client = connect()?;
        let table = PgMixins {
            name: format!("mixins_{}", Uuid::new_v4().simple()),
        };
        client
            .batch_execute(&format!(
                "CREATE TABLE {} (
                    id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                    type TEXT,
                    pos BIGINT,
                    parent_id BIGINT,
                    parent_type TEXT
                )",
                table.name
            ))
            .unwrap();
        Some((PgListStore::new(Rc::new(RefCell::new(client))), table))
    }

    fn open(&self) -> PgListStore {
        let client = connect().expect("postgres reachable");
        PgListStore::new(Rc::new(RefCell::new(client)))
    }
}

impl MixinTable for PgMixins {
    type Store = PgListStore;

    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, store: &mut PgListStore, mixin: &Mixin) -> Result<ItemId> {
        let row = store
            .client()
            .borrow_mut()
            .query_one(
                &format!(
                    "INSERT INTO {} (pos, parent_id, parent_type) VALUES ($1, $2, $3) RETURNING id",
                    self.name
                ),
                &[&mixin.pos, &mixin.parent_id, &mixin.parent_type],
            )
            .map_err(sql_error)?;
        Ok(ItemId(row.get(0)))
    }

    fn update(&self, store: &mut PgListStore, mixin: &Mixin) -> Result<()> {
        let id = mixin.id.ok_or_else(|| Error::NotFound("unsaved mixin".into()))?;
        store
            .client()
            .borrow_mut()
            .execute(
                &format!(
                    "UPDATE {} SET pos = $2, parent_id = $3, parent_type = $4 WHERE id = $1",
                    self.name
                ),
                &[&id.0, &mixin.pos, &mixin.parent_id, &mixin.parent_type],
            )
            .map_err(sql_error)?;
        Ok(())
    }

    fn delete(&self, store: &mut PgListStore, id: ItemId) -> Result<()> {
        store
            .client()
            .borrow_mut()
            .execute(&format!("DELETE FROM {} WHERE id = $1", self.name), &[&id.0])
            .map_err(sql_error)?;
        Ok(())
    }

    fn all(&self, store: &mut PgListStore) -> Result<Vec<Mixin>> {
        let rows = store
            .client()
            .borrow_mut()
            .query(
                &format!("SELECT id, pos, parent_id, parent_type FROM {}", self.name),
                &[],
            )
            .map_err(sql_error)?;
        Ok(rows
            .iter()
            .map(|row| Mixin::loaded(ItemId(row.get(0)), row.get(1), row.get(2), row.get(3)))
            .collect())
    }
}

conformance_suite!(PgMixins::setup);

#[test]
fn postgres_scope_index_is_idempotent() {
    let Some((store, table)) = PgMixins::setup() else {
        return;
    };
    let list = mixin_list(&table.name, MixinScope::ParentAndType).unwrap();
    store.ensure_scope_index(&list).unwrap();
    store.ensure_scope_index(&list).unwrap();

    let count: i64 = store
        .client()
        .borrow_mut()
        .query_one(
            "SELECT COUNT(*) FROM pg_indexes WHERE tablename = $1 AND indexname = $2",
            &[&table.name, &format!("idx_{}_pos_scope", table.name)],
        )
        .unwrap()
        .get(0);
    assert_eq!(count, 1);
}

#[test]
fn postgres_scope_lock_requires_a_transaction() {
    let Some((mut store, table)) = PgMixins::setup() else {
        return;
    };
    let list = mixin_list(&table.name, MixinScope::Parent).unwrap();
    let scope = ScopeCondition::new(vec![("parent_id".into(), Value::Int(1))]);
    assert!(matches!(
        store.lock_ordered_ids(list.table(), &scope),
        Err(Error::Storage(_))
    ));
}

#[test]
fn postgres_held_scope_lock_times_out_as_contention() {
    init_tracing();
    let Some((mut holder, table)) = PgMixins::setup() else {
        return;
    };
    let list = mixin_list(&table.name, MixinScope::Parent).unwrap();
    let scope = ScopeCondition::new(vec![("parent_id".into(), Value::Int(1))]);

    let mut waiter = PgListStore::with_options(
        table.open().client().clone(),
        PgStoreOptions {
            lock_timeout: Duration::from_millis(100),
        },
    );

    holder.begin().unwrap();
    holder.lock_ordered_ids(list.table(), &scope).unwrap();

    waiter.begin().unwrap();
    let err = waiter.lock_ordered_ids(list.table(), &scope).unwrap_err();
    assert!(err.is_retryable(), "{err}");
    waiter.rollback().unwrap();

    // Other scopes stay available.
    let other = ScopeCondition::new(vec![("parent_id".into(), Value::Int(2))]);
    waiter.begin().unwrap();
    waiter.lock_ordered_ids(list.table(), &other).unwrap();
    waiter.commit().unwrap();

    holder.commit().unwrap();
    assert_eq!(holder.depth(), 0);
}

#[test]
fn postgres_concurrent_appends_to_an_empty_scope_stay_dense() {
    init_tracing();
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 10;

    let Some((mut store, table)) = PgMixins::setup() else {
        return;
    };

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let table = table.clone();
            thread::spawn(move || {
                let mut store = table.open();
                let list = mixin_list(&table.name, MixinScope::Parent).unwrap();
                for _ in 0..PER_WRITER {
                    loop {
                        match create(&mut store, &table, &list, Mixin::in_parent(1)) {
                            Ok(_) => break,
                            Err(e) if e.is_retryable() => thread::yield_now(),
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<i64> = (1..=(WRITERS * PER_WRITER) as i64).collect();
    assert_eq!(positions(&mut store, &table, Some(1)).unwrap(), expected);
}
