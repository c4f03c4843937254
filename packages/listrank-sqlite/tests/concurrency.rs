mod common;

use std::thread;

use common::SqliteMixins;
use listrank_core::{ItemId, Result};
use listrank_test_support::{create, find, init_tracing, mixin_list, order, positions, Mixin, MixinScope};

const WRITERS: usize = 4;
const PER_WRITER: usize = 15;

fn retrying<T>(mut op: impl FnMut() -> Result<T>) -> T {
    loop {
        match op() {
            Ok(value) => return value,
            Err(e) if e.is_retryable() => thread::yield_now(),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

#[test]
fn concurrent_appends_to_an_empty_scope_stay_dense() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixins.db");
    drop(SqliteMixins::open(&path));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let mut store = SqliteMixins::open(&path);
                let list = mixin_list("mixins", MixinScope::Parent).unwrap();
                for _ in 0..PER_WRITER {
                    retrying(|| create(&mut store, &SqliteMixins, &list, Mixin::in_parent(1)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut store = SqliteMixins::open(&path);
    let expected: Vec<i64> = (1..=(WRITERS * PER_WRITER) as i64).collect();
    assert_eq!(positions(&mut store, &SqliteMixins, Some(1)).unwrap(), expected);
}

#[test]
fn concurrent_moves_and_inserts_keep_positions_unique() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixins.db");
    let list = mixin_list("mixins", MixinScope::Parent).unwrap();

    let ids: Vec<ItemId> = {
        let mut store = SqliteMixins::open(&path);
        (0..10)
            .map(|_| {
                create(&mut store, &SqliteMixins, &list, Mixin::in_parent(3))
                    .unwrap()
                    .id
                    .unwrap()
            })
            .collect()
    };

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let path = path.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                let mut store = SqliteMixins::open(&path);
                let list = mixin_list("mixins", MixinScope::Parent).unwrap();
                for round in 0..PER_WRITER {
                    let id = ids[(w * 7 + round * 3) % ids.len()];
                    retrying(|| {
                        let mut m = find(&mut store, &SqliteMixins, id)?;
                        match round % 3 {
                            0 => list.move_to_top(&mut store, &mut m).map(|_| ()),
                            1 => list.insert_at(&mut store, &mut m, (round % 5) as i64 + 1).map(|_| ()),
                            _ => create(&mut store, &SqliteMixins, &list, Mixin::in_parent(3).at(2)).map(|_| ()),
                        }
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut store = SqliteMixins::open(&path);
    let members = order(&mut store, &SqliteMixins, Some(3)).unwrap();
    let expected: Vec<i64> = (1..=members.len() as i64).collect();
    assert_eq!(positions(&mut store, &SqliteMixins, Some(3)).unwrap(), expected);
}
