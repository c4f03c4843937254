//! Backend conformance suite.
//!
//! Each function takes a store and an empty `mixins` table and panics on the first failed
//! expectation. Backends run all of them through `conformance_suite!`.

use listrank_core::{
    transaction, Error, ItemId, ListStore, OrderedList, Plan, Reposition, Result, ScopeCondition,
    Shift, Value,
};

use crate::mixin::{
    create, destroy, find, mixin_list, order, positions, save, Mixin, MixinScope, MixinTable,
};
use crate::recording::Recording;

/// Ids created by `seed`: four rows under parent 5, then four under parent 6.
struct Seeded {
    five: Vec<ItemId>,
    six: Vec<ItemId>,
}

fn seed<T: MixinTable>(store: &mut T::Store, table: &T, list: &OrderedList) -> Seeded {
    let mut seeded = Seeded {
        five: Vec::new(),
        six: Vec::new(),
    };
    for parent in [5, 6] {
        for pos in 1..=4 {
            let mixin = create(store, table, list, Mixin::in_parent(parent).at(pos)).unwrap();
            let ids = if parent == 5 {
                &mut seeded.five
            } else {
                &mut seeded.six
            };
            ids.push(mixin.id.unwrap());
        }
    }
    seeded
}

/// `nums` are 1-based indexes into `ids`.
fn pick(ids: &[ItemId], nums: &[usize]) -> Vec<ItemId> {
    nums.iter().map(|n| ids[n - 1]).collect()
}

fn list_for<T: MixinTable>(table: &T, scope: MixinScope) -> OrderedList {
    mixin_list(table.name(), scope).unwrap()
}

fn ids_in<T: MixinTable>(store: &mut T::Store, table: &T, parent: i64) -> Vec<ItemId> {
    order(store, table, Some(parent)).unwrap()
}

fn pos_of<T: MixinTable>(store: &mut T::Store, table: &T, id: ItemId) -> Option<i64> {
    find(store, table, id).unwrap().pos
}

pub fn reordering<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let f = &s.five;
    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 2, 3, 4]));

    let mut m = find(store, table, f[1]).unwrap();
    assert!(list.move_lower(store, &mut m).unwrap());
    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 3, 2, 4]));

    let mut m = find(store, table, f[1]).unwrap();
    list.move_higher(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 2, 3, 4]));

    let mut m = find(store, table, f[0]).unwrap();
    list.move_to_bottom(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[2, 3, 4, 1]));

    let mut m = find(store, table, f[0]).unwrap();
    list.move_to_top(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 2, 3, 4]));

    let mut m = find(store, table, f[1]).unwrap();
    list.move_to_bottom(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 3, 4, 2]));

    let mut m = find(store, table, f[3]).unwrap();
    list.move_to_top(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[4, 1, 3, 2]));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(ids_in(store, table, 6), s.six);
}

pub fn bounds_checking<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);

    let mut first = find(store, table, s.five[0]).unwrap();
    list.move_higher(store, &mut first).unwrap();
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);

    let mut last = find(store, table, s.five[3]).unwrap();
    list.move_lower(store, &mut last).unwrap();
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(ids_in(store, table, 5), s.five);
}

pub fn move_to_bottom_from_next_to_last<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let mut m = find(store, table, s.five[2]).unwrap();
    list.move_to_bottom(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(&s.five, &[1, 2, 4, 3]));
    assert_eq!(m.pos, Some(4));
}

pub fn next_and_previous<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let first = find(store, table, s.five[0]).unwrap();
    let last = find(store, table, s.five[3]).unwrap();

    let lower = list.lower_item(store, &first).unwrap().map(|e| e.id);
    assert_eq!(lower, Some(s.five[1]));
    assert_eq!(list.higher_item(store, &first).unwrap(), None);
    let higher = list.higher_item(store, &last).unwrap().map(|e| e.id);
    assert_eq!(higher, Some(s.five[2]));
    assert_eq!(list.lower_item(store, &last).unwrap(), None);
}

pub fn scope_condition_and_column<T: MixinTable>(_store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let condition = list.scope_condition(&Mixin::in_parent(1)).unwrap();
    assert_eq!(
        condition,
        ScopeCondition::new(vec![("parent_id".into(), Value::Int(1))])
    );
    assert_eq!(list.position_column(), "pos");
}

fn check_appending_creates<T: MixinTable>(store: &mut T::Store, table: &T, list: &OrderedList) {
    for expected in 1..=3 {
        let m = create(store, table, list, Mixin::in_parent(20)).unwrap();
        assert_eq!(m.pos, Some(expected));
        assert_eq!(list.is_first(&m), expected == 1);
        assert!(list.is_last(store, &m).unwrap());
    }
    let m = create(store, table, list, Mixin::in_parent(0)).unwrap();
    assert_eq!(m.pos, Some(1));
    assert!(list.is_first(&m));
    assert!(list.is_last(store, &m).unwrap());
}

pub fn insert<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    seed(store, table, &list);
    check_appending_creates(store, table, &list);
}

pub fn insert_at<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    seed(store, table, &list);
    for expected in 1..=2 {
        let m = create(store, table, &list, Mixin::in_parent(20)).unwrap();
        assert_eq!(m.pos, Some(expected));
    }
    let new = create(store, table, &list, Mixin::in_parent(20)).unwrap();
    assert_eq!(new.pos, Some(3));
    let mut new4 = create(store, table, &list, Mixin::in_parent(20)).unwrap();
    assert_eq!(new4.pos, Some(4));

    assert_eq!(list.insert_at(store, &mut new4, 3).unwrap(), 3);
    assert_eq!(pos_of(store, table, new.id.unwrap()), Some(4));

    let mut new = find(store, table, new.id.unwrap()).unwrap();
    assert_eq!(list.insert_at(store, &mut new, 2).unwrap(), 2);
    assert_eq!(pos_of(store, table, new4.id.unwrap()), Some(4));

    let mut new5 = create(store, table, &list, Mixin::in_parent(20)).unwrap();
    assert_eq!(new5.pos, Some(5));
    assert_eq!(list.insert_at(store, &mut new5, 1).unwrap(), 1);
    assert_eq!(pos_of(store, table, new4.id.unwrap()), Some(5));
    assert_eq!(positions(store, table, Some(20)).unwrap(), vec![1, 2, 3, 4, 5]);
}

pub fn insert_at_clamps_to_bounds<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);

    let mut m = find(store, table, s.five[1]).unwrap();
    assert_eq!(list.insert_at(store, &mut m, 100).unwrap(), 4);
    assert_eq!(ids_in(store, table, 5), pick(&s.five, &[1, 3, 4, 2]));
    assert_eq!(list.insert_at(store, &mut m, 0).unwrap(), 1);
    assert_eq!(list.insert_at(store, &mut m, -5).unwrap(), 1);
    assert_eq!(ids_in(store, table, 5), pick(&s.five, &[2, 1, 3, 4]));

    let far = create(store, table, &list, Mixin::in_parent(5).at(40)).unwrap();
    assert_eq!(far.pos, Some(5));
    let front = create(store, table, &list, Mixin::in_parent(5).at(-1)).unwrap();
    assert_eq!(front.pos, Some(1));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4, 5, 6]);
}

pub fn delete_middle<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let f = &s.five;

    let m = find(store, table, f[1]).unwrap();
    destroy(store, table, &list, &m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 3, 4]));
    assert_eq!(pos_of(store, table, f[0]), Some(1));
    assert_eq!(pos_of(store, table, f[2]), Some(2));
    assert_eq!(pos_of(store, table, f[3]), Some(3));

    let m = find(store, table, f[0]).unwrap();
    destroy(store, table, &list, &m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(f, &[3, 4]));
    assert_eq!(pos_of(store, table, f[2]), Some(1));
    assert_eq!(pos_of(store, table, f[3]), Some(2));
}

pub fn nil_scope<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    seed(store, table, &list);
    let new1 = create(store, table, &list, Mixin::new(None)).unwrap();
    let mut new2 = create(store, table, &list, Mixin::new(None)).unwrap();
    let new3 = create(store, table, &list, Mixin::new(None)).unwrap();
    assert_eq!(new3.pos, Some(3));

    list.move_higher(store, &mut new2).unwrap();
    let ids: Vec<_> = [&new2, &new1, &new3].iter().filter_map(|m| m.id).collect();
    assert_eq!(order(store, table, None).unwrap(), ids);
}

pub fn remove_from_list_leaves_the_list<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let mut m = find(store, table, s.five[0]).unwrap();
    assert!(list.in_list(&m));
    assert!(list.remove_from_list(store, &mut m).unwrap());
    assert!(!list.in_list(&m));
    assert!(!list.in_list(&find(store, table, s.five[0]).unwrap()));
}

pub fn remove_from_list_nulls_position<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let f = &s.five;

    let mut m = find(store, table, f[1]).unwrap();
    list.remove_from_list(store, &mut m).unwrap();
    assert_eq!(m.pos, None);
    assert_eq!(pos_of(store, table, f[0]), Some(1));
    assert_eq!(pos_of(store, table, f[1]), None);
    assert_eq!(pos_of(store, table, f[2]), Some(2));
    assert_eq!(pos_of(store, table, f[3]), Some(3));
}

pub fn remove_then_destroy_shifts_once<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let f = &s.five;

    let mut m = find(store, table, f[1]).unwrap();
    list.remove_from_list(store, &mut m).unwrap();
    let m = find(store, table, f[1]).unwrap();
    destroy(store, table, &list, &m).unwrap();

    assert_eq!(ids_in(store, table, 5), pick(f, &[1, 3, 4]));
    assert_eq!(pos_of(store, table, f[0]), Some(1));
    assert_eq!(pos_of(store, table, f[2]), Some(2));
    assert_eq!(pos_of(store, table, f[3]), Some(3));
}

fn check_rescope<T: MixinTable>(store: &mut T::Store, table: &T, list: &OrderedList) {
    let s = seed(store, table, list);

    let mut m = find(store, table, s.five[1]).unwrap();
    m.parent_id = Some(6);
    save(store, table, list, &mut m).unwrap();
    assert_eq!(m.pos, Some(5));

    assert_eq!(ids_in(store, table, 5), pick(&s.five, &[1, 3, 4]));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3]);
    let mut six = s.six.clone();
    six.push(s.five[1]);
    assert_eq!(ids_in(store, table, 6), six);
    for (i, id) in six.iter().enumerate() {
        assert_eq!(pos_of(store, table, *id), Some(i as i64 + 1));
    }
}

pub fn rescope_shifts_old_list_and_appends<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    check_rescope(store, table, &list);
}

pub fn save_without_scope_change_is_a_noop<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let mut m = find(store, table, s.five[2]).unwrap();
    assert!(!list.will_leave_list(&m).unwrap());
    save(store, table, &list, &mut m).unwrap();
    assert_eq!(m.pos, Some(3));
    assert_eq!(ids_in(store, table, 5), s.five);
}

pub fn before_destroy_keeps_own_position<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let f = &s.five;

    let m = find(store, table, f[1]).unwrap();
    transaction(store, |st| list.before_destroy(st, &m)).unwrap();

    assert_eq!(pos_of(store, table, f[0]), Some(1));
    assert_eq!(pos_of(store, table, f[1]), Some(2));
    assert_eq!(pos_of(store, table, f[2]), Some(2));
    assert_eq!(pos_of(store, table, f[3]), Some(3));
}

pub fn higher_and_lower_items<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let ids = |entries: Vec<listrank_core::ListEntry>| -> Vec<ItemId> {
        entries.into_iter().map(|e| e.id).collect()
    };

    let third = find(store, table, s.five[2]).unwrap();
    let first = find(store, table, s.five[0]).unwrap();
    assert_eq!(ids(list.higher_items(store, &third).unwrap()), pick(&s.five, &[1, 2]));
    assert!(list.higher_items(store, &first).unwrap().is_empty());

    let second = find(store, table, s.five[1]).unwrap();
    let last = find(store, table, s.five[3]).unwrap();
    assert_eq!(ids(list.lower_items(store, &second).unwrap()), pick(&s.five, &[3, 4]));
    assert!(list.lower_items(store, &last).unwrap().is_empty());

    let unlisted = Mixin::in_parent(5);
    assert!(list.higher_items(store, &unlisted).unwrap().is_empty());
}

pub fn moving_first_and_last_items_returns_true<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let mut first = find(store, table, s.five[0]).unwrap();
    let mut last = find(store, table, s.five[3]).unwrap();
    assert!(list.move_to_top(store, &mut first).unwrap());
    assert!(list.move_higher(store, &mut first).unwrap());
    assert!(list.move_to_bottom(store, &mut last).unwrap());
    assert!(list.move_lower(store, &mut last).unwrap());
    assert_eq!(ids_in(store, table, 5), s.five);
}

pub fn append_returns_true<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    seed(store, table, &list);

    let mut fresh = Mixin::in_parent(5);
    assert!(fresh.is_new_record());
    assert!(!list.in_list(&fresh));
    assert!(list.append(store, &mut fresh).unwrap());
    assert_eq!(fresh.pos, Some(5));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);

    let mut m = create(store, table, &list, Mixin::in_parent(5)).unwrap();
    list.remove_from_list(store, &mut m).unwrap();
    assert!(!m.is_new_record());
    assert!(!list.in_list(&m));
    assert!(list.append(store, &mut m).unwrap());
    assert_eq!(m.pos, Some(5));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4, 5]);
}

pub fn decrement_returns_true<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);

    let m = find(store, table, s.five[3]).unwrap();
    assert_eq!(m.pos, Some(4));
    assert!(list.decrement_lower_items(store, &m).unwrap());
    assert_eq!(ids_in(store, table, 5), s.five);

    let mut m = find(store, table, s.five[3]).unwrap();
    m.parent_id = Some(6);
    assert_eq!(m.pos, Some(4));
    assert!(list.will_leave_list(&m).unwrap());
    assert!(list.decrement_lower_items(store, &m).unwrap());
}

pub fn template_scope<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Template);
    check_appending_creates(store, table, &list);

    let condition = list.scope_condition(&Mixin::in_parent(3)).unwrap();
    assert_eq!(condition.get("parent_id"), Some(&Value::Int(3)));
}

pub fn template_scope_rescope<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Template);
    check_rescope(store, table, &list);
}

pub fn parent_and_type_scope<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::ParentAndType);
    let mut widgets = Vec::new();
    for _ in 0..3 {
        let m = create(store, table, &list, Mixin::in_parent(5).typed("Widget")).unwrap();
        widgets.push(m.id.unwrap());
    }
    let gadget = create(store, table, &list, Mixin::in_parent(5).typed("Gadget")).unwrap();
    assert_eq!(gadget.pos, Some(1));
    let untyped = create(store, table, &list, Mixin::in_parent(5)).unwrap();
    assert_eq!(untyped.pos, Some(1));

    // Same parent, new type: leaves the widget list.
    let mut m = find(store, table, widgets[0]).unwrap();
    m.parent_type = Some("Gadget".into());
    save(store, table, &list, &mut m).unwrap();
    assert_eq!(m.pos, Some(2));
    assert_eq!(pos_of(store, table, widgets[1]), Some(1));
    assert_eq!(pos_of(store, table, widgets[2]), Some(2));
    assert_eq!(pos_of(store, table, untyped.id.unwrap()), Some(1));
}

pub fn association_scope<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Association);
    assert_eq!(list.scope().key_attributes(), vec!["parent_id"]);
    check_rescope(store, table, &list);
}

pub fn polymorphic_association_scope<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Polymorphic);
    assert_eq!(list.scope().key_attributes(), vec!["parent_id", "parent_type"]);

    let a = create(store, table, &list, Mixin::in_parent(5).typed("Post")).unwrap();
    let b = create(store, table, &list, Mixin::in_parent(5).typed("Post")).unwrap();
    let c = create(store, table, &list, Mixin::in_parent(5).typed("Page")).unwrap();
    assert_eq!((a.pos, b.pos, c.pos), (Some(1), Some(2), Some(1)));

    let mut a = a;
    a.parent_type = Some("Page".into());
    save(store, table, &list, &mut a).unwrap();
    assert_eq!(a.pos, Some(2));
    assert_eq!(pos_of(store, table, b.id.unwrap()), Some(1));
}

pub fn writes_only_changed_rows<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let mut rec = Recording::new(store);

    let mut second = Mixin::loaded(s.five[1], Some(2), Some(5), None);
    list.move_lower(&mut rec, &mut second).unwrap();
    assert_eq!(rec.batches.len(), 1);
    assert_eq!(rec.rows_written(), 2);

    rec.reset();
    let mut last = Mixin::loaded(s.five[3], Some(4), Some(5), None);
    list.move_to_top(&mut rec, &mut last).unwrap();
    assert_eq!(rec.batches.len(), 1);
    assert_eq!(rec.rows_written(), 4);
    assert_eq!(
        rec.batches[0].writes,
        vec![Reposition {
            id: s.five[3],
            position: Some(1),
        }]
    );
    assert_eq!(
        rec.batches[0].shift,
        Some(Shift {
            from: 1,
            to: 3,
            delta: 1,
            rows: 3,
        })
    );

    rec.reset();
    list.move_higher(&mut rec, &mut last).unwrap();
    assert!(rec.batches.is_empty());
    list.insert_at(&mut rec, &mut last, 1).unwrap();
    assert!(rec.batches.is_empty());

    rec.reset();
    let mut first_of_six = Mixin::loaded(s.six[0], Some(1), Some(6), None);
    list.remove_from_list(&mut rec, &mut first_of_six).unwrap();
    assert_eq!(rec.batches.len(), 1);
    assert_eq!(rec.rows_written(), 4);
}

pub fn repairs_stale_gaps<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let gap = [
        Reposition {
            id: s.five[2],
            position: Some(7),
        },
        Reposition {
            id: s.five[3],
            position: Some(9),
        },
    ];
    let parent = ScopeCondition::new(vec![("parent_id".into(), Value::Int(5))]);
    let plan = Plan::assign(gap.to_vec());
    transaction(store, |st| st.write_positions(list.table(), &parent, &plan)).unwrap();
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 7, 9]);

    let mut m = find(store, table, s.five[0]).unwrap();
    list.move_lower(store, &mut m).unwrap();
    assert_eq!(ids_in(store, table, 5), pick(&s.five, &[2, 1, 3, 4]));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);
}

pub fn unsaved_items_are_not_placed<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);

    let mut fresh = Mixin::in_parent(5).at(2);
    assert!(matches!(
        list.insert_at(store, &mut fresh, 2),
        Err(Error::NotFound(_))
    ));
    assert!(!list.append(store, &mut fresh).unwrap());
    assert_eq!(fresh.pos, Some(2));
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(ids_in(store, table, 5), s.five);
}

pub fn offsets_past_the_position_range_find_nothing<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);

    let far = Mixin::loaded(s.five[3], Some(i64::MAX), Some(5), None);
    assert_eq!(list.item_at_offset(store, &far, 1).unwrap(), None);
    assert_eq!(list.lower_item(store, &far).unwrap(), None);
    assert_eq!(list.item_at_offset(store, &far, i64::MAX).unwrap(), None);
    let near = Mixin::loaded(s.five[0], Some(1), Some(5), None);
    assert_eq!(
        list.item_at_offset(store, &near, 3).unwrap().map(|e| e.id),
        Some(s.five[3])
    );
}

pub fn empty_scope_queries<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let nobody = Mixin::in_parent(404);
    assert_eq!(list.last_position(store, &nobody).unwrap(), 0);
    assert_eq!(list.first_item(store, &nobody).unwrap(), None);
    assert_eq!(list.last_item(store, &nobody).unwrap(), None);
    assert!(list.list_scope(store, &nobody).unwrap().is_empty());
    assert!(!list.is_last(store, &nobody).unwrap());

    let only = create(store, table, &list, Mixin::in_parent(404)).unwrap();
    assert_eq!(list.last_position(store, &only).unwrap(), 1);
    assert_eq!(list.first_item(store, &only).unwrap().map(|e| e.id), only.id);
}

pub fn host_failure_rolls_back_list_changes<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);

    let failed: Result<()> = transaction(store, |st| {
        let mut m = Mixin::in_parent(5).at(1);
        list.before_create(st, &mut m)?;
        table.insert(st, &m)?;
        Err(Error::Constraint("validation failed after insert".into()))
    });
    assert!(failed.is_err());
    assert_eq!(ids_in(store, table, 5), s.five);
    assert_eq!(positions(store, table, Some(5)).unwrap(), vec![1, 2, 3, 4]);
}

pub fn savepoint_rollback_keeps_outer_work<T: MixinTable>(store: &mut T::Store, table: &T) {
    let list = list_for(table, MixinScope::Parent);
    let s = seed(store, table, &list);
    let mut first = find(store, table, s.five[0]).unwrap();
    let mut last = find(store, table, s.five[3]).unwrap();

    transaction(store, |st| {
        list.move_to_bottom(st, &mut first)?;
        let inner: Result<()> = transaction(st, |st| {
            list.move_to_top(st, &mut last)?;
            Err(Error::Constraint("inner step failed".into()))
        });
        assert!(inner.is_err());
        Ok(())
    })
    .unwrap();

    assert_eq!(ids_in(store, table, 5), pick(&s.five, &[2, 3, 4, 1]));
}
