#![allow(dead_code)]

use listrank_core::{
    transaction, EntitySchema, HasPosition, HasScopeKey, ItemId, ListConfig, MemoryListStore,
    OrderedList, Position, Result, Row, ScopeSpec, Value,
};

pub const TABLE: &str = "items";

/// Minimal host entity: `parent_id` scoped, with dirty tracking for re-scopes.
#[derive(Clone, Debug, Default)]
pub struct Item {
    pub id: Option<ItemId>,
    pub pos: Option<Position>,
    pub parent_id: Option<i64>,
    pub saved_parent_id: Option<i64>,
}

impl Item {
    pub fn new(parent_id: i64) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }
}

impl HasPosition for Item {
    fn id(&self) -> Option<ItemId> {
        self.id
    }

    fn position(&self) -> Option<Position> {
        self.pos
    }

    fn set_position(&mut self, position: Option<Position>) {
        self.pos = position;
    }
}

impl HasScopeKey for Item {
    fn scope_value(&self, attribute: &str) -> Option<Value> {
        (attribute == "parent_id").then(|| Value::from(self.parent_id))
    }

    fn persisted_scope_value(&self, attribute: &str) -> Option<Value> {
        if self.id.is_none() {
            return self.scope_value(attribute);
        }
        (attribute == "parent_id").then(|| Value::from(self.saved_parent_id))
    }
}

pub fn list() -> OrderedList {
    let schema = EntitySchema::new("Item", TABLE).attributes(["pos", "parent_id"]);
    ListConfig::new()
        .column("pos")
        .scope(ScopeSpec::Attribute("parent".into()))
        .resolve(&schema)
        .unwrap()
}

fn columns(item: &Item) -> Row {
    Row::from([
        ("pos".to_string(), Value::from(item.pos)),
        ("parent_id".to_string(), Value::from(item.parent_id)),
    ])
}

/// Host-side create: before-create hook and insert in one transaction.
pub fn create(store: &mut MemoryListStore, list: &OrderedList, mut item: Item) -> Result<Item> {
    transaction(store, |s| {
        list.before_create(s, &mut item)?;
        let id = s.insert_row(TABLE, None, columns(&item))?;
        item.id = Some(id);
        item.saved_parent_id = item.parent_id;
        Ok(item)
    })
}

pub fn save(store: &mut MemoryListStore, list: &OrderedList, item: &mut Item) -> Result<()> {
    transaction(store, |s| {
        list.before_save(s, item)?;
        let id = item.id.expect("saved item has an id");
        s.update_row(TABLE, id, columns(item))?;
        item.saved_parent_id = item.parent_id;
        Ok(())
    })
}

pub fn destroy(store: &mut MemoryListStore, list: &OrderedList, item: &Item) -> Result<()> {
    transaction(store, |s| {
        list.before_destroy(s, item)?;
        s.delete_row(TABLE, item.id.expect("destroyed item has an id"))
    })
}

pub fn find(store: &mut MemoryListStore, id: ItemId) -> Item {
    let row = store.row(TABLE, id).expect("row exists");
    let int = |v: Option<&Value>| match v {
        Some(Value::Int(i)) => Some(*i),
        _ => None,
    };
    let parent_id = int(row.get("parent_id"));
    Item {
        id: Some(id),
        pos: int(row.get("pos")),
        parent_id,
        saved_parent_id: parent_id,
    }
}

/// Ids in `parent_id`, ordered by position (unlisted rows last, by id).
pub fn ids_in(store: &MemoryListStore, parent_id: i64) -> Vec<i64> {
    let mut rows: Vec<(Option<i64>, i64)> = store
        .rows(TABLE)
        .filter(|(_, row)| row.get("parent_id") == Some(&Value::Int(parent_id)))
        .map(|(id, row)| {
            let pos = match row.get("pos") {
                Some(Value::Int(p)) => Some(*p),
                _ => None,
            };
            (pos, id.0)
        })
        .collect();
    rows.sort_by_key(|(pos, id)| (pos.is_none(), *pos, *id));
    rows.into_iter().map(|(_, id)| id).collect()
}

pub fn positions_in(store: &MemoryListStore, parent_id: i64) -> Vec<Position> {
    let mut out: Vec<Position> = store
        .rows(TABLE)
        .filter(|(_, row)| row.get("parent_id") == Some(&Value::Int(parent_id)))
        .filter_map(|(_, row)| match row.get("pos") {
            Some(Value::Int(p)) => Some(*p),
            _ => None,
        })
        .collect();
    out.sort_unstable();
    out
}

/// Two parents with four items each: ids 1..=4 under parent 5, ids 5..=8 under parent 6.
pub fn seeded() -> (MemoryListStore, OrderedList) {
    let mut store = MemoryListStore::new();
    let list = list();
    for parent in [5, 6] {
        for _ in 0..4 {
            create(&mut store, &list, Item::new(parent)).unwrap();
        }
    }
    (store, list)
}
