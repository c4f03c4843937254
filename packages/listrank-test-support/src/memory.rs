use listrank_core::{Error, ItemId, MemoryListStore, Result, Row, Value};

use crate::mixin::{Mixin, MixinTable};

/// `mixins` rows kept in a `MemoryListStore`.
#[derive(Clone, Debug)]
pub struct MemoryMixins {
    name: String,
}

impl MemoryMixins {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Fresh store and table, in the shape `conformance_suite!` expects.
    pub fn setup() -> Option<(MemoryListStore, MemoryMixins)> {
        Some((MemoryListStore::new(), MemoryMixins::new("mixins")))
    }
}

fn columns(mixin: &Mixin) -> Row {
    Row::from([
        ("type".to_string(), Value::Null),
        ("pos".to_string(), Value::from(mixin.pos)),
        ("parent_id".to_string(), Value::from(mixin.parent_id)),
        ("parent_type".to_string(), Value::from(mixin.parent_type.clone())),
    ])
}

fn int(row: &Row, column: &str) -> Result<Option<i64>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Int(i)) => Ok(Some(*i)),
        Some(other) => Err(Error::Storage(format!("{column} holds {other}"))),
    }
}

impl MixinTable for MemoryMixins {
    type Store = MemoryListStore;

    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, store: &mut MemoryListStore, mixin: &Mixin) -> Result<ItemId> {
        store.insert_row(&self.name, mixin.id, columns(mixin))
    }

    fn update(&self, store: &mut MemoryListStore, mixin: &Mixin) -> Result<()> {
        let id = mixin
            .id
            .ok_or_else(|| Error::NotFound(format!("{}: unsaved row", self.name)))?;
        store.update_row(&self.name, id, columns(mixin))
    }

    fn delete(&self, store: &mut MemoryListStore, id: ItemId) -> Result<()> {
        store.delete_row(&self.name, id)
    }

    fn all(&self, store: &mut MemoryListStore) -> Result<Vec<Mixin>> {
        store
            .rows(&self.name)
            .map(|(id, row)| {
                let parent_type = match row.get("parent_type") {
                    Some(Value::Text(t)) => Some(t.clone()),
                    _ => None,
                };
                Ok(Mixin::loaded(
                    id,
                    int(row, "pos")?,
                    int(row, "parent_id")?,
                    parent_type,
                ))
            })
            .collect()
    }
}
