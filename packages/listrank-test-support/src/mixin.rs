use listrank_core::{
    transaction, Association, EntitySchema, HasPosition, HasScopeKey, ItemId, ListConfig,
    ListStore, OrderedList, Position, Result, ScopeSpec, Value,
};

/// Row of the shared `mixins` test table.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mixin {
    pub id: Option<ItemId>,
    pub pos: Option<Position>,
    pub parent_id: Option<i64>,
    pub parent_type: Option<String>,
    saved: Option<(Option<i64>, Option<String>)>,
}

impl Mixin {
    pub fn new(parent_id: Option<i64>) -> Self {
        Self {
            parent_id,
            ..Self::default()
        }
    }

    pub fn in_parent(parent_id: i64) -> Self {
        Self::new(Some(parent_id))
    }

    pub fn typed(mut self, parent_type: &str) -> Self {
        self.parent_type = Some(parent_type.to_string());
        self
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    /// Record the current scope attributes as persisted.
    pub fn mark_saved(&mut self) {
        self.saved = Some((self.parent_id, self.parent_type.clone()));
    }

    /// A row as loaded from storage.
    pub fn loaded(
        id: ItemId,
        pos: Option<Position>,
        parent_id: Option<i64>,
        parent_type: Option<String>,
    ) -> Self {
        let mut mixin = Self {
            id: Some(id),
            pos,
            parent_id,
            parent_type,
            saved: None,
        };
        mixin.mark_saved();
        mixin
    }
}

impl HasPosition for Mixin {
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

impl HasScopeKey for Mixin {
    fn scope_value(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "parent_id" => Some(Value::from(self.parent_id)),
            "parent_type" => Some(Value::from(self.parent_type.clone())),
            _ => None,
        }
    }

    fn persisted_scope_value(&self, attribute: &str) -> Option<Value> {
        let Some((parent_id, parent_type)) = &self.saved else {
            return self.scope_value(attribute);
        };
        match attribute {
            "parent_id" => Some(Value::from(*parent_id)),
            "parent_type" => Some(Value::from(parent_type.clone())),
            _ => None,
        }
    }
}

/// Row access to a `mixins` table for one backend.
///
/// Columns: `id` (integer primary key assigned by the store), `type`, `pos`, `parent_id`,
/// `parent_type`. Every method runs on the store's connection, inside whatever transaction
/// is open.
pub trait MixinTable {
    type Store: ListStore;

    fn name(&self) -> &str;
    fn insert(&self, store: &mut Self::Store, mixin: &Mixin) -> Result<ItemId>;
    fn update(&self, store: &mut Self::Store, mixin: &Mixin) -> Result<()>;
    fn delete(&self, store: &mut Self::Store, id: ItemId) -> Result<()>;
    /// Every row, in any order.
    fn all(&self, store: &mut Self::Store) -> Result<Vec<Mixin>>;
}

/// Scope variants exercised by the suite.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MixinScope {
    /// `:scope => :parent` without an association: resolves to `parent_id`.
    Parent,
    /// `'parent_id = #{parent_id}'`
    Template,
    /// `[:parent_id, :parent_type]`
    ParentAndType,
    /// `belongs_to :parent`
    Association,
    /// `belongs_to :parent, polymorphic`
    Polymorphic,
}

pub fn schema(table: &str) -> EntitySchema {
    EntitySchema::new("ListMixin", table).attributes(["type", "pos", "parent_id", "parent_type"])
}

pub fn mixin_list(table: &str, scope: MixinScope) -> Result<OrderedList> {
    let mut schema = schema(table);
    let spec = match scope {
        MixinScope::Parent => ScopeSpec::Attribute("parent".into()),
        MixinScope::Template => ScopeSpec::Predicate("parent_id = #{parent_id}".into()),
        MixinScope::ParentAndType => {
            ScopeSpec::Attributes(vec!["parent_id".into(), "parent_type".into()])
        }
        MixinScope::Association => {
            schema = schema.association(Association::belongs_to("parent"));
            ScopeSpec::Attribute("parent".into())
        }
        MixinScope::Polymorphic => {
            schema = schema.association(Association::belongs_to("parent").polymorphic());
            ScopeSpec::Attribute("parent".into())
        }
    };
    ListConfig::new().column("pos").scope(spec).resolve(&schema)
}

// ---- host persistence: hook and row change in one transaction ----

pub fn create<T: MixinTable>(
    store: &mut T::Store,
    table: &T,
    list: &OrderedList,
    mut mixin: Mixin,
) -> Result<Mixin> {
    transaction(store, |s| {
        list.before_create(s, &mut mixin)?;
        let id = table.insert(s, &mixin)?;
        mixin.id = Some(id);
        mixin.mark_saved();
        Ok(mixin)
    })
}

pub fn save<T: MixinTable>(
    store: &mut T::Store,
    table: &T,
    list: &OrderedList,
    mixin: &mut Mixin,
) -> Result<()> {
    transaction(store, |s| {
        list.before_save(s, mixin)?;
        table.update(s, mixin)?;
        mixin.mark_saved();
        Ok(())
    })
}

pub fn destroy<T: MixinTable>(
    store: &mut T::Store,
    table: &T,
    list: &OrderedList,
    mixin: &Mixin,
) -> Result<()> {
    let Some(id) = mixin.id else {
        return Ok(());
    };
    transaction(store, |s| {
        list.before_destroy(s, mixin)?;
        table.delete(s, id)
    })
}

pub fn find<T: MixinTable>(store: &mut T::Store, table: &T, id: ItemId) -> Result<Mixin> {
    table
        .all(store)?
        .into_iter()
        .find(|m| m.id == Some(id))
        .ok_or_else(|| listrank_core::Error::NotFound(format!("{} row {id}", table.name())))
}

/// Ids of the rows with this `parent_id`, by position; unlisted rows last, by id.
pub fn order<T: MixinTable>(
    store: &mut T::Store,
    table: &T,
    parent_id: Option<i64>,
) -> Result<Vec<ItemId>> {
    let mut rows: Vec<Mixin> = table
        .all(store)?
        .into_iter()
        .filter(|m| m.parent_id == parent_id)
        .collect();
    rows.sort_by_key(|m| (m.pos.is_none(), m.pos, m.id));
    Ok(rows.into_iter().filter_map(|m| m.id).collect())
}

/// Sorted non-null positions of the rows with this `parent_id`.
pub fn positions<T: MixinTable>(
    store: &mut T::Store,
    table: &T,
    parent_id: Option<i64>,
) -> Result<Vec<Position>> {
    let mut out: Vec<Position> = table
        .all(store)?
        .into_iter()
        .filter(|m| m.parent_id == parent_id)
        .filter_map(|m| m.pos)
        .collect();
    out.sort_unstable();
    Ok(out)
}
