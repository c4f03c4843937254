#![allow(dead_code)]

use std::path::Path;

use listrank_core::{Error, ItemId, Result};
use listrank_sqlite::SqliteListStore;
use listrank_test_support::{Mixin, MixinTable};
use rusqlite::params;

pub const MIXINS_DDL: &str = "CREATE TABLE IF NOT EXISTS mixins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT,
    pos INTEGER,
    parent_id INTEGER,
    parent_type TEXT
);
CREATE INDEX IF NOT EXISTS idx_mixins_parent_pos ON mixins (parent_id, pos);";

fn sql_error(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

pub struct SqliteMixins;

impl SqliteMixins {
    pub fn setup() -> Option<(SqliteListStore, SqliteMixins)> {
        let store = SqliteListStore::open_in_memory().unwrap();
        store.connection().execute_batch(MIXINS_DDL).unwrap();
        Some((store, SqliteMixins))
    }

    pub fn open(path: &Path) -> SqliteListStore {
        let store = SqliteListStore::open(path).unwrap();
        store.connection().execute_batch(MIXINS_DDL).unwrap();
        store
    }
}

impl MixinTable for SqliteMixins {
    type Store = SqliteListStore;

    fn name(&self) -> &str {
        "mixins"
    }

    fn insert(&self, store: &mut SqliteListStore, mixin: &Mixin) -> Result<ItemId> {
        let conn = store.connection();
        conn.execute(
            "INSERT INTO mixins (pos, parent_id, parent_type) VALUES (?1, ?2, ?3)",
            params![mixin.pos, mixin.parent_id, mixin.parent_type],
        )
        .map_err(sql_error)?;
        Ok(ItemId(conn.last_insert_rowid()))
    }

    fn update(&self, store: &mut SqliteListStore, mixin: &Mixin) -> Result<()> {
        let id = mixin.id.ok_or_else(|| Error::NotFound("unsaved mixin".into()))?;
        store
            .connection()
            .execute(
                "UPDATE mixins SET pos = ?2, parent_id = ?3, parent_type = ?4 WHERE id = ?1",
                params![id.0, mixin.pos, mixin.parent_id, mixin.parent_type],
            )
            .map_err(sql_error)?;
        Ok(())
    }

    fn delete(&self, store: &mut SqliteListStore, id: ItemId) -> Result<()> {
        store
            .connection()
            .execute("DELETE FROM mixins WHERE id = ?1", params![id.0])
            .map_err(sql_error)?;
        Ok(())
    }

    fn all(&self, store: &mut SqliteListStore) -> Result<Vec<Mixin>> {
        let conn = store.connection();
        let mut stmt = conn
            .prepare("SELECT id, pos, parent_id, parent_type FROM mixins")
            .map_err(sql_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Mixin::loaded(
                    ItemId(row.get(0)?),
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                ))
            })
            .map_err(sql_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_error)
    }
}
