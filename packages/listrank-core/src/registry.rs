use std::collections::HashMap;

use crate::config::ListConfig;
use crate::error::{Error, Result};
use crate::list::OrderedList;
use crate::schema::EntitySchema;

/// Per-entity list managers, each configured exactly once.
#[derive(Debug, Default)]
pub struct ListRegistry {
    lists: HashMap<String, OrderedList>,
}

impl ListRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: &EntitySchema, config: &ListConfig) -> Result<&OrderedList> {
        if self.lists.contains_key(&schema.name) {
            return Err(Error::Configuration(format!(
                "{} already has a list configuration",
                schema.name
            )));
        }
        let list = config.resolve(schema)?;
        Ok(self.lists.entry(schema.name.clone()).or_insert(list))
    }

    pub fn get(&self, entity: &str) -> Option<&OrderedList> {
        self.lists.get(entity)
    }

    /// Entities without a list configuration get no hooks; callers skip them.
    pub fn is_listed(&self, entity: &str) -> bool {
        self.lists.contains_key(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_is_configured_once() {
        let schema = EntitySchema::new("TodoItem", "todo_items").attributes(["position", "todo_list_id"]);
        let mut registry = ListRegistry::new();
        registry.register(&schema, &ListConfig::new()).unwrap();
        assert!(registry.is_listed("TodoItem"));
        assert!(!registry.is_listed("Mixin"));

        let err = registry.register(&schema, &ListConfig::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(registry.get("TodoItem").unwrap().position_column(), "position");
    }
}
