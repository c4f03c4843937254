use tracing::debug;

use crate::error::{Error, Result};
use crate::list::{ListTable, OrderedList};
use crate::predicate::{is_identifier, PredicateTemplate};
use crate::schema::{AssociationKind, EntitySchema};
use crate::scope::{unknown_attribute, Scope, ScopeSpec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_POSITION_COLUMN: &str = "position";

/// Per-entity list configuration, supplied once by the host.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListConfig {
    pub column: String,
    pub scope: ScopeSpec,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            column: DEFAULT_POSITION_COLUMN.to_string(),
            scope: ScopeSpec::None,
        }
    }
}

impl ListConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn scope(mut self, scope: ScopeSpec) -> Self {
        self.scope = scope;
        self
    }

    /// Parse a configuration document; missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration(format!("list config: {e}")))
    }

    /// Check the configuration against `schema` and build the list manager.
    ///
    /// Association names are turned into their foreign key (and type) columns here, once.
    pub fn resolve(&self, schema: &EntitySchema) -> Result<OrderedList> {
        for (kind, name) in [
            ("table", schema.table.as_str()),
            ("primary key", schema.primary_key.as_str()),
            ("position column", self.column.as_str()),
        ] {
            check_identifier(&schema.name, kind, name)?;
        }
        for required in [&schema.primary_key, &self.column] {
            if !schema.has_attribute(required) {
                return Err(unknown_attribute(&schema.name, required));
            }
        }

        let scope = resolve_scope(schema, &self.scope)?;
        for attr in scope.key_attributes() {
            if attr == self.column || attr == schema.primary_key {
                return Err(Error::Configuration(format!(
                    "{}: {attr:?} cannot be part of the list scope",
                    schema.name
                )));
            }
        }
        debug!(entity = %schema.name, column = %self.column, scope = ?scope, "resolved list configuration");

        Ok(OrderedList::new(
            schema.name.clone(),
            ListTable {
                table: schema.table.clone(),
                primary_key: schema.primary_key.clone(),
                column: self.column.clone(),
            },
            scope,
        ))
    }
}

fn check_identifier(entity: &str, kind: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{entity}: {kind} {name:?} is not a plain identifier"
        )))
    }
}

fn require_attribute(schema: &EntitySchema, name: &str) -> Result<String> {
    check_identifier(&schema.name, "scope attribute", name)?;
    if schema.has_attribute(name) {
        Ok(name.to_string())
    } else {
        Err(unknown_attribute(&schema.name, name))
    }
}

fn belongs_to_columns(schema: &EntitySchema, name: &str) -> Result<Option<Vec<String>>> {
    let Some(assoc) = schema.find_association(name) else {
        return Ok(None);
    };
    if assoc.kind != AssociationKind::BelongsTo {
        return Err(Error::Configuration(format!(
            "{}: only belongs-to associations can be used as a scope, {name:?} is {:?}",
            schema.name, assoc.kind
        )));
    }
    let mut columns = vec![require_attribute(schema, &assoc.foreign_key)?];
    if let Some(foreign_type) = &assoc.foreign_type {
        columns.push(require_attribute(schema, foreign_type)?);
    }
    Ok(Some(columns))
}

fn resolve_scope(schema: &EntitySchema, spec: &ScopeSpec) -> Result<Scope> {
    match spec {
        ScopeSpec::None => Ok(Scope::global()),
        ScopeSpec::BelongsTo(name) => match belongs_to_columns(schema, name)? {
            Some(columns) => Ok(Scope::Attributes(columns)),
            None => Err(Error::Configuration(format!(
                "{}: unknown association {name:?}",
                schema.name
            ))),
        },
        ScopeSpec::Attribute(name) => {
            if let Some(columns) = belongs_to_columns(schema, name)? {
                return Ok(Scope::Attributes(columns));
            }
            if schema.has_attribute(name) {
                return Ok(Scope::Attributes(vec![require_attribute(schema, name)?]));
            }
            if !name.ends_with("_id") {
                let with_suffix = format!("{name}_id");
                if schema.has_attribute(&with_suffix) {
                    return Ok(Scope::Attributes(vec![with_suffix]));
                }
            }
            Err(unknown_attribute(&schema.name, name))
        }
        ScopeSpec::Attributes(names) => {
            let mut columns = Vec::with_capacity(names.len());
            for name in names {
                let column = require_attribute(schema, name)?;
                if columns.contains(&column) {
                    return Err(Error::Configuration(format!(
                        "{}: scope attribute {name:?} listed twice",
                        schema.name
                    )));
                }
                columns.push(column);
            }
            Ok(Scope::Attributes(columns))
        }
        ScopeSpec::Predicate(template) => {
            let parsed = PredicateTemplate::parse(template)?;
            for clause in parsed.clauses() {
                require_attribute(schema, &clause.column)?;
            }
            for attr in parsed.attributes() {
                require_attribute(schema, attr)?;
            }
            Ok(Scope::Predicate(parsed))
        }
    }
}
