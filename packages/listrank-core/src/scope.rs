use std::fmt;

use crate::error::{Error, Result};
use crate::ids::Value;
use crate::predicate::{Operand, PredicateTemplate};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scope as written by the host, before it is checked against the entity schema.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScopeSpec {
    /// One list for the whole table.
    #[default]
    None,
    /// A grouping attribute, or the name of a belongs-to association.
    Attribute(String),
    /// An ordered set of grouping attributes.
    Attributes(Vec<String>),
    /// A template such as `parent_id = #{parent_id} AND done = 0`.
    Predicate(String),
    /// Explicit belongs-to association name.
    BelongsTo(String),
}

/// Resolved scope: concrete attributes, or a parsed template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Scope {
    Attributes(Vec<String>),
    Predicate(PredicateTemplate),
}

impl Scope {
    pub fn global() -> Self {
        Scope::Attributes(Vec::new())
    }

    /// Attributes whose change moves an item to another list.
    pub fn key_attributes(&self) -> Vec<&str> {
        match self {
            Scope::Attributes(attrs) => attrs.iter().map(String::as_str).collect(),
            Scope::Predicate(template) => template.attributes().collect(),
        }
    }

    /// Build the equality condition, looking attribute values up with `value_of`.
    pub fn condition_with(
        &self,
        mut value_of: impl FnMut(&str) -> Result<Value>,
    ) -> Result<ScopeCondition> {
        let mut terms = Vec::new();
        match self {
            Scope::Attributes(attrs) => {
                for attr in attrs {
                    terms.push((attr.clone(), value_of(attr)?));
                }
            }
            Scope::Predicate(template) => {
                for clause in template.clauses() {
                    let value = match &clause.operand {
                        Operand::Attribute(attr) => value_of(attr)?,
                        Operand::Literal(v) => v.clone(),
                    };
                    terms.push((clause.column.clone(), value));
                }
            }
        }
        Ok(ScopeCondition { terms })
    }
}

/// Conjunction of `column = value` terms identifying one list.
///
/// A `Null` value matches rows whose column `IS NULL`. The empty condition matches the whole
/// table.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ScopeCondition {
    terms: Vec<(String, Value)>,
}

impl ScopeCondition {
    pub fn new(terms: Vec<(String, Value)>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    /// Equality lookup used by stores that evaluate conditions in memory.
    pub fn matches(&self, mut column_value: impl FnMut(&str) -> Option<Value>) -> bool {
        self.terms
            .iter()
            .all(|(column, want)| column_value(column).unwrap_or(Value::Null) == *want)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.terms.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }
}

impl fmt::Display for ScopeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "(all rows)");
        }
        for (i, (column, value)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            if value.is_null() {
                write!(f, "{column} IS NULL")?;
            } else {
                write!(f, "{column} = {value}")?;
            }
        }
        Ok(())
    }
}

pub(crate) fn unknown_attribute(entity: &str, attribute: &str) -> Error {
    Error::Configuration(format!("{entity} has no attribute {attribute:?}"))
}
