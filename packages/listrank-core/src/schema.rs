/// Kind of a declared association. Only `BelongsTo` can serve as a list scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Association {
    pub name: String,
    pub kind: AssociationKind,
    /// Foreign key column on this entity's table (belongs-to only).
    pub foreign_key: String,
    /// Type discriminator column, set for polymorphic belongs-to.
    pub foreign_type: Option<String>,
}

impl Association {
    pub fn belongs_to(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            foreign_key: format!("{name}_id"),
            name,
            kind: AssociationKind::BelongsTo,
            foreign_type: None,
        }
    }

    pub fn has_one(name: impl Into<String>) -> Self {
        Self::other(name.into(), AssociationKind::HasOne)
    }

    pub fn has_many(name: impl Into<String>) -> Self {
        Self::other(name.into(), AssociationKind::HasMany)
    }

    fn other(name: String, kind: AssociationKind) -> Self {
        Self {
            foreign_key: String::new(),
            name,
            kind,
            foreign_type: None,
        }
    }

    pub fn polymorphic(mut self) -> Self {
        self.foreign_type = Some(format!("{}_type", self.name));
        self
    }

    pub fn with_foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = column.into();
        self
    }

    pub fn with_foreign_type(mut self, column: impl Into<String>) -> Self {
        self.foreign_type = Some(column.into());
        self
    }
}

/// Explicit description of a host entity type: its table, columns and associations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub attributes: Vec<String>,
    pub associations: Vec<Association>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".into(),
            attributes: vec!["id".into()],
            associations: Vec::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.has_attribute(&column) {
            self.attributes.push(column.clone());
        }
        self.primary_key = column;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.has_attribute(&name) {
            self.attributes.push(name);
        }
        self
    }

    pub fn attributes<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |s, n| s.attribute(n))
    }

    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    pub fn find_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }
}
