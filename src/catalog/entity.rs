//! Catalog entity model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute holding the natural key of every entity
pub const QUALIFIED_NAME: &str = "qualifiedName";

/// Reference to another entity by its natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub type_name: String,
    pub qualified_name: String,
}

impl EntityRef {
    pub fn new(type_name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            qualified_name: qualified_name.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.type_name, self.qualified_name)
    }
}

/// Value of a relationship: one reference or a set of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relationship {
    One(EntityRef),
    Many(Vec<EntityRef>),
}

impl Relationship {
    /// Referenced entities
    pub fn refs(&self) -> Vec<&EntityRef> {
        match self {
            Relationship::One(r) => vec![r],
            Relationship::Many(refs) => refs.iter().collect(),
        }
    }
}

/// A typed catalog entity
///
/// `(type_name, qualified_name)` identifies one logical entity; the catalog
/// must never hold two entities with the same pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntity {
    pub type_name: String,
    pub qualified_name: String,
    /// Catalog-assigned id, present once persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Attributes, always including `qualifiedName`
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
}

impl CatalogEntity {
    /// Describe a new entity
    pub fn new(type_name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let mut attributes = Map::new();
        attributes.insert(
            QUALIFIED_NAME.to_string(),
            Value::String(qualified_name.clone()),
        );
        Self {
            type_name: type_name.into(),
            qualified_name,
            guid: None,
            attributes,
            relationships: BTreeMap::new(),
        }
    }

    /// Set an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set an attribute when a value is present
    pub fn with_optional_attribute(
        self,
        name: impl Into<String>,
        value: Option<impl Into<Value>>,
    ) -> Self {
        match value {
            Some(v) => self.with_attribute(name, v),
            None => self,
        }
    }

    /// Add a single-valued relationship
    pub fn with_relationship(mut self, name: impl Into<String>, target: EntityRef) -> Self {
        self.relationships
            .insert(name.into(), Relationship::One(target));
        self
    }

    /// Add a multi-valued relationship
    pub fn with_relationships(mut self, name: impl Into<String>, targets: Vec<EntityRef>) -> Self {
        self.relationships
            .insert(name.into(), Relationship::Many(targets));
        self
    }

    /// Set the catalog id
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// Attribute value
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Relationship value
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    /// Reference to this entity
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(&self.type_name, &self.qualified_name)
    }

    /// Whether this entity has the given natural key
    pub fn is(&self, type_name: &str, qualified_name: &str) -> bool {
        self.type_name == type_name && self.qualified_name == qualified_name
    }
}

/// Classification type definition (administrative)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDef {
    pub name: String,
    pub description: String,
}

impl ClassificationDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_carries_qualified_name() {
        let entity = CatalogEntity::new("hive_db", "sales@duckdb").with_attribute("name", "sales");

        assert_eq!(
            entity.attribute(QUALIFIED_NAME),
            Some(&Value::String("sales@duckdb".to_string()))
        );
        assert_eq!(entity.entity_ref(), EntityRef::new("hive_db", "sales@duckdb"));
        assert!(entity.is("hive_db", "sales@duckdb"));
        assert!(!entity.is("Table", "sales@duckdb"));
    }

    #[test]
    fn test_relationship_refs() {
        let entity = CatalogEntity::new("hive_process", "daily@process")
            .with_relationships("inputs", vec![EntityRef::new("hdfs_path", "/data/in.csv")])
            .with_relationship("db", EntityRef::new("hive_db", "sales@duckdb"));

        let inputs = entity.relationship("inputs").unwrap().refs();
        assert_eq!(inputs[0].qualified_name, "/data/in.csv");
        assert_eq!(entity.relationship("db").unwrap().refs().len(), 1);
        assert!(entity.relationship("outputs").is_none());
    }
}
