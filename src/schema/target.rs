//! Target schema definition

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::SchemaError;
use super::types::SemanticType;

fn default_nullable() -> bool {
    true
}

/// A single target column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name in the target container
    pub name: String,
    /// Semantic type
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    /// Whether NULL is allowed (ignored for primary-key columns)
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDef {
    /// Create a nullable, non-key column
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            nullable: true,
            primary_key: false,
        }
    }

    /// Mark as primary key (implies not null)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Whether every row must carry a value
    pub fn is_required(&self) -> bool {
        self.primary_key || !self.nullable
    }
}

/// Ordered set of target columns; fixed for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSchema {
    pub columns: Vec<ColumnDef>,
}

impl TargetSchema {
    /// Create a schema, checking that it is usable
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self, SchemaError> {
        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    /// Check column names are unique and a primary key exists
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "schema has no columns".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(SchemaError::InvalidSchema(
                    "column with an empty name".to_string(),
                ));
            }
            if !seen.insert(column.name.to_lowercase()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }

        if !self.columns.iter().any(|c| c.primary_key) {
            return Err(SchemaError::InvalidSchema(
                "schema needs at least one primary-key column".to_string(),
            ));
        }

        Ok(())
    }

    /// Primary-key column names in schema order
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in schema order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
