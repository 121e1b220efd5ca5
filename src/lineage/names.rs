//! Entity types and qualified-name derivation

use serde::{Deserialize, Serialize};

use crate::catalog::EntityRef;

/// Catalog type names for the lineage graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogTypes {
    /// External-path artifact type
    pub source: String,
    pub database: String,
    pub table: String,
    pub process: String,
}

impl Default for CatalogTypes {
    fn default() -> Self {
        Self {
            source: "hdfs_path".to_string(),
            database: "hive_db".to_string(),
            table: "Table".to_string(),
            process: "hive_process".to_string(),
        }
    }
}

/// Derives qualified names for lineage entities
///
/// Every name is a pure function of static configuration, never of a run id
/// or timestamp, so re-runs land on the same entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageNames {
    pub types: CatalogTypes,
    /// Store cluster name used as the namespace suffix
    pub cluster: String,
}

impl LineageNames {
    pub fn new(cluster: impl Into<String>, types: CatalogTypes) -> Self {
        Self {
            types,
            cluster: cluster.into(),
        }
    }

    /// `<database>@<cluster>`
    pub fn database_qualified_name(&self, database: &str) -> String {
        format!("{}@{}", database, self.cluster)
    }

    /// `<table>@<database>@<cluster>`
    pub fn table_qualified_name(&self, database: &str, table: &str) -> String {
        format!("{}@{}@{}", table, database, self.cluster)
    }

    /// `<pipeline>@process`
    pub fn process_qualified_name(&self, pipeline: &str) -> String {
        format!("{}@process", pipeline)
    }

    pub fn table_ref(&self, database: &str, table: &str) -> EntityRef {
        EntityRef::new(&self.types.table, self.table_qualified_name(database, table))
    }

    pub fn process_ref(&self, pipeline: &str) -> EntityRef {
        EntityRef::new(&self.types.process, self.process_qualified_name(pipeline))
    }
}

impl Default for LineageNames {
    fn default() -> Self {
        Self::new("duckdb", CatalogTypes::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let names = LineageNames::new("mysql", CatalogTypes::default());

        assert_eq!(names.database_qualified_name("sales"), "sales@mysql");
        assert_eq!(
            names.table_qualified_name("sales", "orders"),
            "orders@sales@mysql"
        );
        assert_eq!(
            names.process_qualified_name("load_csv_to_mysql"),
            "load_csv_to_mysql@process"
        );
        assert_eq!(names.table_ref("sales", "orders").type_name, "Table");
    }

    #[test]
    fn test_types_partial_override() {
        let types: CatalogTypes = toml::from_str("table = \"rdbms_table\"").unwrap();
        assert_eq!(types.table, "rdbms_table");
        assert_eq!(types.source, "hdfs_path");
    }
}
