//! Pipeline configuration
//!
//! Loaded from a TOML file; catalog location and credentials can be
//! overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::catalog::RetryPolicy;
use crate::lineage::{CatalogTypes, LineageNames, SourceArtifact, TargetTable};
use crate::schema::{ColumnMapping, TargetSchema};
use crate::source::CsvOptions;

/// Environment variable overriding `catalog.endpoint`
pub const ENV_CATALOG_URL: &str = "LINEAGE_CATALOG_URL";
/// Environment variable overriding `catalog.username`
pub const ENV_CATALOG_USER: &str = "LINEAGE_CATALOG_USER";
/// Environment variable overriding `catalog.password`
pub const ENV_CATALOG_PASSWORD: &str = "LINEAGE_CATALOG_PASSWORD";

fn default_operator() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn default_source_cluster() -> String {
    "default".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_database_path() -> PathBuf {
    PathBuf::from("warehouse.duckdb")
}

fn default_store_cluster() -> String {
    "duckdb".to_string()
}

fn default_progress_interval() -> usize {
    1000
}

/// Logical pipeline identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Logical name; keys the process entity
    pub name: String,
    /// Operator recorded on the process entity and load runs
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Tabular input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Catalog natural key override; defaults to the path
    #[serde(default)]
    pub qualified_name: Option<String>,
    /// Cluster recorded on the source artifact
    #[serde(default = "default_source_cluster")]
    pub cluster: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Default `chrono` format for temporal columns
    #[serde(default)]
    pub timestamp_format: Option<String>,
}

/// Target store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// DuckDB file. Only one process can hold it open at a time, so
    /// pipelines that run concurrently need separate files.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Logical database name used in lineage; defaults to the file stem
    #[serde(default)]
    pub database: Option<String>,
    pub table: String,
    /// Namespace suffix of database and table qualified names
    #[serde(default = "default_store_cluster")]
    pub cluster: String,
}

impl StoreConfig {
    /// Logical database name
    pub fn database_name(&self) -> String {
        self.database.clone().unwrap_or_else(|| {
            self.database_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string())
        })
    }
}

/// Metadata catalog connection
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub endpoint: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub types: CatalogTypes,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:21000".to_string(),
            username: "admin".to_string(),
            password: None,
            timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 200,
            types: CatalogTypes::default(),
        }
    }
}

// Keep the password out of logs
impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("types", &self.types)
            .finish()
    }
}

impl CatalogConfig {
    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_CATALOG_URL).filter(|v| !v.is_empty()) {
            self.endpoint = url;
        }
        if let Some(user) = lookup(ENV_CATALOG_USER).filter(|v| !v.is_empty()) {
            self.username = user;
        }
        if let Some(password) = lookup(ENV_CATALOG_PASSWORD) {
            self.password = Some(password);
        }
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy for transient failures
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_backoff(Duration::from_millis(self.initial_backoff_ms))
    }

    /// Check the endpoint and credentials are usable
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!(
                "catalog.endpoint '{}' must start with http:// or https://",
                self.endpoint
            ));
        }
        if self.username.is_empty() {
            return Err("catalog.username is required".to_string());
        }
        if self.password.is_none() {
            return Err(format!(
                "catalog.password is not set (set it in the file or via {})",
                ENV_CATALOG_PASSWORD
            ));
        }
        if self.max_attempts == 0 {
            return Err("catalog.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Build an Atlas client from this configuration
    #[cfg(feature = "atlas-client")]
    pub fn connect(&self) -> Result<crate::catalog::AtlasClient, crate::catalog::CatalogError> {
        use crate::catalog::{AtlasClient, CatalogCredentials, CatalogError};

        self.validate().map_err(CatalogError::Config)?;
        let credentials = CatalogCredentials::new(
            &self.username,
            self.password.clone().unwrap_or_default(),
        );
        Ok(AtlasClient::new(&self.endpoint, credentials, self.timeout())?
            .with_retry_policy(self.retry_policy()))
    }
}

/// Complete configuration of one logical pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub source: SourceConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub schema: TargetSchema,
    #[serde(default)]
    pub mapping: ColumnMapping,
    /// Rows between load progress log lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl PipelineConfig {
    /// Create a config with defaults for everything optional
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        table: impl Into<String>,
        schema: TargetSchema,
    ) -> Self {
        Self {
            pipeline: PipelineSection {
                name: name.into(),
                operator: default_operator(),
                description: None,
            },
            source: SourceConfig {
                path: source.into(),
                qualified_name: None,
                cluster: default_source_cluster(),
                delimiter: default_delimiter(),
                timestamp_format: None,
            },
            store: StoreConfig {
                database_path: default_database_path(),
                database: None,
                table: table.into(),
                cluster: default_store_cluster(),
            },
            catalog: CatalogConfig::default(),
            schema,
            mapping: ColumnMapping::default(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Load from a TOML file, applying environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io_with_path(path, "reading configuration", e))?;
        let mut config = Self::from_toml(&text)?;
        config.catalog.apply_env();
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }

    /// Parse TOML text (no environment overrides, no validation)
    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Set the input path
    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.path = path.into();
        self
    }

    /// Set the store database file
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.database_path = path.into();
        self
    }

    /// Set the logical database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.store.database = Some(database.into());
        self
    }

    /// Set the store cluster name
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.store.cluster = cluster.into();
        self
    }

    /// Set the operator
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.pipeline.operator = operator.into();
        self
    }

    /// Set the process description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.pipeline.description = Some(description.into());
        self
    }

    /// Set the column mapping
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Set the catalog connection
    pub fn with_catalog(mut self, catalog: CatalogConfig) -> Self {
        self.catalog = catalog;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.pipeline.name.trim().is_empty() {
            return Err("pipeline.name is required".to_string());
        }
        if self.pipeline.operator.trim().is_empty() {
            return Err("pipeline.operator must not be empty".to_string());
        }
        if self.source.path.as_os_str().is_empty() {
            return Err("source.path is required".to_string());
        }
        if !self.source.delimiter.is_ascii() {
            return Err(format!(
                "source.delimiter '{}' must be a single ASCII character",
                self.source.delimiter
            ));
        }
        if self.store.table.trim().is_empty() {
            return Err("store.table is required".to_string());
        }
        if self.store.cluster.trim().is_empty() {
            return Err("store.cluster must not be empty".to_string());
        }
        self.schema.validate().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Process description, derived when not configured
    pub fn description(&self) -> String {
        self.pipeline.description.clone().unwrap_or_else(|| {
            format!(
                "Load {} into {}",
                self.source.path.display(),
                self.store.table
            )
        })
    }

    /// Reader options for the input
    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            delimiter: self.source.delimiter as u8,
        }
    }

    /// Qualified-name derivation for lineage entities
    pub fn lineage_names(&self) -> LineageNames {
        LineageNames::new(&self.store.cluster, self.catalog.types.clone())
    }

    /// Source artifact for a given input path
    pub fn source_artifact(&self, path: &str, content_hash: Option<String>) -> SourceArtifact {
        SourceArtifact::new(path)
            .with_qualified_name(self.source.qualified_name.clone())
            .with_cluster(&self.source.cluster)
            .with_content_hash(content_hash)
    }

    /// Target table for lineage
    pub fn target_table(&self) -> TargetTable {
        TargetTable::new(self.store.database_name(), &self.store.table)
    }
}
