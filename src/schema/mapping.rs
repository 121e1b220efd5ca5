//! Source-to-target column mapping table

use serde::{Deserialize, Serialize};

/// One explicit mapping from an input column to a target column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Input column name
    pub source: String,
    /// Target column name
    pub target: String,
    /// `chrono` format for temporal columns, overriding the run default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Static column-mapping table
///
/// Target columns without an entry map to the input column of the same name
/// (exact match first, then case-insensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    pub entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    /// Identity mapping
    pub fn identity() -> Self {
        Self::default()
    }

    /// Add a rename
    pub fn rename(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries.push(MappingEntry {
            source: source.into(),
            target: target.into(),
            format: None,
        });
        self
    }

    /// Add a mapping with a temporal format
    pub fn with_format(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        self.entries.push(MappingEntry {
            source: source.into(),
            target: target.into(),
            format: Some(format.into()),
        });
        self
    }

    /// Entry feeding a target column, if any
    pub fn for_target(&self, target: &str) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.target == target)
    }
}
