//! Lineage registration outcome

use serde::{Deserialize, Serialize};

/// Node of the lineage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityRole {
    Source,
    Database,
    Table,
    Process,
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRole::Source => write!(f, "source"),
            EntityRole::Database => write!(f, "database"),
            EntityRole::Table => write!(f, "table"),
            EntityRole::Process => write!(f, "process"),
        }
    }
}

/// What happened to one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Created,
    /// Already present, left unchanged
    Reused,
    Failed,
    /// Not attempted because an entity it references failed
    Skipped,
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityStatus::Created => write!(f, "created"),
            EntityStatus::Reused => write!(f, "reused"),
            EntityStatus::Failed => write!(f, "failed"),
            EntityStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOutcome {
    pub role: EntityRole,
    pub type_name: String,
    pub qualified_name: String,
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-entity results of a registration, in resolution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageReport {
    pub entities: Vec<EntityOutcome>,
}

impl LineageReport {
    fn count(&self, status: EntityStatus) -> usize {
        self.entities.iter().filter(|e| e.status == status).count()
    }

    pub fn created(&self) -> usize {
        self.count(EntityStatus::Created)
    }

    pub fn reused(&self) -> usize {
        self.count(EntityStatus::Reused)
    }

    pub fn failed(&self) -> usize {
        self.count(EntityStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(EntityStatus::Skipped)
    }

    /// Every entity and edge is in the catalog
    pub fn is_complete(&self) -> bool {
        !self.entities.is_empty() && self.failed() == 0 && self.skipped() == 0
    }

    /// Outcome for a graph node
    pub fn outcome(&self, role: EntityRole) -> Option<&EntityOutcome> {
        self.entities.iter().find(|e| e.role == role)
    }

    /// First failure message
    pub fn first_error(&self) -> Option<&str> {
        self.entities
            .iter()
            .filter(|e| e.status == EntityStatus::Failed)
            .find_map(|e| e.error.as_deref())
    }
}
