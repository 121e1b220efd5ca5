//! Error types for catalog operations

use thiserror::Error;

/// Errors from catalog requests and entity resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Catalog answered with a non-success status
    #[error("Catalog request failed with HTTP {status}: {body}")]
    Request { status: u16, body: String },

    /// Entity already exists (resolved internally by a second read)
    #[error("Entity {type_name} '{qualified_name}' already exists")]
    Conflict {
        type_name: String,
        qualified_name: String,
    },

    /// Network failure before a response arrived
    #[error("Catalog transport error: {0}")]
    Transport(String),

    /// Create conflicted but the entity still could not be read
    #[error("Entity {type_name} '{qualified_name}' conflicted on create but cannot be found")]
    Unresolved {
        type_name: String,
        qualified_name: String,
    },

    /// Response body could not be understood
    #[error("Invalid catalog response: {0}")]
    InvalidResponse(String),

    /// Client misconfigured
    #[error("Invalid catalog configuration: {0}")]
    Config(String),
}

impl CatalogError {
    /// Transport failures and 5xx responses may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Transport(_) => true,
            CatalogError::Request { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Request { status: 401, .. } | CatalogError::Request { status: 403, .. } => {
                format!(
                    "{self}\n\n\
                    Hint: Check catalog.username / catalog.password or LINEAGE_CATALOG_USER / LINEAGE_CATALOG_PASSWORD."
                )
            }
            CatalogError::Request { status: 404, .. } => format!(
                "{self}\n\n\
                Hint: Check that the entity types are defined in the catalog ([catalog.types])."
            ),
            CatalogError::Transport(_) => format!(
                "{self}\n\n\
                Hint: Check catalog.endpoint or LINEAGE_CATALOG_URL and that the catalog is running."
            ),
            _ => self.to_string(),
        }
    }
}
