//! Get-or-create entity resolution

use tracing::{debug, info, warn};

use super::client::CatalogClient;
use super::entity::CatalogEntity;
use super::error::CatalogError;

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// This call created the entity
    Created(CatalogEntity),
    /// The entity already existed and was left untouched
    Existing(CatalogEntity),
}

impl Resolved {
    /// The resolved entity
    pub fn entity(&self) -> &CatalogEntity {
        match self {
            Resolved::Created(e) | Resolved::Existing(e) => e,
        }
    }

    /// Take the resolved entity
    pub fn into_entity(self) -> CatalogEntity {
        match self {
            Resolved::Created(e) | Resolved::Existing(e) => e,
        }
    }

    /// Whether this call created the entity
    pub fn was_created(&self) -> bool {
        matches!(self, Resolved::Created(_))
    }
}

/// Resolves entity descriptions to catalog entities, creating at most one
/// entity per `(type_name, qualified_name)`
pub struct EntityResolver<'c, C: CatalogClient + ?Sized> {
    client: &'c C,
}

impl<'c, C: CatalogClient + ?Sized> EntityResolver<'c, C> {
    pub fn new(client: &'c C) -> Self {
        Self { client }
    }

    /// Return the existing entity, or create it from `description`
    ///
    /// An existing entity is returned unchanged. A create that conflicts with
    /// a concurrent writer is followed by one more read.
    pub fn resolve_or_create(&self, description: &CatalogEntity) -> Result<Resolved, CatalogError> {
        let type_name = description.type_name.as_str();
        let qualified_name = description.qualified_name.as_str();

        if let Some(existing) = self.client.get_entity(type_name, qualified_name)? {
            debug!(type_name, qualified_name, "Entity already in catalog");
            return Ok(Resolved::Existing(existing));
        }

        match self.client.create_entity(description) {
            Ok(created) => {
                info!(type_name, qualified_name, "Entity created");
                Ok(Resolved::Created(created))
            }
            Err(CatalogError::Conflict { .. }) => {
                warn!(
                    type_name,
                    qualified_name, "Create conflicted with a concurrent writer, re-reading"
                );
                self.client
                    .get_entity(type_name, qualified_name)?
                    .map(Resolved::Existing)
                    .ok_or_else(|| CatalogError::Unresolved {
                        type_name: type_name.to_string(),
                        qualified_name: qualified_name.to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }
}
