//! Catalog client abstraction

use std::sync::Arc;

use super::entity::{CatalogEntity, ClassificationDef};
use super::error::CatalogError;

/// Create/read operations against a metadata catalog
///
/// Implementations own authentication, serialization and retry. Creating an
/// entity whose `(type_name, qualified_name)` already exists must fail with
/// [`CatalogError::Conflict`].
pub trait CatalogClient: Send + Sync {
    /// Look up an entity by its natural key
    fn get_entity(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> Result<Option<CatalogEntity>, CatalogError>;

    /// Create an entity, returning it with its catalog id
    fn create_entity(&self, entity: &CatalogEntity) -> Result<CatalogEntity, CatalogError>;

    /// Create a classification type definition
    fn create_classification(&self, def: &ClassificationDef) -> Result<(), CatalogError>;
}

impl<C: CatalogClient + ?Sized> CatalogClient for &C {
    fn get_entity(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        (**self).get_entity(type_name, qualified_name)
    }

    fn create_entity(&self, entity: &CatalogEntity) -> Result<CatalogEntity, CatalogError> {
        (**self).create_entity(entity)
    }

    fn create_classification(&self, def: &ClassificationDef) -> Result<(), CatalogError> {
        (**self).create_classification(def)
    }
}

impl<C: CatalogClient + ?Sized> CatalogClient for Arc<C> {
    fn get_entity(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        (**self).get_entity(type_name, qualified_name)
    }

    fn create_entity(&self, entity: &CatalogEntity) -> Result<CatalogEntity, CatalogError> {
        (**self).create_entity(entity)
    }

    fn create_classification(&self, def: &ClassificationDef) -> Result<(), CatalogError> {
        (**self).create_classification(def)
    }
}
