//! In-process catalog

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::client::CatalogClient;
use super::entity::{CatalogEntity, ClassificationDef};
use super::error::CatalogError;

/// Thread-safe catalog held in memory
///
/// Follows the same rules as a remote catalog: one entity per
/// `(type_name, qualified_name)`, a second create conflicts.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entities: Mutex<HashMap<(String, String), CatalogEntity>>,
    classifications: Mutex<BTreeSet<String>>,
    create_calls: AtomicUsize,
    next_guid: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities held
    pub fn len(&self) -> usize {
        self.entities.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the catalog holds no entities
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create calls received, successful or not
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// All entities, ordered by type then qualified name
    pub fn entities(&self) -> Vec<CatalogEntity> {
        let mut all: Vec<CatalogEntity> = self
            .entities
            .lock()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| {
            (a.type_name.as_str(), a.qualified_name.as_str())
                .cmp(&(b.type_name.as_str(), b.qualified_name.as_str()))
        });
        all
    }

    /// Classification names defined so far
    pub fn classifications(&self) -> Vec<String> {
        self.classifications
            .lock()
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> CatalogError {
    CatalogError::Transport("in-memory catalog lock poisoned".to_string())
}

impl CatalogClient for InMemoryCatalog {
    fn get_entity(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        let entities = self.entities.lock().map_err(|_| poisoned())?;
        Ok(entities
            .get(&(type_name.to_string(), qualified_name.to_string()))
            .cloned())
    }

    fn create_entity(&self, entity: &CatalogEntity) -> Result<CatalogEntity, CatalogError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let mut entities = self.entities.lock().map_err(|_| poisoned())?;
        let key = (entity.type_name.clone(), entity.qualified_name.clone());
        if entities.contains_key(&key) {
            return Err(CatalogError::Conflict {
                type_name: entity.type_name.clone(),
                qualified_name: entity.qualified_name.clone(),
            });
        }

        let n = self.next_guid.fetch_add(1, Ordering::SeqCst) + 1;
        let created = entity.clone().with_guid(format!("mem-{:06}", n));
        entities.insert(key, created.clone());
        Ok(created)
    }

    fn create_classification(&self, def: &ClassificationDef) -> Result<(), CatalogError> {
        let mut classifications = self.classifications.lock().map_err(|_| poisoned())?;
        if !classifications.insert(def.name.clone()) {
            return Err(CatalogError::Conflict {
                type_name: "classification".to_string(),
                qualified_name: def.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_create_conflicts() {
        let catalog = InMemoryCatalog::new();
        let entity = CatalogEntity::new("hdfs_path", "/data/in.csv");

        let created = catalog.create_entity(&entity).unwrap();
        assert!(created.guid.is_some());

        let err = catalog.create_entity(&entity).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { .. }));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.create_calls(), 2);
    }

    #[test]
    fn test_same_name_different_type_is_distinct() {
        let catalog = InMemoryCatalog::new();
        catalog
            .create_entity(&CatalogEntity::new("hive_db", "sales"))
            .unwrap();
        catalog
            .create_entity(&CatalogEntity::new("Table", "sales"))
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get_entity("Table", "sales").unwrap().is_some());
        assert!(catalog.get_entity("Table", "orders").unwrap().is_none());
    }

    #[test]
    fn test_classification_conflict() {
        let catalog = InMemoryCatalog::new();
        let def = ClassificationDef::new("PII", "Personal data");
        catalog.create_classification(&def).unwrap();
        assert!(catalog.create_classification(&def).is_err());
        assert_eq!(catalog.classifications(), vec!["PII".to_string()]);
    }
}
