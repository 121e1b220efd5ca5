//! Lineage registration: source artifact -> process -> target table

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn};

use super::names::LineageNames;
use super::report::{EntityOutcome, EntityRole, EntityStatus, LineageReport};
use crate::catalog::{CatalogClient, CatalogEntity, EntityRef, EntityResolver, Resolved};
use crate::store::LoadResult;

/// The input artifact a load read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArtifact {
    /// Location of the input
    pub path: String,
    /// Natural key override; defaults to the path
    pub qualified_name: Option<String>,
    pub cluster: String,
    /// SHA-256 of the input, recorded at creation
    pub content_hash: Option<String>,
}

impl SourceArtifact {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            qualified_name: None,
            cluster: "default".to_string(),
            content_hash: None,
        }
    }

    pub fn with_qualified_name(mut self, qualified_name: Option<String>) -> Self {
        self.qualified_name = qualified_name;
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn with_content_hash(mut self, hash: Option<String>) -> Self {
        self.content_hash = hash;
        self
    }

    /// Catalog natural key
    pub fn qualified_name(&self) -> &str {
        self.qualified_name.as_deref().unwrap_or(&self.path)
    }

    /// File name component of the path
    pub fn name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// The table a load wrote into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    pub database: String,
    pub table: String,
}

impl TargetTable {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

/// Facts about the run that moved the data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetadata {
    /// Logical pipeline name; the process entity is keyed on it
    pub pipeline: String,
    pub description: String,
    pub operator: String,
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Materializes the lineage graph for a completed load
pub struct LineageRegistrar<'c, C: CatalogClient + ?Sized> {
    resolver: EntityResolver<'c, C>,
    names: LineageNames,
}

impl<'c, C: CatalogClient + ?Sized> LineageRegistrar<'c, C> {
    pub fn new(client: &'c C, names: LineageNames) -> Self {
        Self {
            resolver: EntityResolver::new(client),
            names,
        }
    }

    pub fn names(&self) -> &LineageNames {
        &self.names
    }

    /// Resolve source, database, table and process entities in that order
    ///
    /// Failures are recorded in the report, never returned: the load they
    /// describe is already committed. An entity whose references failed is
    /// skipped rather than created with a dangling reference.
    pub fn register(
        &self,
        source: &SourceArtifact,
        target: &TargetTable,
        load: &LoadResult,
        run: &RunMetadata,
    ) -> LineageReport {
        let span = info_span!("lineage", pipeline = %run.pipeline, run_id = %run.run_id);
        let _guard = span.enter();

        let mut report = LineageReport::default();

        let source_ref = self.resolve(&mut report, EntityRole::Source, self.source_entity(source));

        let db_ref = self.resolve(
            &mut report,
            EntityRole::Database,
            self.database_entity(&target.database),
        );

        let table_ref = match db_ref {
            Some(db) => self.resolve(&mut report, EntityRole::Table, self.table_entity(target, db, run)),
            None => {
                skip(
                    &mut report,
                    EntityRole::Table,
                    self.names.table_ref(&target.database, &target.table),
                    EntityRole::Database,
                );
                None
            }
        };

        let process_ref = self.names.process_ref(&run.pipeline);
        match (source_ref, table_ref) {
            (Some(input), Some(output)) => {
                let process = self.process_entity(source, input, output, load, run);
                self.resolve(&mut report, EntityRole::Process, process);
            }
            (None, _) => skip(&mut report, EntityRole::Process, process_ref, EntityRole::Source),
            (_, None) => skip(&mut report, EntityRole::Process, process_ref, EntityRole::Table),
        }

        if report.is_complete() {
            info!(
                created = report.created(),
                reused = report.reused(),
                "Lineage registered"
            );
        } else {
            warn!(
                failed = report.failed(),
                skipped = report.skipped(),
                "Lineage registration incomplete"
            );
        }
        report
    }

    fn resolve(
        &self,
        report: &mut LineageReport,
        role: EntityRole,
        description: CatalogEntity,
    ) -> Option<EntityRef> {
        let entity_ref = description.entity_ref();
        let (status, guid, error) = match self.resolver.resolve_or_create(&description) {
            Ok(Resolved::Created(e)) => (EntityStatus::Created, e.guid, None),
            Ok(Resolved::Existing(e)) => (EntityStatus::Reused, e.guid, None),
            Err(e) => {
                warn!(%role, entity = %entity_ref, error = %e, "Failed to resolve lineage entity");
                (EntityStatus::Failed, None, Some(e.to_string()))
            }
        };

        report.entities.push(EntityOutcome {
            role,
            type_name: entity_ref.type_name.clone(),
            qualified_name: entity_ref.qualified_name.clone(),
            status,
            guid,
            error,
        });

        (status != EntityStatus::Failed).then_some(entity_ref)
    }

    fn source_entity(&self, source: &SourceArtifact) -> CatalogEntity {
        CatalogEntity::new(&self.names.types.source, source.qualified_name())
            .with_attribute("name", source.name())
            .with_attribute("path", source.path.as_str())
            .with_attribute("clusterName", source.cluster.as_str())
            .with_optional_attribute("contentHash", source.content_hash.clone())
    }

    fn database_entity(&self, database: &str) -> CatalogEntity {
        CatalogEntity::new(
            &self.names.types.database,
            self.names.database_qualified_name(database),
        )
        .with_attribute("name", database)
        .with_attribute("clusterName", self.names.cluster.as_str())
        .with_attribute(
            "description",
            format!("Database {} on {}", database, self.names.cluster),
        )
    }

    fn table_entity(&self, target: &TargetTable, db: EntityRef, run: &RunMetadata) -> CatalogEntity {
        CatalogEntity::new(
            &self.names.types.table,
            self.names.table_qualified_name(&target.database, &target.table),
        )
        .with_attribute("name", target.table.as_str())
        .with_attribute(
            "description",
            format!("Table {} loaded by {}", target.table, run.pipeline),
        )
        .with_relationship("db", db)
    }

    fn process_entity(
        &self,
        source: &SourceArtifact,
        input: EntityRef,
        output: EntityRef,
        load: &LoadResult,
        run: &RunMetadata,
    ) -> CatalogEntity {
        CatalogEntity::new(
            &self.names.types.process,
            self.names.process_qualified_name(&run.pipeline),
        )
        .with_attribute("name", run.pipeline.as_str())
        .with_attribute("description", run.description.as_str())
        .with_attribute("userName", run.operator.as_str())
        .with_attribute("startTime", run.start_time.timestamp_millis())
        .with_attribute("endTime", run.end_time.timestamp_millis())
        .with_attribute("operationType", "ETL")
        .with_attribute(
            "queryText",
            format!("LOAD {} INTO {}", source.path, load.target_identifier),
        )
        .with_attribute(
            "queryPlan",
            format!(
                "row-level insert: {} attempted, {} succeeded, {} failed",
                load.rows_attempted, load.rows_succeeded, load.rows_failed
            ),
        )
        .with_attribute("queryId", run.run_id.as_str())
        .with_relationships("inputs", vec![input])
        .with_relationships("outputs", vec![output])
    }
}

fn skip(report: &mut LineageReport, role: EntityRole, entity: EntityRef, blocked_by: EntityRole) {
    warn!(%role, entity = %entity, %blocked_by, "Skipping lineage entity");
    report.entities.push(EntityOutcome {
        role,
        type_name: entity.type_name,
        qualified_name: entity.qualified_name,
        status: EntityStatus::Skipped,
        guid: None,
        error: Some(format!("{} entity was not registered", blocked_by)),
    });
}
