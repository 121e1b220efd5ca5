//! Pipeline executor: ingest, then register lineage

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{error, info, info_span, warn};

use super::config::PipelineConfig;
use super::error::{PipelineError, PipelineResult};
use super::summary::{IngestSummary, RunStatus, RunSummary};
use crate::catalog::CatalogClient;
use crate::lineage::{LineageRegistrar, LineageReport, RunMetadata};
use crate::schema::SchemaValidator;
use crate::source::CsvRowSource;
use crate::store::{BulkLoader, LoadProgress, LoadResult, LoadRun, TargetStore};

/// Runs one logical pipeline against a store and a catalog
pub struct PipelineExecutor<'a, S: TargetStore + ?Sized, C: CatalogClient + ?Sized> {
    config: PipelineConfig,
    store: &'a S,
    catalog: &'a C,
    run_id: String,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, S: TargetStore + ?Sized, C: CatalogClient + ?Sized> PipelineExecutor<'a, S, C> {
    /// Create an executor; the configuration is validated here
    pub fn new(config: PipelineConfig, store: &'a S, catalog: &'a C) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            config,
            store,
            catalog,
            run_id: LoadRun::generate_id(),
            cancel: None,
        })
    }

    /// Stop loading between rows once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Identifier of this run
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run both stages
    pub fn run(&self) -> RunSummary {
        self.run_with_progress(|_| {})
    }

    /// Run both stages, reporting load progress after each row
    ///
    /// Never fails: errors end up in the summary with a `failed` or
    /// `partial` status.
    pub fn run_with_progress<F>(&self, on_progress: F) -> RunSummary
    where
        F: FnMut(&LoadProgress),
    {
        let _span = info_span!(
            "pipeline_run",
            pipeline = %self.config.pipeline.name,
            run_id = %self.run_id
        )
        .entered();

        let start = Instant::now();
        let started_at = Utc::now();
        let mut summary = self.new_summary();

        info!(
            source = %self.config.source.path.display(),
            table = %self.config.store.table,
            "Starting pipeline"
        );

        match self.ingest(on_progress) {
            Err(e) => {
                error!(error = %e, "Ingest failed");
                summary.status = RunStatus::Failed;
                summary.error = Some(e.user_message());
            }
            Ok(ingest) => {
                if let Some(reason) = &ingest.stop_reason {
                    let e = PipelineError::LoadIncomplete {
                        target: ingest.load.target_identifier.clone(),
                        reason: reason.clone(),
                    };
                    error!(error = %e, "Ingest aborted");
                    summary.status = RunStatus::Failed;
                    summary.error = Some(e.user_message());
                } else {
                    let report = self.register_lineage(
                        &summary.source,
                        ingest.content_hash.clone(),
                        &ingest.load,
                        &self.run_id,
                        &self.config.pipeline.operator,
                        started_at,
                    );
                    summary.status = if report.is_complete() {
                        RunStatus::Success
                    } else {
                        RunStatus::Partial
                    };
                    summary.error = report.first_error().map(|e| format!("Lineage: {}", e));
                    summary.lineage = Some(report);
                }
                summary.target = ingest.load.target_identifier.clone();
                summary.ingest = Some(ingest);
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            status = %summary.status,
            duration_ms = summary.duration_ms,
            "Pipeline finished"
        );
        summary
    }

    /// Ingest stage: read, validate, load and record the run
    ///
    /// Fatal errors (unreadable input, schema mismatch, container conflict)
    /// return before any row is written. A load stopped part way returns
    /// `Ok` with `stop_reason` set; committed rows stay.
    pub fn ingest<F>(&self, on_progress: F) -> PipelineResult<IngestSummary>
    where
        F: FnMut(&LoadProgress),
    {
        let _span = info_span!("ingest").entered();

        let source = CsvRowSource::open(&self.config.source.path, self.config.csv_options())?;
        let content_hash = source.content_hash().map(str::to_string);

        let validator = SchemaValidator::new(
            &self.config.schema,
            source.columns(),
            &self.config.mapping,
            self.config.source.timestamp_format.as_deref(),
        )?;

        let mut loader =
            BulkLoader::new(self.store).with_log_interval(self.config.progress_interval);
        if let Some(flag) = &self.cancel {
            loader = loader.with_cancel_flag(flag.clone());
        }
        let container = loader.ensure_container(&self.config.store.table, &self.config.schema)?;

        let mut rows = validator.validate_all(source);
        let mut load = loader.load_with_progress(&container, &mut rows, on_progress);

        let mut stop_reason = if load.is_complete() {
            None
        } else if load.cancelled() {
            Some("cancelled".to_string())
        } else {
            Some(
                load.first_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "store connection lost".to_string()),
            )
        };
        if let Some(fatal) = rows.take_fatal() {
            warn!(error = %fatal, "Input failed part way through");
            load = load.into_aborted();
            stop_reason = Some(fatal.to_string());
        }

        let ingest = IngestSummary {
            rows_read: rows.rows_read(),
            rows_rejected: rows.skipped(),
            rejections: rows.errors().iter().map(|e| e.to_string()).collect(),
            content_hash,
            load,
            stop_reason,
        };
        self.record_run(&ingest);

        info!(
            rows_read = ingest.rows_read,
            rejected = ingest.rows_rejected,
            succeeded = ingest.load.rows_succeeded,
            failed = ingest.load.rows_failed,
            "Ingest finished"
        );
        Ok(ingest)
    }

    fn record_run(&self, ingest: &IngestSummary) {
        let run = LoadRun::from_result(
            &self.run_id,
            &self.config.pipeline.name,
            source_identifier(&self.config.source.path),
            &self.config.pipeline.operator,
            &ingest.load,
        )
        .with_rows_rejected(ingest.rows_rejected)
        .with_content_hash(ingest.content_hash.clone());

        // Lineage can still be registered from this run, only the repair path is lost
        if let Err(e) = self.store.record_run(&run) {
            warn!(error = %e, "Failed to record load run");
        }
    }

    /// Lineage stage alone, from the last completed load in the ledger
    pub fn register_latest(&self) -> PipelineResult<RunSummary> {
        let _span = info_span!(
            "pipeline_register",
            pipeline = %self.config.pipeline.name
        )
        .entered();

        let start = Instant::now();
        let run = self
            .store
            .latest_completed_run(&self.config.pipeline.name)?
            .ok_or_else(|| PipelineError::NoLoadRecorded(self.config.pipeline.name.clone()))?;

        info!(run_id = %run.run_id, "Registering lineage for recorded load");

        let load = LoadResult::from_run(&run);
        let report = self.register_lineage(
            &run.source,
            run.content_hash.clone(),
            &load,
            &run.run_id,
            &run.operator,
            run.started_at,
        );

        let mut summary = self.new_summary();
        summary.run_id = run.run_id.clone();
        summary.source = run.source.clone();
        summary.target = run.target.clone();
        summary.status = if report.is_complete() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        summary.error = report.first_error().map(|e| format!("Lineage: {}", e));
        summary.lineage = Some(report);
        summary.ingest = Some(IngestSummary {
            rows_read: (run.rows_attempted + run.rows_rejected).max(0) as usize,
            rows_rejected: run.rows_rejected.max(0) as usize,
            rejections: Vec::new(),
            content_hash: run.content_hash.clone(),
            load,
            stop_reason: None,
        });
        summary.duration_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }

    fn register_lineage(
        &self,
        source: &str,
        content_hash: Option<String>,
        load: &LoadResult,
        run_id: &str,
        operator: &str,
        started_at: DateTime<Utc>,
    ) -> LineageReport {
        let registrar = LineageRegistrar::new(self.catalog, self.config.lineage_names());
        let metadata = RunMetadata {
            pipeline: self.config.pipeline.name.clone(),
            description: self.config.description(),
            operator: operator.to_string(),
            run_id: run_id.to_string(),
            start_time: started_at,
            end_time: load.finished_at,
        };

        registrar.register(
            &self.config.source_artifact(source, content_hash),
            &self.config.target_table(),
            load,
            &metadata,
        )
    }

    fn new_summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            pipeline: self.config.pipeline.name.clone(),
            status: RunStatus::Failed,
            config_hash: hash_config(&self.config),
            source: source_identifier(&self.config.source.path),
            target: self.config.store.table.clone(),
            ingest: None,
            lineage: None,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Stable identifier for an input path (absolute when it exists)
fn source_identifier(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Hash the config for change detection
fn hash_config(config: &PipelineConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(config).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}
