//! Run summary reported by every pipeline invocation

use std::fmt::Write as _;

use serde::Serialize;

use crate::lineage::LineageReport;
use crate::store::LoadResult;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Ingestion finished and lineage is fully registered
    Success,
    /// Ingestion finished but lineage registration failed
    Partial,
    /// Ingestion aborted
    Failed,
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::Partial => 2,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Counts from the ingest stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Data rows read from the input
    pub rows_read: usize,
    /// Rows rejected by schema validation
    pub rows_rejected: usize,
    /// Retained rejection messages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub load: LoadResult,
    /// Why the load stopped before the end of the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Outcome of a pipeline run, per stage
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub pipeline: String,
    pub status: RunStatus,
    /// Fingerprint of the configuration used
    pub config_hash: String,
    pub source: String,
    pub target: String,
    pub ingest: Option<IngestSummary>,
    pub lineage: Option<LineageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}.{:01}s", secs, (self.duration_ms % 1000) / 100)
        }
    }

    /// Render for console output
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Pipeline {} (run {}) - {}",
            self.pipeline, self.run_id, self.status
        );
        let _ = writeln!(out, "Duration: {}", self.duration_formatted());
        let _ = writeln!(out, "Ingest: {} -> {}", self.source, self.target);

        match &self.ingest {
            Some(ingest) => {
                let load = &ingest.load;
                let _ = writeln!(
                    out,
                    "  rows read: {}, rejected: {}",
                    ingest.rows_read, ingest.rows_rejected
                );
                let _ = writeln!(
                    out,
                    "  rows attempted: {}, succeeded: {}, failed: {}",
                    load.rows_attempted, load.rows_succeeded, load.rows_failed
                );
                if let Some(first) = ingest.rejections.first() {
                    let _ = writeln!(out, "  first rejection: {}", first);
                }
                if let Some(first) = &load.first_error {
                    let _ = writeln!(out, "  first write error: {}", first);
                }
                if let Some(reason) = &ingest.stop_reason {
                    let _ = writeln!(out, "  stopped: {}", reason);
                }
            }
            None => {
                let _ = writeln!(out, "  rows attempted: 0, succeeded: 0, failed: 0");
            }
        }

        match &self.lineage {
            Some(report) => {
                let _ = writeln!(
                    out,
                    "Lineage: created {}, reused {}, failed {}, skipped {}",
                    report.created(),
                    report.reused(),
                    report.failed(),
                    report.skipped()
                );
                for entity in &report.entities {
                    let _ = write!(
                        out,
                        "  - {} {} '{}': {}",
                        entity.role, entity.type_name, entity.qualified_name, entity.status
                    );
                    if let Some(error) = &entity.error {
                        let _ = write!(out, " ({})", error);
                    }
                    out.push('\n');
                }
            }
            None => {
                let _ = writeln!(out, "Lineage: not registered");
            }
        }

        if let Some(error) = &self.error {
            let _ = writeln!(out, "\nError: {}", error);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(status: RunStatus) -> RunSummary {
        RunSummary {
            run_id: "run-1".to_string(),
            pipeline: "daily".to_string(),
            status,
            config_hash: "abc".to_string(),
            source: "/data/in.csv".to_string(),
            target: "orders".to_string(),
            ingest: None,
            lineage: None,
            error: Some("Schema mismatch".to_string()),
            duration_ms: 65000,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
        assert_eq!(RunStatus::Partial.exit_code(), 2);
    }

    #[test]
    fn test_render_failed_run_still_reports_counts() {
        let text = summary(RunStatus::Failed).render();
        assert!(text.contains("daily"));
        assert!(text.contains("failed"));
        assert!(text.contains("rows attempted: 0"));
        assert!(text.contains("Lineage: not registered"));
        assert!(text.contains("Schema mismatch"));
    }

    #[test]
    fn test_duration_formatted() {
        let mut s = summary(RunStatus::Success);
        assert_eq!(s.duration_formatted(), "1m 5s");
        s.duration_ms = 1250;
        assert_eq!(s.duration_formatted(), "1.2s");
    }

    #[test]
    fn test_json_status_is_lowercase() {
        let json = serde_json::to_value(summary(RunStatus::Partial)).unwrap();
        assert_eq!(json["status"], "partial");
        assert_eq!(json["runId"], "run-1");
    }
}
