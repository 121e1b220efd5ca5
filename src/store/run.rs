//! Load-run records kept in the store's ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::loader::LoadResult;

/// How a load ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// Every row was attempted
    Completed,
    /// Stopped between rows on request
    Cancelled,
    /// Stopped because the store became unusable or the source failed
    Aborted,
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStatus::Completed => write!(f, "completed"),
            LoadStatus::Cancelled => write!(f, "cancelled"),
            LoadStatus::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for LoadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(LoadStatus::Completed),
            "cancelled" => Ok(LoadStatus::Cancelled),
            "aborted" => Ok(LoadStatus::Aborted),
            _ => Err(format!("Invalid load status: {}", s)),
        }
    }
}

/// One row of the load-run ledger
///
/// Appended after every load so the lineage stage can be repeated on its own
/// from what was actually written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRun {
    /// Unique run identifier
    pub run_id: String,
    /// Logical pipeline name
    pub pipeline: String,
    /// Source artifact identifier
    pub source: String,
    /// Target container identifier
    pub target: String,
    /// SHA-256 of the input, when known
    pub content_hash: Option<String>,
    /// Operator who ran the load
    pub operator: String,
    pub rows_attempted: i64,
    pub rows_succeeded: i64,
    pub rows_failed: i64,
    /// Rows rejected before reaching the store
    pub rows_rejected: i64,
    pub first_error: Option<String>,
    pub status: LoadStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadRun {
    /// Generate a new run ID
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Build the ledger record for a finished load
    pub fn from_result(
        run_id: impl Into<String>,
        pipeline: impl Into<String>,
        source: impl Into<String>,
        operator: impl Into<String>,
        result: &LoadResult,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline: pipeline.into(),
            source: source.into(),
            target: result.target_identifier.clone(),
            content_hash: None,
            operator: operator.into(),
            rows_attempted: result.rows_attempted as i64,
            rows_succeeded: result.rows_succeeded as i64,
            rows_failed: result.rows_failed as i64,
            rows_rejected: 0,
            first_error: result.first_error.as_ref().map(|e| e.to_string()),
            status: result.status,
            started_at: result.started_at,
            finished_at: result.finished_at,
        }
    }

    /// Attach the input digest
    pub fn with_content_hash(mut self, hash: Option<String>) -> Self {
        self.content_hash = hash;
        self
    }

    /// Record rows rejected by validation
    pub fn with_rows_rejected(mut self, rejected: usize) -> Self {
        self.rows_rejected = rejected as i64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            LoadStatus::Completed,
            LoadStatus::Cancelled,
            LoadStatus::Aborted,
        ] {
            assert_eq!(status.to_string().parse::<LoadStatus>().unwrap(), status);
        }
        assert!("done".parse::<LoadStatus>().is_err());
    }

    #[test]
    fn test_from_result_copies_counts() {
        let now = Utc::now();
        let result = LoadResult {
            target_identifier: "orders".to_string(),
            rows_attempted: 5,
            rows_succeeded: 4,
            rows_failed: 1,
            first_error: None,
            errors: Vec::new(),
            status: LoadStatus::Completed,
            started_at: now,
            finished_at: now,
        };

        let run = LoadRun::from_result("r1", "daily", "/data/in.csv", "ops", &result)
            .with_rows_rejected(2)
            .with_content_hash(Some("abc".to_string()));

        assert_eq!(run.target, "orders");
        assert_eq!(run.rows_succeeded, 4);
        assert_eq!(run.rows_rejected, 2);
        assert_eq!(run.content_hash.as_deref(), Some("abc"));
        assert_eq!(run.status, LoadStatus::Completed);
    }
}
