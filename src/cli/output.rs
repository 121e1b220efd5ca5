//! Output formatting for CLI

use lineage_ingest::pipeline::RunSummary;
use lineage_ingest::store::LoadRun;
use lineage_ingest::store::progress::format_number;

/// Summary as pretty JSON
pub fn summary_json(summary: &RunSummary) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Fixed-width table of recorded runs, newest first
pub fn format_runs(runs: &[LoadRun]) -> String {
    if runs.is_empty() {
        return "No load runs recorded.\n".to_string();
    }

    let mut output = format!(
        "{:<36}  {:<16}  {:<9}  {:>10}  {:>10}  {:>10}  {}\n",
        "RUN", "PIPELINE", "STATUS", "SUCCEEDED", "FAILED", "REJECTED", "FINISHED"
    );
    for run in runs {
        output.push_str(&format!(
            "{:<36}  {:<16}  {:<9}  {:>10}  {:>10}  {:>10}  {}\n",
            run.run_id,
            truncate(&run.pipeline, 16),
            run.status,
            format_number(run.rows_succeeded.max(0) as u64),
            format_number(run.rows_failed.max(0) as u64),
            format_number(run.rows_rejected.max(0) as u64),
            run.finished_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    output
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width - 1).collect();
        out.push('…');
        out
    }
}
