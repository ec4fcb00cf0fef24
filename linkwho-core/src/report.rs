//! Run summary rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task that failed without stopping its phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// `site:domain` for crawl tasks, `site:editor` for metadata tasks
    pub task: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: usize,
    pub domains: usize,
    pub pair_tasks: usize,
    pub failed_pair_tasks: Vec<TaskFailure>,
    pub usage_rows: usize,
    pub attributed_rows: usize,
    pub revision_scans: usize,
    pub unique_editors: usize,
    pub profiles: usize,
    pub contributions: usize,
    pub failed_editor_tasks: Vec<TaskFailure>,
    pub outputs: Vec<String>,
}

impl RunSummary {
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_pair_tasks.is_empty() || !self.failed_editor_tasks.is_empty()
    }
}

fn push_failures(report: &mut String, title: &str, failures: &[TaskFailure]) {
    if failures.is_empty() {
        return;
    }
    report.push_str(&format!("\n{} ({}):\n", title, failures.len()));
    for failure in failures {
        report.push_str(&format!("  [!] {}: {}\n", failure.task, failure.error));
    }
}

pub fn generate_text_report(summary: &RunSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!(
        "  Started:            {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("  Duration:           {} seconds\n", summary.duration_secs()));
    report.push_str(&format!(
        "  Sites x domains:    {} x {} = {} tasks\n",
        summary.sites, summary.domains, summary.pair_tasks
    ));
    report.push_str(&format!("  Link usages:        {}\n", summary.usage_rows));
    report.push_str(&format!("  With introducer:    {}\n", summary.attributed_rows));
    report.push_str(&format!("  History scans:      {}\n", summary.revision_scans));
    report.push_str(&format!("  Unique editors:     {}\n", summary.unique_editors));
    report.push_str(&format!("  Profiles fetched:   {}\n", summary.profiles));
    report.push_str(&format!("  Contributions:      {}\n", summary.contributions));

    push_failures(&mut report, "Failed crawl tasks", &summary.failed_pair_tasks);
    push_failures(&mut report, "Failed editor tasks", &summary.failed_editor_tasks);

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Outputs:\n");
    for output in &summary.outputs {
        report.push_str(&format!("  - {}\n", output));
    }

    report
}

pub fn generate_json_report(summary: &RunSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
