//! Persisted run reports under `.provcheck/runs/`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::engine::ProvisioningOptions;
use crate::lifecycle::{HarnessReport, Outcome, RunState, TeardownResult, TestRun, Verdict};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub options: ProvisioningOptions,
    pub subscription_id: String,
    pub final_state: RunState,
    pub verdict: Verdict,
    pub outcome: Outcome,
    pub teardown: TeardownResult,
    pub phase_duration_secs: f64,
    pub teardown_duration_secs: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl RunReport {
    pub fn new(run: &TestRun, report: &HarnessReport, started_at: DateTime<Utc>) -> Self {
        let mut options = run.options().clone();
        // Credentials may travel through the engine environment; keep them out of reports.
        options.env.clear();
        Self {
            run_id: run.id(),
            started_at,
            ended_at: Utc::now(),
            options,
            subscription_id: run.subscription_id().to_string(),
            final_state: run.state(),
            verdict: report.verdict(),
            outcome: report.outcome.clone(),
            teardown: report.teardown.clone(),
            phase_duration_secs: report.phase_duration.as_secs_f64(),
            teardown_duration_secs: report.teardown_duration.as_secs_f64(),
            diagnostics: report.diagnostics(),
        }
    }
}

pub struct ReportLogger {
    runs_dir: PathBuf,
}

impl ReportLogger {
    pub fn new(runs_dir: &Path) -> Self {
        Self {
            runs_dir: runs_dir.to_path_buf(),
        }
    }

    fn path_for(&self, run_id: Uuid) -> PathBuf {
        self.runs_dir.join(format!("{}.json", run_id))
    }

    pub fn save(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.runs_dir).context("Failed to create runs directory")?;
        let path = self.path_for(report.run_id);
        let content = serde_json::to_string_pretty(report)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write run report: {}", path.display()))?;
        Ok(path)
    }

    pub fn load(&self, run_id: Uuid) -> Result<RunReport> {
        let path = self.path_for(run_id);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("No run report at {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse run report")
    }

    /// All reports, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<RunReport>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut reports: Vec<RunReport> = fs::read_dir(&self.runs_dir)
            .context("Failed to read runs directory")?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| fs::read_to_string(path).ok())
            .filter_map(|content| serde_json::from_str(&content).ok())
            .collect();

        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(reports)
    }
}
