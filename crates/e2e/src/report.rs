//! Run summaries

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FlowResult;
use crate::runner::{Outcome, ScenarioResult};

/// Results file written into the output directory
pub const RESULTS_FILE: &str = "uiflow-results.json";

/// Outcome counts for a set of scenarios
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Counts {
    fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Errored { .. } => self.errored += 1,
        }
    }
}

/// Aggregate report for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: String,
    pub environment: String,
    #[serde(flatten)]
    pub counts: Counts,
    pub duration_ms: u64,
    /// Counts per tag
    pub groups: BTreeMap<String, Counts>,
    /// Results in completion order
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.counts.failed == 0 && self.counts.errored == 0
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    /// Results that did not pass
    pub fn problems(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.outcome.is_passed())
    }

    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Write the summary as pretty JSON into `output_dir`
    pub fn write_json(&self, output_dir: &Path) -> FlowResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Fold scenario results into a summary
pub fn summarize(results: Vec<ScenarioResult>, environment: &str, duration: Duration) -> RunSummary {
    let mut counts = Counts::default();
    let mut groups: BTreeMap<String, Counts> = BTreeMap::new();

    for result in &results {
        counts.record(&result.outcome);
        for tag in &result.tags {
            groups.entry(tag.clone()).or_default().record(&result.outcome);
        }
    }

    RunSummary {
        started_at: (chrono::Utc::now() - chrono::Duration::milliseconds(duration.as_millis() as i64))
            .to_rfc3339(),
        environment: environment.to_string(),
        counts,
        duration_ms: duration.as_millis() as u64,
        groups,
        results,
    }
}
