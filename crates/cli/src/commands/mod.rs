//! CLI Commands

pub mod list;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use uiflow_e2e::config::DEFAULT_ENVIRONMENT;
use uiflow_e2e::{Environment, HarnessConfig, Scenario, ScenarioFilter};

/// Which scenarios to load and select, shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct Selection {
    /// Environment whose base URLs are used
    #[arg(short, long, env = "UIFLOW_ENV", default_value = DEFAULT_ENVIRONMENT)]
    pub env: String,

    /// Override one target base URL, e.g. saucedemo=http://localhost:3000/
    #[arg(long = "target", value_name = "KEY=URL")]
    pub targets: Vec<String>,

    /// Only scenarios carrying every given tag; accepts "smoke & !slow"
    #[arg(short, long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Skip scenarios carrying any of these tags
    #[arg(long = "exclude-tag", value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Only the named scenarios
    #[arg(short, long = "name")]
    pub names: Vec<String>,

    /// Scenario directory (defaults to run.scenarios_dir)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Run in reverse of the normal order
    #[arg(long)]
    pub reverse: bool,
}

/// Scenarios, environment and filter resolved from config and flags
pub struct Plan {
    pub environment: Environment,
    pub scenarios: Vec<Scenario>,
    pub filter: ScenarioFilter,
    pub reverse: bool,
}

impl Plan {
    /// Scenarios in execution order
    pub fn ordered(&self) -> Vec<&Scenario> {
        let mut planned = self.filter.select(&self.scenarios);
        if self.reverse {
            planned.reverse();
        }
        planned
    }
}

impl Selection {
    pub fn scenarios_dir(&self, config: &HarnessConfig) -> PathBuf {
        self.scenarios.clone().unwrap_or_else(|| config.run.scenarios_dir.clone())
    }

    pub fn filter(&self) -> ScenarioFilter {
        let mut filter = ScenarioFilter::parse(&self.tags.join(" & "));
        for tag in &self.exclude_tags {
            filter = filter.exclude_tag(tag.trim());
        }
        for name in &self.names {
            filter = filter.name(name);
        }
        filter
    }

    /// Load scenarios and check every target resolves in the environment
    pub fn resolve(&self, config: &HarnessConfig) -> anyhow::Result<Plan> {
        let mut environment = config.environment(&self.env)?;
        for target in &self.targets {
            environment.override_target(target)?;
        }

        let dir = self.scenarios_dir(config);
        let scenarios = Scenario::load_all(&dir)
            .with_context(|| format!("loading scenarios from {}", dir.display()))?;
        environment.validate_targets(&scenarios)?;

        Ok(Plan {
            environment,
            scenarios,
            filter: self.filter(),
            reverse: self.reverse,
        })
    }
}
