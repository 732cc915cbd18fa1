//! Harness configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::session::SessionConfig;
use crate::spec::Scenario;
use crate::wait::WaitConfig;
use crate::webdriver::WebDriverConfig;

/// Environment used when none is named
pub const DEFAULT_ENVIRONMENT: &str = "public";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "uiflow.toml";

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// WebDriver server and browser settings
    pub webdriver: WebDriverConfig,

    /// Condition and assertion polling
    pub wait: WaitConfig,

    /// Session start/close bounds
    pub session: SessionConfig,

    /// Run-level settings
    pub run: RunConfig,

    /// Base URLs per target key, per environment
    pub environments: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let public = [
            ("herokuapp", "https://the-internet.herokuapp.com"),
            ("saucedemo", "https://www.saucedemo.com/"),
            ("todomvc", "https://todomvc.com/examples/react/dist/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut environments = BTreeMap::new();
        environments.insert(DEFAULT_ENVIRONMENT.to_string(), public);

        Self {
            webdriver: WebDriverConfig::default(),
            wait: WaitConfig::default(),
            session: SessionConfig::default(),
            run: RunConfig::default(),
            environments,
        }
    }
}

/// Run-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Scenarios executed at once; 1 is strictly sequential
    pub concurrency: usize,

    /// Directory scanned for scenario files
    pub scenarios_dir: PathBuf,

    /// Where results and screenshots are written
    pub output_dir: PathBuf,

    /// Capture a screenshot for every scenario that does not pass
    pub capture_screenshots: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("uiflow-output"),
            capture_screenshots: true,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> FlowResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> FlowResult<()> {
        if self.run.concurrency == 0 {
            return Err(FlowError::InvalidConfig("run.concurrency must be at least 1".into()));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(FlowError::InvalidConfig("wait.poll_interval_ms must be positive".into()));
        }
        if self.wait.poll_interval_ms > self.wait.timeout_ms {
            return Err(FlowError::InvalidConfig(format!(
                "wait.poll_interval_ms ({}) exceeds wait.timeout_ms ({})",
                self.wait.poll_interval_ms, self.wait.timeout_ms
            )));
        }
        for (env, targets) in &self.environments {
            for (key, url) in targets {
                url::Url::parse(url).map_err(|e| {
                    FlowError::InvalidConfig(format!(
                        "environments.{}.{}: invalid URL {:?}: {}",
                        env, key, url, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Resolve a named environment
    pub fn environment(&self, name: &str) -> FlowResult<Environment> {
        let targets = self.environments.get(name).ok_or_else(|| {
            FlowError::InvalidConfig(format!(
                "unknown environment '{}' (known: {})",
                name,
                self.environments.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?;
        Ok(Environment {
            name: name.to_string(),
            targets: targets.clone(),
        })
    }
}

/// Base URLs of the target applications for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub targets: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.targets.insert(key.into(), url.into());
        self
    }

    pub fn base_url(&self, target: &str) -> Option<&str> {
        self.targets.get(target).map(String::as_str)
    }

    /// Apply a `key=url` override as given on the command line
    pub fn override_target(&mut self, spec: &str) -> FlowResult<()> {
        let (key, url) = spec
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .ok_or_else(|| FlowError::InvalidConfig(format!("expected key=url, got {:?}", spec)))?;

        url::Url::parse(url)
            .map_err(|e| FlowError::InvalidConfig(format!("invalid URL for '{}': {}", key, e)))?;
        self.targets.insert(key.to_string(), url.to_string());
        Ok(())
    }

    /// Every scenario must name a target this environment knows
    pub fn validate_targets(&self, scenarios: &[Scenario]) -> FlowResult<()> {
        match scenarios.iter().find(|s| self.base_url(&s.target).is_none()) {
            Some(s) => Err(FlowError::UnknownTarget {
                target: s.target.clone(),
                environment: self.name.clone(),
            }),
            None => Ok(()),
        }
    }
}
