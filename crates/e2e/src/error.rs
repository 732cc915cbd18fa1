//! Error types for the UI-flow harness

use std::time::Duration;

use thiserror::Error;

use crate::assert::AssertionFailure;

/// Errors raised while loading scenarios, configuration, or writing reports.
///
/// These abort a run before (or after) any scenario executes. Failures that
/// happen while a scenario is running are [`StepError`]s instead.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Scenario parse error in {file}: {reason}")]
    SpecParse { file: String, reason: String },

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown target '{target}' in environment '{environment}'")]
    UnknownTarget { target: String, environment: String },

    #[error("WebDriver service failed to start: {0}")]
    DriverService(String),

    #[error("WebDriver service not ready after {0} attempts")]
    DriverServiceHealthCheck(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type FlowResult<T> = Result<T, FlowError>;

/// Errors reported by an automation engine.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("session could not be started: {0}")]
    SessionStart(String),

    #[error("stale element: {0}")]
    StaleElement(String),

    #[error("no dialog is open")]
    NoDialog,

    #[error("session is closed")]
    SessionClosed,

    #[error("{0}")]
    Command(String),
}

impl DriverError {
    /// Whether a poll loop may treat this error as "not yet" and try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::StaleElement(_) | DriverError::NoDialog)
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// A step-level failure. The runner converts these into a scenario outcome;
/// they never abort the run.
#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error("Session start failed: {0}")]
    SessionStart(String),

    #[error("Element not found: {selector} (waited {} ms)", timeout.as_millis())]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("Timed out after {} ms waiting for: {condition}", elapsed.as_millis())]
    ConditionTimeout { condition: String, elapsed: Duration },

    #[error("Assertion failed: {0}")]
    AssertionMismatch(Box<AssertionFailure>),

    #[error("Interaction error: {0}")]
    Interaction(String),
}

impl StepError {
    /// `true` when the step observed wrong behaviour, `false` when the harness
    /// or the target became unstable.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StepError::ElementNotFound { .. }
                | StepError::ConditionTimeout { .. }
                | StepError::AssertionMismatch(_)
        )
    }
}

impl From<DriverError> for StepError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::SessionStart(msg) => StepError::SessionStart(msg),
            other => StepError::Interaction(other.to_string()),
        }
    }
}

impl From<AssertionFailure> for StepError {
    fn from(f: AssertionFailure) -> Self {
        StepError::AssertionMismatch(Box::new(f))
    }
}
