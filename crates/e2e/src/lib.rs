//! uiflow - declarative UI-flow testing
//!
//! This crate runs browser scenarios described in YAML against web
//! applications:
//! - Opens one isolated WebDriver session per scenario
//! - Executes navigate/interact/wait/assert/dialog steps in order
//! - Bounds every wait with a polling policy instead of fixed sleeps
//! - Folds per-scenario outcomes into a run summary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ScenarioRunner<E: Engine>                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run(scenarios, filter) -> RunSummary                       │
//! │    └── for each scenario (sequential or bounded parallel)   │
//! │          ├── SessionManager::acquire(base_url) -> Session   │
//! │          ├── execute steps                                  │
//! │          │     ├── navigate { url, credentials? }           │
//! │          │     ├── interact { target, action }              │
//! │          │     ├── wait_for { until, timeout_ms? }          │
//! │          │     ├── assert { source, expect, within_ms? }    │
//! │          │     └── dialog { response, text? }               │
//! │          ├── screenshot on failure (ArtifactStore)          │
//! │          └── SessionManager::release(session)  (always)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Engine / Page traits                                       │
//! │    └── WebDriverEngine (fantoccini)   | test doubles        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod assert;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod report;
pub mod runner;
pub mod server;
pub mod session;
pub mod spec;
pub mod wait;
pub mod webdriver;

pub use config::{Environment, HarnessConfig};
pub use driver::{Engine, Page};
pub use error::{DriverError, DriverResult, FlowError, FlowResult, StepError};
pub use filter::ScenarioFilter;
pub use report::RunSummary;
pub use runner::{Outcome, ScenarioResult, ScenarioRunner};
pub use spec::{Scenario, Selector, Step};
pub use wait::WaitPolicy;
pub use webdriver::{WebDriverConfig, WebDriverEngine};
