//! Scenario runner: one session per scenario, steps in order, outcomes folded
//! into a run summary

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::artifacts::{Artifact, ArtifactStore};
use crate::assert::{check, observe, AssertContext, AssertionFailure};
use crate::config::Environment;
use crate::driver::{Engine, Gesture, Page};
use crate::error::StepError;
use crate::filter::ScenarioFilter;
use crate::report::{summarize, RunSummary};
use crate::session::{Session, SessionConfig, SessionManager};
use crate::spec::{Action, Condition, Scenario, Selector, Step};
use crate::wait::{WaitOutcome, WaitPolicy};

/// Final outcome of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    /// The target behaved differently than the scenario expects
    Failed {
        step_index: usize,
        step: String,
        reason: String,
    },
    /// The harness or target was unstable; `step_index` is `None` when no
    /// step had started (e.g. the session could not be opened)
    Errored {
        step_index: Option<usize>,
        step: Option<String>,
        cause: String,
    },
}

impl Outcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn state(&self) -> ScenarioState {
        match self {
            Outcome::Passed => ScenarioState::Passed,
            Outcome::Failed { .. } => ScenarioState::Failed,
            Outcome::Errored { .. } => ScenarioState::Errored,
        }
    }

    /// Index of the step that ended the scenario, if any
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { step_index, .. } => Some(*step_index),
            Outcome::Errored { step_index, .. } => *step_index,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { reason, .. } => Some(reason),
            Outcome::Errored { cause, .. } => Some(cause),
        }
    }
}

/// Per-scenario lifecycle: `Pending -> Running -> {Passed, Failed, Errored}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    Running,
    Passed,
    Failed,
    Errored,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioState::Passed | ScenarioState::Failed | ScenarioState::Errored)
    }

    pub fn can_advance_to(&self, next: ScenarioState) -> bool {
        match self {
            ScenarioState::Pending => next == ScenarioState::Running,
            ScenarioState::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub target: String,
    pub tags: Vec<String>,
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// Steps that completed successfully
    pub steps_run: usize,
    pub session_id: Option<String>,
    pub screenshot: Option<Artifact>,
}

/// Collects results from concurrently finishing scenarios
#[derive(Debug, Default)]
struct ResultCollector {
    results: Mutex<Vec<ScenarioResult>>,
}

impl ResultCollector {
    fn push(&self, result: ScenarioResult) {
        self.results.lock().push(result);
    }

    fn into_inner(self) -> Vec<ScenarioResult> {
        self.results.into_inner()
    }
}

/// Runs scenarios against an automation engine
pub struct ScenarioRunner<E: Engine> {
    sessions: SessionManager<E>,
    wait: WaitPolicy,
    environment: Environment,
    concurrency: usize,
    artifacts: Option<ArtifactStore>,
    progress: Mutex<BTreeMap<String, ScenarioState>>,
}

impl<E: Engine> ScenarioRunner<E> {
    pub fn new(engine: E, environment: Environment) -> Self {
        Self {
            sessions: SessionManager::new(engine, SessionConfig::default()),
            wait: WaitPolicy::default(),
            environment,
            concurrency: 1,
            artifacts: None,
            progress: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.sessions.set_config(config);
        self
    }

    /// Run up to `n` scenarios at once, each in its own session
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Capture a screenshot for every scenario that does not pass
    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn sessions(&self) -> &SessionManager<E> {
        &self.sessions
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Last known lifecycle state of a scenario in the current run
    pub fn state(&self, name: &str) -> Option<ScenarioState> {
        self.progress.lock().get(name).copied()
    }

    /// Run every scenario selected by `filter`
    pub async fn run(&self, scenarios: &[Scenario], filter: &ScenarioFilter) -> RunSummary {
        let planned = filter.select(scenarios);
        self.run_planned(&planned).await
    }

    /// Run scenarios in exactly the given order
    pub async fn run_planned(&self, planned: &[&Scenario]) -> RunSummary {
        let start = Instant::now();
        {
            let mut progress = self.progress.lock();
            progress.clear();
            for s in planned {
                progress.insert(s.name.clone(), ScenarioState::Pending);
            }
        }

        info!(
            "Running {} scenario(s) against environment '{}'...",
            planned.len(),
            self.environment.name
        );

        let collector = ResultCollector::default();
        let sink = &collector;
        futures::stream::iter(planned.iter().copied())
            .for_each_concurrent(self.concurrency, move |scenario| {
                async move {
                    let result = self.run_scenario(scenario).await;
                    match &result.outcome {
                        Outcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                        other => error!(
                            "✗ {} - {}",
                            result.name,
                            other.message().unwrap_or("unknown error")
                        ),
                    }
                    sink.push(result);
                }
            })
            .await;

        let summary = summarize(collector.into_inner(), &self.environment.name, start.elapsed());
        info!(
            "Scenario results: {} passed, {} failed, {} errored ({} ms)",
            summary.counts.passed, summary.counts.failed, summary.counts.errored, summary.duration_ms
        );
        summary
    }

    /// Run one scenario in a fresh session
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        self.advance(&scenario.name, ScenarioState::Running);

        let mut result = ScenarioResult {
            name: scenario.name.clone(),
            target: scenario.target.clone(),
            tags: scenario.tags.iter().cloned().collect(),
            outcome: Outcome::Passed,
            duration_ms: 0,
            steps_run: 0,
            session_id: None,
            screenshot: None,
        };

        let session = match self.open_session(scenario).await {
            Ok(session) => session,
            Err(e) => {
                result.outcome = Outcome::Errored {
                    step_index: None,
                    step: None,
                    cause: e.to_string(),
                };
                return self.finish(result, start);
            }
        };
        result.session_id = Some(session.id().to_string());

        let span = info_span!("scenario", name = %scenario.name, session = %session.id());
        let current = AtomicUsize::new(0);
        let executed = AssertUnwindSafe(self.execute_steps(&session, scenario, &current))
            .catch_unwind()
            .instrument(span)
            .await;

        let index = current.load(Ordering::SeqCst);
        let describe = |i: usize| scenario.steps.get(i).map(Step::describe).unwrap_or_default();
        result.steps_run = index;
        result.outcome = match executed {
            Ok(Ok(())) => {
                result.steps_run = scenario.steps.len();
                Outcome::Passed
            }
            Ok(Err(e)) if e.is_failure() => Outcome::Failed {
                step_index: index,
                step: describe(index),
                reason: e.to_string(),
            },
            Ok(Err(e)) => Outcome::Errored {
                step_index: Some(index),
                step: Some(describe(index)),
                cause: e.to_string(),
            },
            Err(panic) => Outcome::Errored {
                step_index: Some(index),
                step: Some(describe(index)),
                cause: format!("step panicked: {}", panic_message(panic.as_ref())),
            },
        };

        if !result.outcome.is_passed() {
            result.screenshot = self.capture_failure(&session, &scenario.name).await;
        }
        self.sessions.release(session).await;

        self.finish(result, start)
    }

    async fn open_session(&self, scenario: &Scenario) -> Result<Session<E::Page>, StepError> {
        let base_url = self.environment.base_url(&scenario.target).ok_or_else(|| {
            StepError::SessionStart(format!(
                "no base URL for target '{}' in environment '{}'",
                scenario.target, self.environment.name
            ))
        })?;
        self.sessions.acquire(base_url).await
    }

    fn finish(&self, mut result: ScenarioResult, start: Instant) -> ScenarioResult {
        result.duration_ms = start.elapsed().as_millis() as u64;
        self.advance(&result.name, result.outcome.state());
        result
    }

    fn advance(&self, name: &str, next: ScenarioState) {
        let mut progress = self.progress.lock();
        let state = progress.entry(name.to_string()).or_insert(ScenarioState::Pending);
        if state.can_advance_to(next) {
            *state = next;
        } else {
            warn!("Ignoring state change {:?} -> {:?} for '{}'", state, next, name);
        }
    }

    async fn capture_failure(&self, session: &Session<E::Page>, scenario: &str) -> Option<Artifact> {
        let store = self.artifacts.as_ref()?;
        match timeout(self.wait.timeout(), session.page().screenshot()).await {
            Ok(Ok(png)) => match store.save_screenshot(scenario, &png) {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    warn!("Could not save screenshot for '{}': {}", scenario, e);
                    None
                }
            },
            Ok(Err(e)) => {
                warn!("Could not capture screenshot for '{}': {}", scenario, e);
                None
            }
            Err(_) => {
                warn!("Screenshot for '{}' timed out", scenario);
                None
            }
        }
    }

    async fn execute_steps(
        &self,
        session: &Session<E::Page>,
        scenario: &Scenario,
        current: &AtomicUsize,
    ) -> Result<(), StepError> {
        for (index, step) in scenario.steps.iter().enumerate() {
            current.store(index, Ordering::SeqCst);
            debug!("Step {}: {}", index, step.describe());
            self.execute_step(session, scenario, index, step).await?;
        }
        Ok(())
    }

    async fn execute_step(
        &self,
        session: &Session<E::Page>,
        scenario: &Scenario,
        index: usize,
        step: &Step,
    ) -> Result<(), StepError> {
        let page = session.page();

        match step {
            Step::Navigate { url, credentials } => {
                let url = session.resolve_url(url, credentials.as_ref())?;
                page.goto(url.as_str()).await?;
            }
            Step::Interact { target, action } => {
                let element = self.resolve_target(session, target).await?;
                let gesture = match action {
                    Action::Click => Gesture::Click,
                    Action::TypeText { text } => Gesture::TypeText(text),
                    Action::Clear => Gesture::Clear,
                    Action::SelectOption { value } => Gesture::SelectOption(value),
                    Action::Hover => Gesture::Hover,
                    Action::KeyPress { key } => Gesture::KeyPress(*key),
                    Action::DragTo { to } => {
                        let destination = self.resolve_target(session, to).await?;
                        page.interact(&element, Gesture::DragTo(&destination)).await?;
                        return Ok(());
                    }
                };
                page.interact(&element, gesture).await?;
            }
            Step::WaitFor { condition, timeout_ms } => {
                let elapsed = self
                    .wait
                    .require(session, condition, timeout_ms.map(Duration::from_millis))
                    .await?;
                debug!("Condition met after {} ms", elapsed.as_millis());
            }
            Step::Assert { source, expect, within_ms } => {
                let subject = source
                    .selector()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| source.to_string());
                let ctx = AssertContext::new(&scenario.name, index, subject);
                let last_failure: Mutex<Option<AssertionFailure>> = Mutex::new(None);
                let (ctx_ref, failure_slot) = (&ctx, &last_failure);

                let outcome = self
                    .wait
                    .poll(self.wait.timeout_or_default(*within_ms), move || async move {
                        let observed = observe(session, source).await?;
                        match check(&observed, expect, ctx_ref) {
                            Ok(()) => Ok(Some(())),
                            Err(failure) => {
                                *failure_slot.lock() = Some(failure);
                                Ok(None)
                            }
                        }
                    })
                    .await?;

                if let WaitOutcome::TimedOut { elapsed, last_miss } = outcome {
                    return Err(match last_failure.into_inner() {
                        Some(failure) => failure.into(),
                        None => StepError::ConditionTimeout {
                            condition: format!(
                                "{} {} ({})",
                                source,
                                expect,
                                last_miss.unwrap_or_else(|| "never observed".to_string())
                            ),
                            elapsed,
                        },
                    });
                }
            }
            Step::Dialog { response, text } => {
                self.wait.require(session, &Condition::DialogOpen, None).await?;
                page.handle_dialog(*response, text.as_deref()).await?;
            }
        }
        Ok(())
    }

    /// Wait for an interaction target to exist
    async fn resolve_target(
        &self,
        session: &Session<E::Page>,
        selector: &Selector,
    ) -> Result<<E::Page as Page>::Element, StepError> {
        let limit = self.wait.timeout();
        match self.wait.poll(limit, || session.locate(selector)).await? {
            WaitOutcome::Met { value, .. } => Ok(value),
            WaitOutcome::TimedOut { .. } => Err(StepError::ElementNotFound {
                selector: selector.to_string(),
                timeout: limit,
            }),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
