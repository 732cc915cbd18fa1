//! Bounded polling for UI conditions

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

use crate::driver::{Page, Property};
use crate::error::{DriverResult, StepError};
use crate::session::Session;
use crate::spec::Condition;

/// Default time a condition may take to become true
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default delay between two probes
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Wait settings as they appear in configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    Met { value: T, elapsed: Duration },
    TimedOut { elapsed: Duration, last_miss: Option<String> },
}

impl<T> WaitOutcome<T> {
    pub fn is_met(&self) -> bool {
        matches!(self, WaitOutcome::Met { .. })
    }
}

/// Polls a probe at a fixed interval until it yields a value or the timeout
/// elapses. There is always a final probe at the deadline.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from_config(&WaitConfig::default())
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &WaitConfig) -> Self {
        Self::new(
            Duration::from_millis(config.timeout_ms),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolve a per-step override against the policy default
    pub fn timeout_or_default(&self, override_ms: Option<u64>) -> Duration {
        override_ms.map(Duration::from_millis).unwrap_or(self.timeout)
    }

    /// Run `probe` until it returns `Ok(Some(_))`.
    ///
    /// `Ok(None)` and transient driver errors mean "not yet". Any other
    /// error ends the wait immediately.
    pub async fn poll<T, F, Fut>(&self, limit: Duration, mut probe: F) -> DriverResult<WaitOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DriverResult<Option<T>>>,
    {
        let start = Instant::now();
        let deadline = start + limit;
        let mut last_miss = None;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let budget = deadline.saturating_duration_since(Instant::now()) + self.poll_interval;

            match timeout(budget, probe()).await {
                Ok(Ok(Some(value))) => {
                    trace!("Condition met after {} probe(s)", attempts);
                    return Ok(WaitOutcome::Met { value, elapsed: start.elapsed() });
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) if e.is_transient() => {
                    last_miss = Some(e.to_string());
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    last_miss = Some(format!("probe exceeded {} ms", budget.as_millis()));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Gave up after {} probe(s)", attempts);
                return Ok(WaitOutcome::TimedOut { elapsed: start.elapsed(), last_miss });
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Wait until `condition` holds on the session's page
    pub async fn wait_for<P: Page>(
        &self,
        session: &Session<P>,
        condition: &Condition,
        limit: Option<Duration>,
    ) -> DriverResult<WaitOutcome<()>> {
        let limit = limit.unwrap_or(self.timeout);
        self.poll(limit, || async move {
            evaluate(session, condition)
                .await
                .map(|holds| holds.then_some(()))
        })
        .await
    }

    /// Like [`wait_for`](Self::wait_for), but a timeout fails the step
    pub async fn require<P: Page>(
        &self,
        session: &Session<P>,
        condition: &Condition,
        limit: Option<Duration>,
    ) -> Result<Duration, StepError> {
        match self.wait_for(session, condition, limit).await? {
            WaitOutcome::Met { elapsed, .. } => Ok(elapsed),
            WaitOutcome::TimedOut { elapsed, last_miss } => {
                let mut condition = condition.to_string();
                if let Some(miss) = last_miss {
                    condition.push_str(&format!(" (last: {})", miss));
                }
                Err(StepError::ConditionTimeout { condition, elapsed })
            }
        }
    }
}

/// Evaluate a condition once against live page state
pub async fn evaluate<P: Page>(session: &Session<P>, condition: &Condition) -> DriverResult<bool> {
    let page = session.page();
    let holds = match condition {
        Condition::Present { selector } => session.locate(selector).await?.is_some(),
        Condition::Absent { selector } => session.locate(selector).await?.is_none(),
        Condition::Visible { selector } => match session.locate(selector).await? {
            Some(el) => page.inspect(&el, Property::Displayed).await?.as_flag(),
            None => false,
        },
        Condition::Clickable { selector } => match session.locate(selector).await? {
            Some(el) => {
                page.inspect(&el, Property::Displayed).await?.as_flag()
                    && page.inspect(&el, Property::Enabled).await?.as_flag()
            }
            None => false,
        },
        Condition::TextEquals { selector, text } => match session.locate(selector).await? {
            Some(el) => page.inspect(&el, Property::Text).await?.into_text().as_deref() == Some(text),
            None => false,
        },
        Condition::TextContains { selector, text } => match session.locate(selector).await? {
            Some(el) => page
                .inspect(&el, Property::Text)
                .await?
                .into_text()
                .map(|t| t.contains(text.as_str()))
                .unwrap_or(false),
            None => false,
        },
        Condition::Count { selector, count } => {
            page.find_all(&selector.locator).await?.len() == *count
        }
        Condition::UrlContains { fragment } => page.current_url().await?.contains(fragment.as_str()),
        Condition::DialogOpen => page.dialog_text().await?.is_some(),
    };
    Ok(holds)
}
