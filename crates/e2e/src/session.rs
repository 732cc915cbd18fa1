//! Browser session lifecycle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::driver::{Engine, Page};
use crate::error::{DriverResult, StepError};
use crate::spec::{Credentials, Selector};

/// Session lifecycle settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for starting a browser session
    pub start_timeout_ms: u64,

    /// Upper bound for closing a browser session
    pub close_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: 30_000,
            close_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// One isolated browser context bound to one scenario
pub struct Session<P: Page> {
    id: String,
    base_url: Url,
    page: P,
    state: SessionState,
}

impl<P: Page> Session<P> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Resolve a navigation target against the base URL.
    ///
    /// Absolute URLs are kept. Relative ones are appended to the base path,
    /// so `/` is the base URL itself even when it has a path component.
    pub fn resolve_url(&self, url: &str, credentials: Option<&Credentials>) -> Result<Url, StepError> {
        let invalid = |e: String| StepError::Interaction(format!("invalid URL {:?}: {}", url, e));

        let mut resolved = match Url::parse(url) {
            Ok(absolute) => absolute,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let mut base = self.base_url.clone();
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                base.join(url.trim_start_matches('/'))
                    .map_err(|e| invalid(e.to_string()))?
            }
            Err(e) => return Err(invalid(e.to_string())),
        };

        if let Some(creds) = credentials {
            resolved
                .set_username(&creds.username)
                .and_then(|_| resolved.set_password(Some(&creds.password)))
                .map_err(|_| invalid("URL cannot carry credentials".to_string()))?;
        }
        Ok(resolved)
    }

    /// Find the element a selector points at, honouring `nth`
    pub async fn locate(&self, selector: &Selector) -> DriverResult<Option<P::Element>> {
        match selector.index {
            None => self.page.find(&selector.locator).await,
            Some(n) => Ok(self.page.find_all(&selector.locator).await?.into_iter().nth(n)),
        }
    }
}

/// Creates a fresh session per scenario and always closes it again
pub struct SessionManager<E: Engine> {
    engine: E,
    config: SessionConfig,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl<E: Engine> SessionManager<E> {
    pub fn new(engine: E, config: SessionConfig) -> Self {
        Self {
            engine,
            config,
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Open a session whose relative navigations resolve against `base_url`
    pub async fn acquire(&self, base_url: &str) -> Result<Session<E::Page>, StepError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StepError::SessionStart(format!("invalid base URL {:?}: {}", base_url, e)))?;
        let limit = Duration::from_millis(self.config.start_timeout_ms);

        let page = match timeout(limit, self.engine.open_session()).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(StepError::SessionStart(e.to_string())),
            Err(_) => {
                return Err(StepError::SessionStart(format!(
                    "browser did not start within {} ms",
                    limit.as_millis()
                )))
            }
        };

        let id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
        self.opened.fetch_add(1, Ordering::SeqCst);
        info!(session = %id, base_url = %base_url, "Session opened");

        Ok(Session {
            id,
            base_url,
            page,
            state: SessionState::Open,
        })
    }

    /// Close a session. Failures are logged, never returned.
    pub async fn release(&self, mut session: Session<E::Page>) {
        if session.state == SessionState::Closed {
            return;
        }
        let limit = Duration::from_millis(self.config.close_timeout_ms);

        match timeout(limit, session.page.close()).await {
            Ok(Ok(())) => debug!(session = %session.id, "Session closed"),
            Ok(Err(e)) => warn!(session = %session.id, "Session close failed: {}", e),
            Err(_) => warn!(
                session = %session.id,
                "Session close did not finish within {} ms",
                limit.as_millis()
            ),
        }
        session.state = SessionState::Closed;
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    /// Sessions opened and released so far
    pub fn counts(&self) -> (usize, usize) {
        (self.opened.load(Ordering::SeqCst), self.closed.load(Ordering::SeqCst))
    }
}
