//! Driver service management - spawning and health checking a local
//! chromedriver/geckodriver

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{FlowError, FlowResult};
use crate::webdriver::WebDriverConfig;

/// Handle to a running WebDriver server process
pub struct DriverService {
    child: Child,
    url: String,
    port: u16,
}

impl DriverService {
    /// Spawn the driver binary and wait until it accepts sessions
    pub async fn spawn(config: DriverServiceConfig) -> FlowResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let child = launch(&config, port)?;
        let service = DriverService { child, url, port };
        service.wait_for_ready(config.startup_timeout).await?;

        info!("WebDriver service ready at {}", service.url);
        Ok(service)
    }

    /// Poll `/status` until the driver reports it is ready
    async fn wait_for_ready(&self, timeout_duration: Duration) -> FlowResult<()> {
        let status_url = format!("{}/status", self.url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: serde_json::Value = resp.json().await?;
                    if is_ready(&body) {
                        return Ok(());
                    }
                    debug!("Driver answered but is not ready yet");
                }
                Ok(resp) => {
                    warn!("Status check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for WebDriver service to start...");
                    }
                    if !e.is_connect() {
                        warn!("Status check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(FlowError::DriverServiceHealthCheck(attempts))
    }

    /// URL sessions should be opened against
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop the driver: SIGTERM first, kill if it lingers
    pub fn stop(&mut self) -> FlowResult<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }
        info!("Stopping WebDriver service (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                let deadline = Instant::now() + Duration::from_secs(2);
                while Instant::now() < deadline {
                    if let Ok(Some(_)) = self.child.try_wait() {
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }

        let _ = self.child.kill();
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for DriverService {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverServiceConfig {
    /// Path to chromedriver or geckodriver
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Timeout for the driver to report ready
    pub startup_timeout: Duration,

    pub extra_args: Vec<String>,
}

impl DriverServiceConfig {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            port: None,
            startup_timeout: Duration::from_secs(15),
            extra_args: Vec::new(),
        }
    }

    /// Derive from the `[webdriver]` section; `None` when no binary is configured
    pub fn from_webdriver(config: &WebDriverConfig) -> Option<Self> {
        let binary = config.driver_binary.as_ref()?;
        Some(Self {
            startup_timeout: Duration::from_millis(config.startup_timeout_ms),
            ..Self::new(binary)
        })
    }
}

/// Start the driver process with its stderr drained into the log
fn launch(config: &DriverServiceConfig, port: u16) -> FlowResult<Child> {
    let mut child = Command::new(&config.binary_path)
        .arg(format!("--port={}", port))
        .args(&config.extra_args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            FlowError::DriverService(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

    // An unread pipe fills up and blocks the driver on its next write
    if let Some(stderr) = child.stderr.take() {
        std::thread::Builder::new()
            .name("driver-stderr".into())
            .spawn(move || forward_lines(stderr))?;
    }
    Ok(child)
}

fn forward_lines(stream: impl Read) {
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) => debug!(target: "uiflow::driver", "{}", line),
            Err(_) => break,
        }
    }
}

/// `/status` bodies look like `{"value": {"ready": true, ...}}`
fn is_ready(body: &serde_json::Value) -> bool {
    body.pointer("/value/ready")
        .and_then(|r| r.as_bool())
        .unwrap_or(true)
}

/// Find a free port to use
fn find_free_port() -> FlowResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
