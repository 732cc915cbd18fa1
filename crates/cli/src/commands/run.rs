//! `uiflow run`

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use uiflow_e2e::artifacts::ArtifactStore;
use uiflow_e2e::server::{DriverService, DriverServiceConfig};
use uiflow_e2e::webdriver::Browser;
use uiflow_e2e::{HarnessConfig, ScenarioRunner, WaitPolicy, WebDriverEngine};

use super::Selection;
use crate::output::{self, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Directory for results and screenshots (defaults to run.output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scenarios run at once, each in its own browser session
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// WebDriver server URL
    #[arg(long, env = "UIFLOW_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Spawn this chromedriver/geckodriver instead of using a running server
    #[arg(long, env = "UIFLOW_DRIVER_BINARY", value_name = "PATH")]
    pub spawn_driver: Option<PathBuf>,

    /// Browser to request
    #[arg(long, value_enum)]
    pub browser: Option<BrowserArg>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Default wait timeout in milliseconds
    #[arg(long)]
    pub wait_timeout_ms: Option<u64>,

    /// Do not capture screenshots of failed scenarios
    #[arg(long)]
    pub no_screenshots: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum BrowserArg {
    Chrome,
    Firefox,
}

impl From<BrowserArg> for Browser {
    fn from(b: BrowserArg) -> Self {
        match b {
            BrowserArg::Chrome => Browser::Chrome,
            BrowserArg::Firefox => Browser::Firefox,
        }
    }
}

impl RunArgs {
    /// Fold command-line overrides into the file configuration
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.webdriver_url {
            config.webdriver.url = url.clone();
        }
        if let Some(binary) = &self.spawn_driver {
            config.webdriver.driver_binary = Some(binary.clone());
        }
        if let Some(browser) = self.browser {
            config.webdriver.browser = browser.into();
        }
        if self.headed {
            config.webdriver.headless = false;
        }
        if let Some(ms) = self.wait_timeout_ms {
            config.wait.timeout_ms = ms;
        }
        if let Some(n) = self.concurrency {
            config.run.concurrency = n;
        }
        if let Some(dir) = &self.output {
            config.run.output_dir = dir.clone();
        }
        if self.no_screenshots {
            config.run.capture_screenshots = false;
        }
    }
}

pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> anyhow::Result<i32> {
    args.apply(&mut config);
    config.validate()?;

    let plan = args.selection.resolve(&config)?;
    let planned = plan.ordered();
    if planned.is_empty() {
        output::print_warning("No scenarios match the selection");
        return Ok(0);
    }

    // Kept alive until the run is over; dropping it stops the driver
    let service = match DriverServiceConfig::from_webdriver(&config.webdriver) {
        Some(service_config) => Some(DriverService::spawn(service_config).await?),
        None => None,
    };
    if let Some(service) = &service {
        config.webdriver.url = service.url().to_string();
    }
    info!("Using WebDriver at {}", config.webdriver.url);

    let mut runner = ScenarioRunner::new(WebDriverEngine::new(config.webdriver.clone()), plan.environment.clone())
        .with_wait_policy(WaitPolicy::from_config(&config.wait))
        .with_session_config(config.session)
        .with_concurrency(config.run.concurrency);

    if config.run.capture_screenshots {
        let store = ArtifactStore::new(&config.run.output_dir)?;
        store.clean()?;
        runner = runner.with_artifacts(store);
    }

    let summary = runner.run_planned(&planned).await;
    summary.write_json(&config.run.output_dir)?;
    drop(service);

    output::print_summary(&summary, format);

    Ok(summary.exit_code())
}
