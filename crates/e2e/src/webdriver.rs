//! WebDriver engine backed by fantoccini

use std::path::PathBuf;

use async_trait::async_trait;
use fantoccini::actions::{InputSource, MouseActions, PointerAction};
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::key::Key as WdKey;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::driver::{Engine, Gesture, Page, Property, Value};
use crate::error::{DriverError, DriverResult};
use crate::spec::{DialogResponse, Key, Locator};

/// Browser requested from the WebDriver server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        }
    }
}

/// Configuration for WebDriver sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// WebDriver server URL
    pub url: String,
    pub browser: Browser,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,

    /// chromedriver/geckodriver to spawn instead of using `url`
    pub driver_binary: Option<PathBuf>,

    /// How long a spawned driver may take to report ready
    pub startup_timeout_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4444".to_string(),
            browser: Browser::Chrome,
            headless: true,
            window_width: 1280,
            window_height: 720,
            driver_binary: None,
            startup_timeout_ms: 15_000,
        }
    }
}

/// Opens one WebDriver session per scenario
#[derive(Debug, Clone)]
pub struct WebDriverEngine {
    config: WebDriverConfig,
}

impl WebDriverEngine {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }

    /// Point the engine at a different WebDriver server
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let window = format!(
            "--window-size={},{}",
            self.config.window_width, self.config.window_height
        );
        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!(self.config.browser.as_str()));

        match self.config.browser {
            Browser::Chrome => {
                let mut args = vec![window, "--disable-gpu".to_string()];
                if self.config.headless {
                    args.push("--headless=new".to_string());
                }
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
            Browser::Firefox => {
                let mut args = vec![
                    format!("--width={}", self.config.window_width),
                    format!("--height={}", self.config.window_height),
                ];
                if self.config.headless {
                    args.push("-headless".to_string());
                }
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
        }
        caps
    }
}

#[async_trait]
impl Engine for WebDriverEngine {
    type Page = WebDriverPage;

    async fn open_session(&self) -> DriverResult<WebDriverPage> {
        debug!("Connecting to WebDriver at {}", self.config.url);
        let client = ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(&self.config.url)
            .await
            .map_err(|e| DriverError::SessionStart(e.to_string()))?;
        Ok(WebDriverPage { client })
    }
}

/// A page in a live WebDriver session
pub struct WebDriverPage {
    client: Client,
}

fn wd_locator(locator: &Locator) -> WdLocator<'_> {
    match locator {
        Locator::Css(v) => WdLocator::Css(v),
        Locator::XPath(v) => WdLocator::XPath(v),
        Locator::Id(v) => WdLocator::Id(v),
        Locator::LinkText(v) => WdLocator::LinkText(v),
    }
}

fn wd_key(key: Key) -> String {
    let key = match key {
        Key::Enter => WdKey::Enter,
        Key::Tab => WdKey::Tab,
        Key::Escape => WdKey::Escape,
        Key::Backspace => WdKey::Backspace,
        Key::Delete => WdKey::Delete,
        Key::Space => WdKey::Space,
        Key::ArrowUp => WdKey::Up,
        Key::ArrowDown => WdKey::Down,
    };
    char::from(key).to_string()
}

fn classify(e: CmdError) -> DriverError {
    if e.is_stale_element_reference() {
        DriverError::StaleElement(e.to_string())
    } else if e.is_no_such_alert() {
        DriverError::NoDialog
    } else if e.is_invalid_session_id() {
        DriverError::SessionClosed
    } else {
        DriverError::Command(e.to_string())
    }
}

/// HTML5 drag and drop is not triggered by synthetic pointer moves in most
/// drivers, so the DnD events are dispatched from script.
const DRAG_AND_DROP_JS: &str = r#"
const [source, target] = arguments;
const data = new DataTransfer();
const fire = (el, type) => {
  const ev = new DragEvent(type, { bubbles: true, cancelable: true, dataTransfer: data });
  el.dispatchEvent(ev);
};
fire(source, 'dragstart');
fire(target, 'dragenter');
fire(target, 'dragover');
fire(target, 'drop');
fire(source, 'dragend');
"#;

#[async_trait]
impl Page for WebDriverPage {
    type Element = Element;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.client.goto(url).await.map_err(classify)
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Option<Element>> {
        match self.client.find(wd_locator(locator)).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        match self.client.find_all(wd_locator(locator)).await {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(classify(e)),
        }
    }

    async fn interact(&self, element: &Element, gesture: Gesture<'_, Element>) -> DriverResult<()> {
        match gesture {
            Gesture::Click => element.click().await.map_err(classify),
            Gesture::TypeText(text) => element.send_keys(text).await.map_err(classify),
            Gesture::Clear => element.clear().await.map_err(classify),
            Gesture::SelectOption(value) => element.select_by_value(value).await.map_err(classify),
            Gesture::KeyPress(key) => element.send_keys(&wd_key(key)).await.map_err(classify),
            Gesture::Hover => {
                let actions = MouseActions::new("mouse".to_string()).then(
                    PointerAction::MoveToElement {
                        element: element.clone(),
                        duration: None,
                        x: Default::default(),
                        y: Default::default(),
                    },
                );
                self.client.perform_actions(actions).await.map_err(classify)
            }
            Gesture::DragTo(target) => {
                let args = vec![
                    serde_json::to_value(element).map_err(|e| DriverError::Command(e.to_string()))?,
                    serde_json::to_value(target).map_err(|e| DriverError::Command(e.to_string()))?,
                ];
                self.client
                    .execute(DRAG_AND_DROP_JS, args)
                    .await
                    .map(|_| ())
                    .map_err(classify)
            }
        }
    }

    async fn inspect(&self, element: &Element, property: Property<'_>) -> DriverResult<Value> {
        let value = match property {
            Property::Text => Value::Text(element.text().await.map_err(classify)?),
            Property::Attribute(name) => match element.attr(name).await.map_err(classify)? {
                Some(v) => Value::Text(v),
                None => Value::Missing,
            },
            Property::Displayed => Value::Flag(element.is_displayed().await.map_err(classify)?),
            Property::Enabled => Value::Flag(element.is_enabled().await.map_err(classify)?),
            Property::Selected => Value::Flag(element.is_selected().await.map_err(classify)?),
        };
        Ok(value)
    }

    async fn dialog_text(&self) -> DriverResult<Option<String>> {
        match self.client.get_alert_text().await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_no_such_alert() => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    async fn handle_dialog(&self, response: DialogResponse, text: Option<&str>) -> DriverResult<()> {
        if let Some(text) = text {
            self.client.send_alert_text(text).await.map_err(classify)?;
        }
        match response {
            DialogResponse::Accept => self.client.accept_alert().await.map_err(classify),
            DialogResponse::Dismiss => self.client.dismiss_alert().await.map_err(classify),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(classify)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.client.screenshot().await.map_err(classify)
    }

    async fn close(&self) -> DriverResult<()> {
        if let Err(e) = self.client.clone().close().await {
            warn!("WebDriver session close failed: {}", e);
            return Err(classify(e));
        }
        Ok(())
    }
}
