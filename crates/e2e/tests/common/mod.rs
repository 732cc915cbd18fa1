//! Scripted in-memory engine for driving the runner without a browser

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use uiflow_e2e::config::Environment;
use uiflow_e2e::driver::{Engine, Gesture, Page, Property, Value};
use uiflow_e2e::spec::{DialogResponse, Key, Locator};
use uiflow_e2e::{DriverError, DriverResult, ScenarioRunner, WaitPolicy};

pub const BASE_URL: &str = "http://app.test/base/";

/// An element on the fake page
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub locator: Locator,
    pub text: String,
    pub displayed: bool,
    pub enabled: bool,
    pub selected: bool,
    pub attrs: BTreeMap<String, String>,
    /// Hidden from `find` until this long after the page opened
    pub appears_after: Duration,
    /// Text switches to the given value this long after the page opened
    pub text_after: Option<(Duration, String)>,
    /// Reads that fail as stale before the element behaves
    pub stale_reads: usize,
}

impl FakeElement {
    pub fn css(selector: &str, text: &str) -> Self {
        Self {
            locator: Locator::Css(selector.to_string()),
            text: text.to_string(),
            displayed: true,
            enabled: true,
            selected: false,
            attrs: BTreeMap::new(),
            appears_after: Duration::ZERO,
            text_after: None,
            stale_reads: 0,
        }
    }

    pub fn appears_after(mut self, ms: u64) -> Self {
        self.appears_after = Duration::from_millis(ms);
        self
    }

    pub fn changes_to(mut self, ms: u64, text: &str) -> Self {
        self.text_after = Some((Duration::from_millis(ms), text.to_string()));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn stale(mut self, reads: usize) -> Self {
        self.stale_reads = reads;
        self
    }

    fn current_text(&self, age: Duration) -> &str {
        match &self.text_after {
            Some((after, text)) if age >= *after => text,
            _ => &self.text,
        }
    }
}

/// What sets off an effect
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Click(Locator),
    Hover(Locator),
    Key(Locator, Key),
    Dialog(DialogResponse),
}

/// A scripted reaction of the page
#[derive(Debug, Clone)]
pub enum Effect {
    SetText(Locator, String),
    Insert(FakeElement),
    Remove(Locator),
    OpenDialog(String),
    SetUrl(String),
    /// Put the typed prompt text after a prefix into an element
    EchoPrompt(Locator, String),
    Fail(String),
    Panic(String),
}

pub fn css(selector: &str) -> Locator {
    Locator::Css(selector.to_string())
}

/// The page every session starts from
#[derive(Debug, Clone, Default)]
pub struct Site {
    elements: Vec<FakeElement>,
    handlers: Vec<(Trigger, Vec<Effect>)>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn on(mut self, trigger: Trigger, effects: Vec<Effect>) -> Self {
        self.handlers.push((trigger, effects));
        self
    }

    pub fn on_click(self, selector: &str, effects: Vec<Effect>) -> Self {
        self.on(Trigger::Click(css(selector)), effects)
    }

    fn effects(&self, trigger: &Trigger) -> Vec<Effect> {
        self.handlers
            .iter()
            .filter(|(t, _)| t == trigger)
            .flat_map(|(_, e)| e.clone())
            .collect()
    }
}

/// Everything the engine observed, shared across its sessions
#[derive(Debug, Default)]
pub struct Journal {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    /// Sessions open right now, and the most seen at once
    pub live: AtomicUsize,
    pub peak: AtomicUsize,
    pub events: Mutex<Vec<String>>,
}

impl Journal {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }
}

pub struct FakeEngine {
    site: Arc<Site>,
    pub journal: Arc<Journal>,
    fail_start: bool,
    fail_close: bool,
}

impl FakeEngine {
    pub fn new(site: Site) -> Self {
        Self {
            site: Arc::new(site),
            journal: Arc::new(Journal::default()),
            fail_start: false,
            fail_close: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Every session close reports an error after tearing down
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl Engine for FakeEngine {
    type Page = FakePage;

    async fn open_session(&self) -> DriverResult<FakePage> {
        if self.fail_start {
            return Err(DriverError::SessionStart("connection refused".to_string()));
        }
        self.journal.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.journal.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.peak.fetch_max(live, Ordering::SeqCst);

        Ok(FakePage {
            site: self.site.clone(),
            journal: self.journal.clone(),
            fail_close: self.fail_close,
            opened_at: Instant::now(),
            state: Mutex::new(PageState {
                elements: self.site.elements.iter().cloned().map(Some).collect(),
                url: "about:blank".to_string(),
                dialog: None,
            }),
        })
    }
}

struct PageState {
    /// Removed elements leave a hole so old references go stale
    elements: Vec<Option<FakeElement>>,
    url: String,
    dialog: Option<String>,
}

pub struct FakePage {
    site: Arc<Site>,
    journal: Arc<Journal>,
    fail_close: bool,
    opened_at: Instant,
    state: Mutex<PageState>,
}

impl FakePage {
    fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    fn matching(&self, locator: &Locator) -> Vec<usize> {
        let age = self.age();
        self.state
            .lock()
            .elements
            .iter()
            .enumerate()
            .filter_map(|(i, el)| match el {
                Some(el) if el.locator == *locator && age >= el.appears_after => Some(i),
                _ => None,
            })
            .collect()
    }

    fn locator_of(&self, id: usize) -> DriverResult<Locator> {
        self.state.lock().elements[id]
            .as_ref()
            .map(|el| el.locator.clone())
            .ok_or_else(|| DriverError::StaleElement(format!("element {} was removed", id)))
    }

    fn apply(&self, trigger: Trigger, prompt: Option<&str>) -> DriverResult<()> {
        let effects = self.site.effects(&trigger);
        if let Some(Effect::Panic(msg)) = effects.iter().find(|e| matches!(e, Effect::Panic(_))) {
            panic!("{}", msg);
        }

        let mut state = self.state.lock();
        for effect in effects {
            match effect {
                Effect::SetText(locator, text) => {
                    for el in state.elements.iter_mut().flatten().filter(|el| el.locator == locator) {
                        el.text = text.clone();
                        el.text_after = None;
                    }
                }
                Effect::Insert(el) => state.elements.push(Some(el)),
                Effect::Remove(locator) => {
                    for slot in state.elements.iter_mut() {
                        if slot.as_ref().map(|el| el.locator == locator).unwrap_or(false) {
                            *slot = None;
                        }
                    }
                }
                Effect::OpenDialog(text) => state.dialog = Some(text),
                Effect::SetUrl(url) => state.url = url,
                Effect::EchoPrompt(locator, prefix) => {
                    let text = format!("{}{}", prefix, prompt.unwrap_or_default());
                    for el in state.elements.iter_mut().flatten().filter(|el| el.locator == locator) {
                        el.text = text.clone();
                    }
                }
                Effect::Fail(msg) => return Err(DriverError::Command(msg)),
                Effect::Panic(_) => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Page for FakePage {
    type Element = usize;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.journal.record(format!("goto:{}", url));
        if url.contains("unreachable") {
            return Err(DriverError::Command("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        self.state.lock().url = url.to_string();
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Option<usize>> {
        Ok(self.matching(locator).into_iter().next())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<usize>> {
        Ok(self.matching(locator))
    }

    async fn interact(&self, element: &usize, gesture: Gesture<'_, usize>) -> DriverResult<()> {
        let locator = self.locator_of(*element)?;
        let label = match &locator {
            Locator::Css(s) | Locator::XPath(s) | Locator::Id(s) | Locator::LinkText(s) => s.clone(),
        };

        match gesture {
            Gesture::Click => {
                self.journal.record(format!("click:{}", label));
                let enabled = self.state.lock().elements[*element]
                    .as_ref()
                    .map(|el| el.enabled)
                    .unwrap_or(false);
                if !enabled {
                    return Err(DriverError::Command("element not interactable".to_string()));
                }
                self.apply(Trigger::Click(locator), None)
            }
            Gesture::TypeText(text) => {
                self.journal.record(format!("type:{}:{}", label, text));
                let mut state = self.state.lock();
                if let Some(el) = state.elements[*element].as_mut() {
                    el.attrs.entry("value".to_string()).or_default().push_str(text);
                }
                Ok(())
            }
            Gesture::Clear => {
                let mut state = self.state.lock();
                if let Some(el) = state.elements[*element].as_mut() {
                    el.attrs.insert("value".to_string(), String::new());
                }
                Ok(())
            }
            Gesture::SelectOption(value) => {
                self.journal.record(format!("select:{}:{}", label, value));
                let mut state = self.state.lock();
                if let Some(el) = state.elements[*element].as_mut() {
                    el.attrs.insert("value".to_string(), value.to_string());
                }
                Ok(())
            }
            Gesture::DragTo(destination) => {
                self.journal.record(format!("drag:{}", label));
                let mut state = self.state.lock();
                let from = state.elements[*element].as_ref().map(|el| el.text.clone());
                let to = state.elements[*destination].as_ref().map(|el| el.text.clone());
                if let (Some(from), Some(to)) = (from, to) {
                    if let Some(el) = state.elements[*element].as_mut() {
                        el.text = to;
                    }
                    if let Some(el) = state.elements[*destination].as_mut() {
                        el.text = from;
                    }
                }
                Ok(())
            }
            Gesture::Hover => {
                self.journal.record(format!("hover:{}", label));
                self.apply(Trigger::Hover(locator), None)
            }
            Gesture::KeyPress(key) => {
                self.journal.record(format!("press:{}:{:?}", label, key));
                self.apply(Trigger::Key(locator, key), None)
            }
        }
    }

    async fn inspect(&self, element: &usize, property: Property<'_>) -> DriverResult<Value> {
        let age = self.age();
        let mut state = self.state.lock();
        let el = state.elements[*element]
            .as_mut()
            .ok_or_else(|| DriverError::StaleElement(format!("element {} was removed", element)))?;

        if el.stale_reads > 0 {
            el.stale_reads -= 1;
            return Err(DriverError::StaleElement("element re-rendered".to_string()));
        }

        Ok(match property {
            Property::Text => Value::Text(el.current_text(age).to_string()),
            Property::Attribute(name) => match el.attrs.get(name) {
                Some(v) => Value::Text(v.clone()),
                None => Value::Missing,
            },
            Property::Displayed => Value::Flag(el.displayed),
            Property::Enabled => Value::Flag(el.enabled),
            Property::Selected => Value::Flag(el.selected),
        })
    }

    async fn dialog_text(&self) -> DriverResult<Option<String>> {
        Ok(self.state.lock().dialog.clone())
    }

    async fn handle_dialog(&self, response: DialogResponse, text: Option<&str>) -> DriverResult<()> {
        if self.state.lock().dialog.take().is_none() {
            return Err(DriverError::NoDialog);
        }
        self.journal.record(format!("dialog:{}", response.as_str()));
        self.apply(Trigger::Dialog(response), text)
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(&self) -> DriverResult<()> {
        self.journal.closed.fetch_add(1, Ordering::SeqCst);
        self.journal.live.fetch_sub(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DriverError::Command("invalid session id".to_string()));
        }
        Ok(())
    }
}

pub fn environment() -> Environment {
    Environment::new("test").with_target("app", BASE_URL)
}

/// Runner with a 1 s wait timeout polled every 100 ms
pub fn runner(engine: FakeEngine) -> ScenarioRunner<FakeEngine> {
    ScenarioRunner::new(engine, environment())
        .with_wait_policy(WaitPolicy::new(Duration::from_millis(1000), Duration::from_millis(100)))
}
