//! Declarative YAML scenario definitions
//!
//! A scenario file is either a single scenario or a suite. Suites share a
//! target, tags, setup steps and named flows between their scenarios; flows
//! are expanded when the file is loaded, so a [`Scenario`] only ever holds
//! plain [`Step`]s.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FlowError, FlowResult};

/// How far flows may nest before loading gives up.
const MAX_FLOW_DEPTH: usize = 8;

/// A fully expanded, immutable scenario
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Key of the target application (resolved to a base URL per environment)
    pub target: String,

    /// Groups used for filtering and reporting
    pub tags: BTreeSet<String>,

    /// Lower runs first; ties keep declaration order
    pub priority: i32,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// File the scenario was loaded from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<PathBuf>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Load a URL, relative to the target's base URL unless absolute
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credentials: Option<Credentials>,
    },

    /// Act on an element once it is present
    Interact {
        target: Selector,
        #[serde(flatten)]
        action: Action,
    },

    /// Poll until a condition holds
    WaitFor {
        #[serde(flatten)]
        condition: Condition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Compare observed page state with an expectation
    Assert {
        #[serde(flatten)]
        source: Source,
        #[serde(flatten)]
        expect: Expectation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        within_ms: Option<u64>,
    },

    /// Answer an open JavaScript alert, confirm or prompt
    Dialog {
        response: DialogResponse,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl Step {
    /// Short label used in logs and reports
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate { url, .. } => format!("navigate:{}", url),
            Step::Interact { target, action } => format!("{}:{}", action.name(), target),
            Step::WaitFor { condition, .. } => format!("wait:{}", condition),
            Step::Assert { source, expect, .. } => format!("assert:{} {}", source, expect),
            Step::Dialog { response, .. } => format!("dialog:{}", response.as_str()),
        }
    }

    /// Selector whose matches are all read at once, where `nth` has no meaning
    fn all_matches_selector(&self) -> Option<&Selector> {
        match self {
            Step::WaitFor { condition: Condition::Count { selector, .. }, .. } => Some(selector),
            Step::Assert {
                source: Source::Count { selector } | Source::Texts { selector },
                ..
            } => Some(selector),
            _ => None,
        }
    }
}

/// HTTP basic-auth user info embedded into a navigation URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// An interaction performed on a resolved element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Click,
    TypeText { text: String },
    Clear,
    SelectOption { value: String },
    DragTo { to: Selector },
    Hover,
    KeyPress { key: Key },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::TypeText { .. } => "type",
            Action::Clear => "clear",
            Action::SelectOption { .. } => "select",
            Action::DragTo { .. } => "drag",
            Action::Hover => "hover",
            Action::KeyPress { .. } => "press",
        }
    }
}

/// Keys that can be sent with [`Action::KeyPress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Space,
    ArrowUp,
    ArrowDown,
}

/// A predicate over live page state, evaluated by the wait policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "until", rename_all = "snake_case")]
pub enum Condition {
    Present { selector: Selector },
    Visible { selector: Selector },
    Clickable { selector: Selector },
    Absent { selector: Selector },
    TextEquals { selector: Selector, text: String },
    TextContains { selector: Selector, text: String },
    Count { selector: Selector, count: usize },
    UrlContains { fragment: String },
    DialogOpen,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Present { selector } => write!(f, "{} to be present", selector),
            Condition::Visible { selector } => write!(f, "{} to be visible", selector),
            Condition::Clickable { selector } => write!(f, "{} to be clickable", selector),
            Condition::Absent { selector } => write!(f, "{} to be absent", selector),
            Condition::TextEquals { selector, text } => {
                write!(f, "text of {} to equal {:?}", selector, text)
            }
            Condition::TextContains { selector, text } => {
                write!(f, "text of {} to contain {:?}", selector, text)
            }
            Condition::Count { selector, count } => {
                write!(f, "{} to match {} element(s)", selector, count)
            }
            Condition::UrlContains { fragment } => write!(f, "URL to contain {:?}", fragment),
            Condition::DialogOpen => write!(f, "a dialog to be open"),
        }
    }
}

/// Where an assertion reads its observed value from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Source {
    Text { selector: Selector },
    Attribute { selector: Selector, name: String },
    Displayed { selector: Selector },
    Selected { selector: Selector },
    Enabled { selector: Selector },
    Count { selector: Selector },
    Texts { selector: Selector },
    Url,
    DialogText,
}

impl Source {
    /// The selector read by this source, if any
    pub fn selector(&self) -> Option<&Selector> {
        match self {
            Source::Text { selector }
            | Source::Attribute { selector, .. }
            | Source::Displayed { selector }
            | Source::Selected { selector }
            | Source::Enabled { selector }
            | Source::Count { selector }
            | Source::Texts { selector } => Some(selector),
            Source::Url | Source::DialogText => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Text { selector } => write!(f, "text({})", selector),
            Source::Attribute { selector, name } => write!(f, "attr({}, {})", selector, name),
            Source::Displayed { selector } => write!(f, "displayed({})", selector),
            Source::Selected { selector } => write!(f, "selected({})", selector),
            Source::Enabled { selector } => write!(f, "enabled({})", selector),
            Source::Count { selector } => write!(f, "count({})", selector),
            Source::Texts { selector } => write!(f, "texts({})", selector),
            Source::Url => write!(f, "url"),
            Source::DialogText => write!(f, "dialog_text"),
        }
    }
}

/// The comparator applied to an observed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    Equals { value: String },
    Contains { value: String },
    Matches { pattern: String },
    IsTrue,
    IsFalse,
    CountEquals { count: usize },
    CountAtLeast { count: usize },
    AscendingNumeric,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Equals { value } => write!(f, "equals {:?}", value),
            Expectation::Contains { value } => write!(f, "contains {:?}", value),
            Expectation::Matches { pattern } => write!(f, "matches /{}/", pattern),
            Expectation::IsTrue => write!(f, "is true"),
            Expectation::IsFalse => write!(f, "is false"),
            Expectation::CountEquals { count } => write!(f, "count == {}", count),
            Expectation::CountAtLeast { count } => write!(f, "count >= {}", count),
            Expectation::AscendingNumeric => write!(f, "ascending numerically"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogResponse {
    Accept,
    Dismiss,
}

impl DialogResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogResponse::Accept => "accept",
            DialogResponse::Dismiss => "dismiss",
        }
    }
}

/// Locator strategy understood by the automation engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    LinkText(String),
}

/// An element selector in Playwright-like string form.
///
/// `css=`, `xpath=`, `id=`, `class=` and `link=` pick the strategy; a bare
/// string starting with `//` is XPath, anything else is CSS. A trailing
/// `>> nth=N` picks the N-th (zero-based) match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    pub locator: Locator,
    pub index: Option<usize>,
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Self { locator: Locator::Css(value.into()), index: None }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self { locator: Locator::XPath(value.into()), index: None }
    }

    /// Pick the N-th match instead of the first
    pub fn nth(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (body, index) = match raw.rsplit_once(">>") {
            Some((body, tail)) if tail.trim().starts_with("nth=") => {
                let n = tail.trim()["nth=".len()..]
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| format!("invalid nth in selector {:?}: {}", raw, e))?;
                (body.trim(), Some(n))
            }
            _ => (raw.trim(), None),
        };

        if body.is_empty() {
            return Err("selector must not be empty".to_string());
        }

        let locator = if let Some(v) = body.strip_prefix("css=") {
            Locator::Css(v.to_string())
        } else if let Some(v) = body.strip_prefix("xpath=") {
            Locator::XPath(v.to_string())
        } else if let Some(v) = body.strip_prefix("id=") {
            Locator::Id(v.to_string())
        } else if let Some(v) = body.strip_prefix("class=") {
            Locator::Css(format!(".{}", v))
        } else if let Some(v) = body.strip_prefix("link=") {
            Locator::LinkText(v.to_string())
        } else if body.starts_with("//") || body.starts_with("(//") {
            Locator::XPath(body.to_string())
        } else {
            Locator::Css(body.to_string())
        };

        Ok(Self { locator, index })
    }
}

impl TryFrom<String> for Selector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Locator::Css(v) => write!(f, "css={}", v)?,
            Locator::XPath(v) => write!(f, "xpath={}", v)?,
            Locator::Id(v) => write!(f, "id={}", v)?,
            Locator::LinkText(v) => write!(f, "link={}", v)?,
        }
        if let Some(n) = self.index {
            write!(f, " >> nth={}", n)?;
        }
        Ok(())
    }
}

/// A step as written in a file: either a plain step or a flow reference
#[derive(Debug, Clone)]
enum StepEntry {
    Flow(String),
    Step(Step),
}

impl<'de> Deserialize<'de> for StepEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let value = serde_yaml::Value::deserialize(deserializer)?;
        if let Some(flow) = value.get("flow") {
            let name = flow
                .as_str()
                .ok_or_else(|| D::Error::custom("flow reference must be a string"))?;
            return Ok(StepEntry::Flow(name.to_string()));
        }
        serde_yaml::from_value(value)
            .map(StepEntry::Step)
            .map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScenarioDef {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    priority: i32,
    steps: Vec<StepEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SuiteDef {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    setup: Vec<StepEntry>,
    #[serde(default)]
    flows: BTreeMap<String, Vec<StepEntry>>,
    scenarios: Vec<ScenarioDef>,
}

impl Scenario {
    /// Parse a scenario or suite from a YAML string
    pub fn from_yaml(yaml: &str) -> FlowResult<Vec<Self>> {
        Self::parse(yaml, None)
    }

    /// Parse a scenario or suite from a YAML file
    pub fn from_file(path: &Path) -> FlowResult<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, Some(path))
    }

    /// Load all scenarios from a directory, in file-name order
    pub fn load_all(dir: &Path) -> FlowResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.extend(Self::from_file(entry.path())?);
        }

        check_unique_names(&scenarios)?;
        Ok(scenarios)
    }

    fn parse(yaml: &str, origin: Option<&Path>) -> FlowResult<Vec<Self>> {
        let file = origin
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string());
        let parse_err = |e: serde_yaml::Error| FlowError::SpecParse {
            file: file.clone(),
            reason: e.to_string(),
        };

        let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(parse_err)?;
        let suite = if value.get("scenarios").is_some() {
            serde_yaml::from_value::<SuiteDef>(value).map_err(parse_err)?
        } else {
            SuiteDef {
                target: None,
                tags: Vec::new(),
                setup: Vec::new(),
                flows: BTreeMap::new(),
                scenarios: vec![serde_yaml::from_value::<ScenarioDef>(value).map_err(parse_err)?],
            }
        };

        let scenarios = suite.expand(origin)?;
        check_unique_names(&scenarios)?;
        Ok(scenarios)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl SuiteDef {
    fn expand(&self, origin: Option<&Path>) -> FlowResult<Vec<Scenario>> {
        let mut scenarios = Vec::with_capacity(self.scenarios.len());

        for def in &self.scenarios {
            let name = def.name.trim().to_string();
            if name.is_empty() {
                return Err(FlowError::InvalidScenario {
                    scenario: "<unnamed>".to_string(),
                    reason: "name must not be empty".to_string(),
                });
            }

            let target = def
                .target
                .clone()
                .or_else(|| self.target.clone())
                .ok_or_else(|| FlowError::InvalidScenario {
                    scenario: name.clone(),
                    reason: "no target given for scenario or suite".to_string(),
                })?;

            let mut steps = Vec::new();
            self.expand_entries(&name, &self.setup, &mut steps, 0)?;
            self.expand_entries(&name, &def.steps, &mut steps, 0)?;
            if steps.is_empty() {
                return Err(FlowError::InvalidScenario {
                    scenario: name,
                    reason: "scenario has no steps".to_string(),
                });
            }
            for (index, step) in steps.iter().enumerate() {
                if let Some(selector) = step.all_matches_selector().filter(|s| s.index.is_some()) {
                    return Err(FlowError::InvalidScenario {
                        scenario: name,
                        reason: format!(
                            "step {} ({}) reads every match of {}; nth is not allowed there",
                            index,
                            step.describe(),
                            selector
                        ),
                    });
                }
            }

            let tags = self
                .tags
                .iter()
                .chain(def.tags.iter())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();

            scenarios.push(Scenario {
                name,
                description: def.description.clone(),
                target,
                tags,
                priority: def.priority,
                steps,
                origin: origin.map(Path::to_path_buf),
            });
        }

        Ok(scenarios)
    }

    fn expand_entries(
        &self,
        scenario: &str,
        entries: &[StepEntry],
        out: &mut Vec<Step>,
        depth: usize,
    ) -> FlowResult<()> {
        if depth > MAX_FLOW_DEPTH {
            return Err(FlowError::InvalidScenario {
                scenario: scenario.to_string(),
                reason: format!("flows nest deeper than {} levels (cycle?)", MAX_FLOW_DEPTH),
            });
        }

        for entry in entries {
            match entry {
                StepEntry::Step(step) => out.push(step.clone()),
                StepEntry::Flow(name) => {
                    let flow = self.flows.get(name).ok_or_else(|| FlowError::InvalidScenario {
                        scenario: scenario.to_string(),
                        reason: format!("unknown flow '{}'", name),
                    })?;
                    self.expand_entries(scenario, flow, out, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn check_unique_names(scenarios: &[Scenario]) -> FlowResult<()> {
    let mut seen = HashSet::new();
    for s in scenarios {
        if !seen.insert(s.name.as_str()) {
            return Err(FlowError::InvalidScenario {
                scenario: s.name.clone(),
                reason: "duplicate scenario name".to_string(),
            });
        }
    }
    Ok(())
}
