//! Assertions over observed page state

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::driver::{Page, Property, Value};
use crate::error::DriverResult;
use crate::session::Session;
use crate::spec::{Expectation, Source};

/// A value read from the page for an assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observed {
    Text(String),
    Flag(bool),
    Count(usize),
    List(Vec<String>),
    /// The element (or dialog) the source points at does not exist
    Missing,
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Text(t) => write!(f, "{:?}", t),
            Observed::Flag(b) => write!(f, "{}", b),
            Observed::Count(n) => write!(f, "{} element(s)", n),
            Observed::List(items) => write!(f, "{:?}", items),
            Observed::Missing => write!(f, "<missing>"),
        }
    }
}

/// Where an assertion was evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertContext {
    pub scenario: String,
    pub step_index: usize,
    /// Selector or page property that was read
    pub subject: String,
}

impl AssertContext {
    pub fn new(scenario: impl Into<String>, step_index: usize, subject: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            step_index,
            subject: subject.into(),
        }
    }
}

/// Structured detail of a failed assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub scenario: String,
    pub step_index: usize,
    pub expected: String,
    pub observed: String,
    pub subject: String,
}

impl AssertionFailure {
    fn new(ctx: &AssertContext, expected: String, observed: String) -> Self {
        Self {
            scenario: ctx.scenario.clone(),
            step_index: ctx.step_index,
            expected,
            observed,
            subject: ctx.subject.clone(),
        }
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, observed {} [scenario {}, step {}]",
            self.subject, self.expected, self.observed, self.scenario, self.step_index
        )
    }
}

pub fn assert_equal(actual: &str, expected: &str, ctx: &AssertContext) -> Result<(), AssertionFailure> {
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionFailure::new(ctx, format!("{:?}", expected), format!("{:?}", actual)))
    }
}

pub fn assert_contains(actual: &str, needle: &str, ctx: &AssertContext) -> Result<(), AssertionFailure> {
    if actual.contains(needle) {
        Ok(())
    } else {
        Err(AssertionFailure::new(
            ctx,
            format!("text containing {:?}", needle),
            format!("{:?}", actual),
        ))
    }
}

pub fn assert_true(value: bool, ctx: &AssertContext) -> Result<(), AssertionFailure> {
    if value {
        Ok(())
    } else {
        Err(AssertionFailure::new(ctx, "true".to_string(), "false".to_string()))
    }
}

/// Check an observed value against an expectation
pub fn check(observed: &Observed, expect: &Expectation, ctx: &AssertContext) -> Result<(), AssertionFailure> {
    let mismatch = || AssertionFailure::new(ctx, expect.to_string(), observed.to_string());

    match (expect, observed) {
        (Expectation::Equals { value }, Observed::Text(actual)) => assert_equal(actual, value, ctx),
        (Expectation::Equals { value }, Observed::Count(n)) => assert_equal(&n.to_string(), value, ctx),
        (Expectation::Equals { value }, Observed::Flag(b)) => assert_equal(&b.to_string(), value, ctx),
        (Expectation::Contains { value }, Observed::Text(actual)) => assert_contains(actual, value, ctx),
        (Expectation::Contains { value }, Observed::List(items)) => {
            if items.iter().any(|i| i == value) {
                Ok(())
            } else {
                Err(mismatch())
            }
        }
        (Expectation::Matches { pattern }, Observed::Text(actual)) => {
            let re = Regex::new(pattern).map_err(|e| {
                AssertionFailure::new(ctx, format!("valid regex /{}/", pattern), e.to_string())
            })?;
            if re.is_match(actual) {
                Ok(())
            } else {
                Err(mismatch())
            }
        }
        (Expectation::IsTrue, Observed::Flag(b)) => assert_true(*b, ctx),
        (Expectation::IsFalse, Observed::Flag(b)) => {
            assert_true(!*b, ctx).map_err(|_| AssertionFailure::new(ctx, "false".into(), "true".into()))
        }
        (Expectation::CountEquals { count }, observed) => match count_of(observed) {
            Some(n) if n == *count => Ok(()),
            _ => Err(mismatch()),
        },
        (Expectation::CountAtLeast { count }, observed) => match count_of(observed) {
            Some(n) if n >= *count => Ok(()),
            _ => Err(mismatch()),
        },
        (Expectation::AscendingNumeric, Observed::List(items)) => {
            let values = items.iter().map(|i| parse_number(i)).collect::<Option<Vec<f64>>>();
            match values {
                Some(v) if v.windows(2).all(|w| w[0] <= w[1]) => Ok(()),
                _ => Err(mismatch()),
            }
        }
        _ => Err(mismatch()),
    }
}

fn count_of(observed: &Observed) -> Option<usize> {
    match observed {
        Observed::Count(n) => Some(*n),
        Observed::List(items) => Some(items.len()),
        Observed::Missing => Some(0),
        _ => None,
    }
}

/// Parse the first number in a label such as `$29.99` or `Item total: 7.99`
fn parse_number(raw: &str) -> Option<f64> {
    let start = raw.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let digits: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse().ok()
}

/// Read the value an assertion source points at
pub async fn observe<P: Page>(session: &Session<P>, source: &Source) -> DriverResult<Observed> {
    let page = session.page();

    let element_value = |value: Value| match value {
        Value::Text(t) => Observed::Text(t),
        Value::Flag(b) => Observed::Flag(b),
        Value::Missing => Observed::Missing,
    };

    let observed = match source {
        Source::Text { selector } => match session.locate(selector).await? {
            Some(el) => element_value(page.inspect(&el, Property::Text).await?),
            None => Observed::Missing,
        },
        Source::Attribute { selector, name } => match session.locate(selector).await? {
            Some(el) => element_value(page.inspect(&el, Property::Attribute(name)).await?),
            None => Observed::Missing,
        },
        Source::Displayed { selector } => match session.locate(selector).await? {
            Some(el) => element_value(page.inspect(&el, Property::Displayed).await?),
            None => Observed::Flag(false),
        },
        Source::Selected { selector } => match session.locate(selector).await? {
            Some(el) => element_value(page.inspect(&el, Property::Selected).await?),
            None => Observed::Missing,
        },
        Source::Enabled { selector } => match session.locate(selector).await? {
            Some(el) => element_value(page.inspect(&el, Property::Enabled).await?),
            None => Observed::Missing,
        },
        Source::Count { selector } => Observed::Count(page.find_all(&selector.locator).await?.len()),
        Source::Texts { selector } => {
            let mut texts = Vec::new();
            for el in page.find_all(&selector.locator).await? {
                if let Some(t) = page.inspect(&el, Property::Text).await?.into_text() {
                    texts.push(t);
                }
            }
            Observed::List(texts)
        }
        Source::Url => Observed::Text(page.current_url().await?),
        Source::DialogText => match page.dialog_text().await? {
            Some(t) => Observed::Text(t),
            None => Observed::Missing,
        },
    };
    Ok(observed)
}
