//! Automation engine boundary
//!
//! The harness never talks to a browser directly. It opens pages through an
//! [`Engine`] and reads or mutates them through [`Page`]. The WebDriver
//! implementation lives in [`crate::webdriver`]; tests plug in their own.

use async_trait::async_trait;

use crate::error::DriverResult;
use crate::spec::{DialogResponse, Key, Locator};

/// Starts browser sessions
#[async_trait]
pub trait Engine: Send + Sync {
    type Page: Page;

    /// Open a fresh, isolated browser context
    async fn open_session(&self) -> DriverResult<Self::Page>;
}

/// A live page inside one browser session
#[async_trait]
pub trait Page: Send + Sync {
    /// Engine-specific element reference
    type Element: Clone + Send + Sync;

    async fn goto(&self, url: &str) -> DriverResult<()>;

    /// First match, or `None` when nothing matches right now
    async fn find(&self, locator: &Locator) -> DriverResult<Option<Self::Element>>;

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    async fn interact(
        &self,
        element: &Self::Element,
        gesture: Gesture<'_, Self::Element>,
    ) -> DriverResult<()>;

    async fn inspect(&self, element: &Self::Element, property: Property<'_>) -> DriverResult<Value>;

    /// Text of the open dialog, or `None` when no dialog is open
    async fn dialog_text(&self) -> DriverResult<Option<String>>;

    async fn handle_dialog(&self, response: DialogResponse, text: Option<&str>) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    async fn close(&self) -> DriverResult<()>;
}

/// Input synthesized on an element
#[derive(Debug)]
pub enum Gesture<'a, E> {
    Click,
    TypeText(&'a str),
    Clear,
    SelectOption(&'a str),
    DragTo(&'a E),
    Hover,
    KeyPress(Key),
}

/// Element state readable by assertions and conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property<'a> {
    Text,
    Attribute(&'a str),
    Displayed,
    Enabled,
    Selected,
}

/// A value read from an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Flag(bool),
    Missing,
}

impl Value {
    pub fn as_flag(&self) -> bool {
        matches!(self, Value::Flag(true))
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(t) => Some(t),
            Value::Flag(b) => Some(b.to_string()),
            Value::Missing => None,
        }
    }
}
