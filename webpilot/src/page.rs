//! Boundary to the live document.
//!
//! The engine never talks to a browser directly; it issues snapshot queries
//! and element operations through [`PageEngine`] and [`ElementImpl`] trait
//! objects. The production adapter lives with the session-bootstrap
//! collaborator; tests supply a scripted in-memory tree.

use crate::errors::AutomationError;
use crate::selector::Selector;
use std::fmt;

/// A live connection to one rendered document.
///
/// Queries are snapshots: the document may re-render between calls, so
/// returned handles are used immediately and never cached. Bounded waiting
/// is the caller's concern ([`crate::locator::Locator`]).
#[async_trait::async_trait]
pub trait PageEngine: Send + Sync {
    /// All elements currently matching `selector` under `root`
    /// (whole document when `root` is `None`).
    async fn find_elements(
        &self,
        selector: &Selector,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, AutomationError>;

    /// Dispatch a key gesture to the focused element.
    async fn press_key(&self, key: &str) -> Result<(), AutomationError>;

    /// Issue a full page load.
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Visible text of the whole document, for the planner's context.
    async fn visible_text(&self) -> Result<String, AutomationError>;

    /// Enable downcasting to concrete engine types.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Operations every backend element must support.
pub trait ElementImpl: Send + Sync {
    /// Backend-assigned identity, when the backend has one.
    fn id(&self) -> Option<String>;
    fn role(&self) -> String;
    /// Accessible name (assistive-technology label).
    fn name(&self) -> Option<String>;
    /// Rendered inner text.
    fn text(&self) -> Result<String, AutomationError>;
    /// Form-control value, `None` for non-value elements.
    fn value(&self) -> Result<Option<String>, AutomationError>;
    fn is_visible(&self) -> Result<bool, AutomationError>;
    fn is_content_editable(&self) -> Result<bool, AutomationError>;
    fn scroll_into_view(&self) -> Result<(), AutomationError>;
    fn click(&self) -> Result<(), AutomationError>;
    /// Direct value replacement. Rich-text regions typically reject this.
    fn set_value(&self, value: &str) -> Result<(), AutomationError>;
    /// Focus the element and type character by character.
    fn type_text(&self, text: &str) -> Result<(), AutomationError>;
    fn press_key(&self, key: &str) -> Result<(), AutomationError>;
    fn clone_boxed(&self) -> Box<dyn ElementImpl>;
}

/// Opaque handle to one interactive node in the live document.
///
/// Valid only for the resolution attempt that produced it; a node removed
/// by a re-render surfaces [`AutomationError::ElementDetached`] on use.
pub struct ElementHandle {
    inner: Box<dyn ElementImpl>,
}

impl ElementHandle {
    pub fn new(inner: Box<dyn ElementImpl>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> Option<String> {
        self.inner.id()
    }

    pub fn role(&self) -> String {
        self.inner.role()
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name()
    }

    pub fn text(&self) -> Result<String, AutomationError> {
        self.inner.text()
    }

    pub fn value(&self) -> Result<Option<String>, AutomationError> {
        self.inner.value()
    }

    /// The text a user currently sees in this element: the control value
    /// when there is one, the inner text otherwise.
    pub fn display_text(&self) -> String {
        match self.inner.value() {
            Ok(Some(v)) if !v.is_empty() => v,
            _ => self.inner.text().unwrap_or_default(),
        }
    }

    pub fn is_visible(&self) -> Result<bool, AutomationError> {
        self.inner.is_visible()
    }

    pub fn is_content_editable(&self) -> Result<bool, AutomationError> {
        self.inner.is_content_editable()
    }

    pub fn scroll_into_view(&self) -> Result<(), AutomationError> {
        self.inner.scroll_into_view()
    }

    pub fn click(&self) -> Result<(), AutomationError> {
        self.inner.click()
    }

    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value)
    }

    pub fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.inner.type_text(text)
    }

    pub fn press_key(&self, key: &str) -> Result<(), AutomationError> {
        self.inner.press_key(key)
    }
}

impl Clone for ElementHandle {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
        }
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("role", &self.role())
            .field("name", &self.name())
            .finish()
    }
}
