//! Web document automation on behalf of an external planner.
//!
//! This crate resolves fuzzy, planner-supplied selectors against a live,
//! constantly re-rendering document and executes each intent exactly once:
//! multi-strategy element location, dialog/popover scoping, idempotency
//! and debounce guarding, and a two-phase open-then-select protocol for
//! enumerated properties. The live document sits behind the [`PageEngine`]
//! trait, inspired by Playwright's automation model.

use std::sync::Arc;
use tracing::instrument;

pub mod config;
pub mod driver;
pub mod errors;
pub mod executor;
pub mod history;
pub mod intent;
pub mod locator;
pub mod normalizer;
pub mod page;
mod popup;
pub mod scope;
pub mod selector;
#[cfg(test)]
mod tests;
pub mod utils;

pub use config::EngineConfig;
pub use driver::{Driver, DriverPolicy, InputCollector, Planner, RunSummary, StepRecorder};
pub use errors::AutomationError;
pub use executor::ActionExecutor;
pub use intent::{ActionResult, InputRequest, Intent, Outcome, PlannedAction, PlannedKind};
pub use locator::{Locator, Resolution};
pub use page::{ElementHandle, ElementImpl, PageEngine};
pub use scope::DialogContext;
pub use selector::{NamePattern, Selector};

/// A connection to one live document session.
///
/// The main entry point: wraps the backend engine and hands out locators
/// and document-level operations. Strictly sequential — one intent is
/// resolved and executed at a time against the session.
pub struct Session {
    engine: Arc<dyn PageEngine>,
}

impl Session {
    pub fn new(engine: Arc<dyn PageEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn PageEngine> {
        &self.engine
    }

    /// A locator for `selector` with the default configuration.
    #[instrument(skip(self, selector))]
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(
            self.engine.clone(),
            selector.into(),
            &EngineConfig::default(),
        )
    }

    /// Issue a full page load.
    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.engine.navigate(url).await
    }

    /// Dispatch a key gesture to the focused element.
    pub async fn press_key(&self, key: &str) -> Result<(), AutomationError> {
        self.engine.press_key(key).await
    }

    /// Visible text of the whole document, truncated upstream for the
    /// planner's context window.
    pub async fn visible_text(&self) -> Result<String, AutomationError> {
        self.engine.visible_text().await
    }

    /// The currently visible modal dialog, if any.
    pub async fn visible_dialog(&self) -> Option<DialogContext> {
        scope::visible_dialog(&self.engine).await
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}
