//! Dialog scoping.
//!
//! At most one modal dialog is authoritative at a time: the first visible
//! element exposing the `dialog` role. While it is open, unscoped selectors
//! resolve inside its subtree, and a confirmation-style dialog blocks any
//! click that is not explicitly scoped into it.

use crate::page::{ElementHandle, PageEngine};
use crate::selector::Selector;
use crate::utils::normalize_ws;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static CONFIRMATION_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(discard|delete|remove|unsaved|are you sure)\b").unwrap());

/// The currently visible modal dialog, if any.
#[derive(Debug, Clone)]
pub struct DialogContext {
    root: ElementHandle,
    title: String,
}

impl DialogContext {
    pub fn root(&self) -> &ElementHandle {
        &self.root
    }

    /// Normalized visible text of the dialog, used as its title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Destructive-confirmation dialogs take precedence over everything:
    /// an unscoped click must be refused while one is open.
    pub fn is_confirmation(&self) -> bool {
        CONFIRMATION_TITLE.is_match(&self.title)
    }
}

/// Resolve the active dialog context. Never fails: a backend error while
/// probing is treated as "no dialog".
pub async fn visible_dialog(engine: &Arc<dyn PageEngine>) -> Option<DialogContext> {
    let selector = Selector::Role {
        role: "dialog".to_string(),
        name: None,
    };
    let dialogs = engine.find_elements(&selector, None).await.ok()?;
    let root = dialogs
        .into_iter()
        .find(|d| d.is_visible().unwrap_or(false))?;
    let title = normalize_ws(&root.text().unwrap_or_default());
    debug!(title = %title, "dialog context active");
    Some(DialogContext { root, title })
}

/// Whether an open dialog demands a scoped click and the intent lacks one.
pub fn blocks_unscoped_click(dialog: &DialogContext, dialog_scoped: bool) -> bool {
    dialog.is_confirmation() && !dialog_scoped
}
