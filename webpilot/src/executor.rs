//! The action execution state machine.
//!
//! One intent at a time moves through resolve → idempotency check →
//! execute → verify; every exit path carries an [`ActionResult`]. No
//! failure propagates across the action boundary: the caller loop always
//! gets a result, never a fault.

use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::history::ClickHistory;
use crate::intent::{ActionResult, Intent, IntentKind};
use crate::locator::{self, Locator, Resolution};
use crate::normalizer::{self, NormalizedSelector};
use crate::page::{ElementHandle, PageEngine};
use crate::popup::{OpenOutcome, PopupFlow};
use crate::scope::{self, DialogContext};
use crate::utils::{normalize_ws, preview};
use crate::Session;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Select-all chord for clearing rich-text regions before typing.
const SELECT_ALL_CHORD: &str = if cfg!(target_os = "macos") {
    "Meta+A"
} else {
    "Control+A"
};

/// Chip tokens probed when a failed selector mentions a property or value
/// by bare word.
const CHIP_TOKENS: &[&str] = &[
    "Backlog", "Status", "Health", "Priority", "Labels", "Start", "Target",
];

/// Executes planner intents against one live document session.
///
/// The executor is the only component that mutates the document, and it
/// does so for the duration of exactly one intent before returning.
pub struct ActionExecutor {
    session: Session,
    config: EngineConfig,
    history: ClickHistory,
    last_result: String,
}

impl ActionExecutor {
    pub fn new(session: Session, config: EngineConfig) -> Self {
        let history = ClickHistory::new(&config);
        Self {
            session,
            config,
            history,
            last_result: "Session initialized.".to_string(),
        }
    }

    /// The human-readable summary of the most recent action.
    pub fn last_result(&self) -> &str {
        &self.last_result
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Execute one intent. Always returns a result; internal errors are
    /// folded into the outcome taxonomy.
    #[instrument(level = "debug", skip(self, intent), fields(kind = ?intent.kind()))]
    pub async fn execute(&mut self, intent: &Intent) -> ActionResult {
        let result = match intent {
            Intent::Click { selector } => self.do_click(selector).await,
            Intent::Fill { selector, value } => self.do_fill(selector, value).await,
            Intent::Press { key } => self.do_press(key).await,
            Intent::Navigate { url } => self.do_navigate(url).await,
            Intent::Done => Ok(ActionResult::success("Task completed.")),
        };
        let result = result.unwrap_or_else(result_from_error);
        debug!(outcome = ?result.outcome, message = %result.message, "action finished");
        self.last_result = result.message.clone();
        result
    }

    fn engine(&self) -> &Arc<dyn PageEngine> {
        self.session.engine()
    }

    fn locator_for(&self, norm: &NormalizedSelector) -> Locator {
        Locator::new(self.engine().clone(), norm.selector.clone(), &self.config)
    }

    async fn do_click(&mut self, raw: &str) -> Result<ActionResult, AutomationError> {
        let norm = normalizer::normalize(raw);
        let engine = self.session.engine().clone();
        let popup = PopupFlow::new(&engine, &self.config);
        let dialog = scope::visible_dialog(&engine).await;

        // Enumerated option inside an overlay: the two-phase protocol owns
        // idempotency and verification.
        if norm.is_popup_item() {
            if let Some(desired) = norm.selector.desired_value() {
                if let Some(result) = popup.select_and_verify(dialog.as_ref(), &desired).await {
                    return Ok(result);
                }
            }
        }

        // A destructive-confirmation dialog blocks everything not scoped
        // into it; clicking through to the obscured page is never safe.
        if let Some(dlg) = &dialog {
            if scope::blocks_unscoped_click(dlg, norm.dialog_scoped) {
                warn!(title = %dlg.title(), "refusing unscoped click under confirmation dialog");
                return Ok(ActionResult::error(
                    "Blocked click outside confirmation dialog while edit dialog is open.",
                ));
            }
        }

        if self.history.should_skip(&norm.raw) {
            return Ok(ActionResult::skipped_debounced(format!(
                "Debounced repeat click on {}",
                norm.raw
            )));
        }

        // A dialog-scoped submit whose dialog is gone already ran.
        if norm.selector.looks_like_submit() && norm.dialog_scoped && dialog.is_none() {
            return Ok(ActionResult::skipped_idempotent(
                "Skipped submit: dialog already closed (likely submitted).",
            ));
        }

        // Chip-like selectors go through the open phase of the selection
        // protocol: dismiss any stray overlay, then label-first, scoped to
        // the dialog.
        if let Some(dlg) = &dialog {
            if selector_mentions_chip(&norm) {
                match popup.open_chip_generic(dlg, &norm).await {
                    OpenOutcome::Opened => {
                        return Ok(ActionResult::success(
                            "Opened chip via dialog-scoped, label-first strategy",
                        ));
                    }
                    OpenOutcome::NoPopup => {
                        if norm.dialog_scoped {
                            return Ok(ActionResult::success(
                                "Chip clicked but no popup appeared; treating as no-op.",
                            ));
                        }
                        return Ok(ActionResult::popup_timeout(format!(
                            "Clicked opener for '{}' but no menu or listbox appeared.",
                            norm.raw
                        )));
                    }
                    OpenOutcome::NotFound => {}
                }
            }
        }

        // Unscoped selectors resolve inside the open dialog, never against
        // identically-labelled elements underneath it.
        let mut loc = self.locator_for(&norm);
        if !norm.dialog_scoped {
            if let Some(dlg) = &dialog {
                loc = loc.within(dlg.root().clone());
            }
        }

        match loc.resolve_unique(IntentKind::Click).await? {
            Resolution::Found(el) => {
                let _ = el.scroll_into_view();
                el.click()?;
                Ok(ActionResult::success(format!("Clicked {}", norm.raw)))
            }
            Resolution::Ambiguous(n) => Ok(ActionResult::ambiguous(format!(
                "{n} elements matched '{}'; refine with accessible name or role.",
                norm.raw
            ))),
            Resolution::NotFound => self.click_fallback(&norm, dialog.as_ref(), &popup).await,
        }
    }

    /// Last-resort click paths once every strategy missed.
    async fn click_fallback(
        &self,
        norm: &NormalizedSelector,
        dialog: Option<&DialogContext>,
        popup: &PopupFlow<'_>,
    ) -> Result<ActionResult, AutomationError> {
        if let Some(dlg) = dialog {
            if let Some(text) = norm.selector.trailing_text() {
                if popup.click_chip_in_dialog(dlg, &text).await {
                    popup.wait_any_popup(self.config.popup_wait()).await;
                    return Ok(ActionResult::success(format!(
                        "Clicked dialog chip/button '{text}'"
                    )));
                }
            } else if norm.selector.name_pattern().is_none() {
                let lowered = norm.raw.to_lowercase();
                if let Some(token) = CHIP_TOKENS
                    .iter()
                    .find(|t| lowered.contains(&t.to_lowercase()))
                {
                    if popup.click_chip_in_dialog(dlg, token).await {
                        return Ok(ActionResult::success(format!(
                            "Clicked dialog chip/button '{token}'"
                        )));
                    }
                }
            }
        }

        if norm.dialog_scoped && popup.popup_open().await {
            return Ok(ActionResult::success(
                "Popup already open; skipping chip re-click.",
            ));
        }

        Ok(ActionResult::not_found(format!(
            "No element matched '{}'. Refine with accessible name, role, or aria-label.",
            norm.raw
        )))
    }

    async fn do_fill(&self, raw: &str, value: &str) -> Result<ActionResult, AutomationError> {
        let norm = normalizer::normalize(raw);
        let dialog = scope::visible_dialog(self.engine()).await;
        let scope_root = match (&dialog, norm.dialog_scoped) {
            (Some(dlg), false) => Some(dlg.root().clone()),
            _ => None,
        };

        let mut loc = self.locator_for(&norm);
        if let Some(root) = scope_root.clone() {
            loc = loc.within(root);
        }

        let mut candidates = loc.all().await.unwrap_or_default();
        if candidates.is_empty() && loc.wait_visible(None).await.is_ok() {
            candidates = loc.all().await.unwrap_or_default();
        }

        let long_value = value.chars().count() >= self.config.long_text_threshold;

        if candidates.len() > 1 && norm.selector.is_generic_editable() && !long_value {
            return Ok(ActionResult::ambiguous(format!(
                "Ambiguous selector '{}'. Refine with aria-label or role+name \
                 (e.g., [aria-label='Project description'] or textbox name=/project name/i).",
                norm.raw
            )));
        }

        if candidates.len() > 1 && long_value {
            // A paragraph-sized value belongs in the description-like field.
            if let Some(field) =
                locator::find_description_field(self.engine(), scope_root.as_ref()).await
            {
                self.write_value(&field, value).await?;
                return Ok(ActionResult::success(format!(
                    "Filled desc-like textbox with '{}'",
                    preview(value)
                )));
            }
            let first = candidates.remove(0);
            self.write_value(&first, value).await?;
            return Ok(ActionResult::success(format!(
                "Filled first of multi-match {} with '{}'",
                norm.raw,
                preview(value)
            )));
        }

        if let Some(el) = candidates.into_iter().next() {
            let current = normalize_ws(&el.display_text());
            let target = normalize_ws(value);
            if !current.is_empty() && !target.is_empty() && current == target {
                return Ok(ActionResult::skipped_idempotent(format!(
                    "Skipped fill for {}: already set.",
                    norm.raw
                )));
            }
            self.write_value(&el, value).await?;
            return Ok(ActionResult::success(format!(
                "Filled {} with '{}'",
                norm.raw,
                preview(value)
            )));
        }

        // Nothing matched the given selector: fall back to the field the
        // value's shape suggests, inside the dialog when one is open.
        let fallback = if long_value {
            locator::find_description_field(self.engine(), scope_root.as_ref()).await
        } else {
            locator::find_name_field(self.engine(), scope_root.as_ref()).await
        };
        if let Some(field) = fallback {
            self.write_value(&field, value).await?;
            let which = if long_value { "description" } else { "name" };
            return Ok(ActionResult::success(format!(
                "Filled {which} textbox with '{}'",
                preview(value)
            )));
        }

        Ok(ActionResult::not_found(format!(
            "Could not fill any field using selector '{}'.",
            norm.raw
        )))
    }

    /// Put `value` into an editable element. Rich-text regions often reject
    /// direct value assignment, so they are cleared with select-all +
    /// delete and retyped; plain inputs use value replacement with a
    /// click-then-type fallback.
    async fn write_value(
        &self,
        el: &ElementHandle,
        value: &str,
    ) -> Result<(), AutomationError> {
        if el.is_content_editable().unwrap_or(false) {
            el.click()?;
            self.engine().press_key(SELECT_ALL_CHORD).await?;
            self.engine().press_key("Backspace").await?;
            el.type_text(value)?;
        } else if el.set_value(value).is_err() {
            el.click()?;
            el.type_text(value)?;
        }
        Ok(())
    }

    async fn do_press(&self, key: &str) -> Result<ActionResult, AutomationError> {
        let key = if key.is_empty() { "Enter" } else { key };
        self.engine().press_key(key).await?;
        Ok(ActionResult::success(format!("Pressed key {key}")))
    }

    async fn do_navigate(&self, url: &str) -> Result<ActionResult, AutomationError> {
        self.engine().navigate(url).await?;
        Ok(ActionResult::success(format!("Navigated to {url}")))
    }
}

static CHIP_GATE: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(
        r"(?i)\b(status|priority|labels?|tags?|start|begin|from|target|due|end|to|owner|assignee|lead|members?|health|backlog)\b",
    )
    .unwrap()
});

/// Whether a selector plausibly targets a chip-like property opener.
/// Word-bounded so fragments like "to" never match inside "button".
fn selector_mentions_chip(norm: &NormalizedSelector) -> bool {
    CHIP_GATE.is_match(&norm.raw)
}

/// Fold an engine error into the outcome taxonomy.
fn result_from_error(err: AutomationError) -> ActionResult {
    match err {
        AutomationError::ElementNotFound(msg) => {
            ActionResult::not_found(format!("Element not found: {msg}"))
        }
        AutomationError::AmbiguousMatch(msg) => {
            ActionResult::ambiguous(format!("Ambiguous selector: {msg}"))
        }
        AutomationError::Timeout(msg) => ActionResult::error(format!("Timeout: {msg}")),
        other => ActionResult::error(format!("Error executing action: {other}")),
    }
}
