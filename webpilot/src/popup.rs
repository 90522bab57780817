//! Two-phase selection protocol for enumerated-value controls.
//!
//! Phase one opens the property's chip/button and waits for a transient
//! menu/listbox overlay; phase two selects the desired value inside the
//! overlay and confirms the chip now displays it. A selection whose
//! verification lags the UI is reported as success with an "unverified"
//! qualifier and is not retried, to avoid duplicate selection clicks.

use crate::config::EngineConfig;
use crate::intent::ActionResult;
use crate::locator::enum_family_values;
use crate::normalizer::NormalizedSelector;
use crate::page::{ElementHandle, PageEngine};
use crate::scope::DialogContext;
use crate::selector::{NamePattern, Selector};
use crate::utils::normalize_ws;
use once_cell::sync::Lazy;
use regex::RegexBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Property labels that identify chip-like openers.
pub(crate) const CHIP_LABEL_HINTS: &[&str] = &[
    "status",
    "priority",
    "labels?",
    "tags?",
    "start|begin|from",
    "target|due|end|to",
    "owner|assignee|lead|members?",
    "health",
];

/// Structural marker some design systems put on transient popovers that
/// expose no menu/listbox role.
const POPOVER_CSS: &str = "[data-animated-popover-content]";

/// Option roles searched inside an overlay, most specific first.
const ITEM_ROLES: &[&str] = &["menuitemradio", "menuitem", "option"];

static CHIP_HINT_PATTERNS: Lazy<Vec<regex::Regex>> = Lazy::new(|| {
    CHIP_LABEL_HINTS
        .iter()
        .map(|h| {
            // Word-bounded so short fragments like "to" never match inside
            // unrelated words ("button").
            RegexBuilder::new(&format!(r"\b(?:{h})\b"))
                .case_insensitive(true)
                .build()
                .expect("chip hint patterns are static")
        })
        .collect()
});

/// Result of the open phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenOutcome {
    /// An overlay appeared; the opener was correct even if the name match
    /// was approximate.
    Opened,
    /// Something was clicked but no overlay followed, even after the
    /// keyboard retry.
    NoPopup,
    /// No plausible opener was found at all.
    NotFound,
}

pub(crate) struct PopupFlow<'a> {
    engine: &'a Arc<dyn PageEngine>,
    config: &'a EngineConfig,
}

impl<'a> PopupFlow<'a> {
    pub fn new(engine: &'a Arc<dyn PageEngine>, config: &'a EngineConfig) -> Self {
        Self { engine, config }
    }

    /// First visible overlay root: menu, listbox, or marked popover.
    pub async fn overlay_root(&self) -> Option<ElementHandle> {
        for probe in [
            Selector::Role {
                role: "menu".to_string(),
                name: None,
            },
            Selector::Role {
                role: "listbox".to_string(),
                name: None,
            },
            Selector::Css(POPOVER_CSS.to_string()),
        ] {
            if let Ok(found) = self.engine.find_elements(&probe, None).await {
                if let Some(el) = found
                    .into_iter()
                    .find(|el| el.is_visible().unwrap_or(false))
                {
                    return Some(el);
                }
            }
        }
        None
    }

    pub async fn popup_open(&self) -> bool {
        self.overlay_root().await.is_some()
    }

    /// Poll for an overlay to appear within `timeout`.
    pub async fn wait_any_popup(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.popup_open().await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    /// Close a stray popover (date picker, another menu) before opening a
    /// new one. Safe to call when nothing is open.
    pub async fn dismiss_popover(&self) {
        if self.popup_open().await {
            let _ = self.engine.press_key("Escape").await;
            sleep(self.config.popup_close_poll()).await;
        }
    }

    /// Click an opener and wait for an overlay; retry once with a keyboard
    /// open gesture before giving up.
    async fn click_and_wait(&self, opener: &ElementHandle) -> bool {
        let _ = opener.scroll_into_view();
        if opener.click().is_err() {
            return false;
        }
        if self.wait_any_popup(self.config.popup_wait()).await {
            return true;
        }
        if self.engine.press_key("ArrowDown").await.is_ok()
            && self.wait_any_popup(self.config.popup_retry_wait()).await
        {
            return true;
        }
        false
    }

    /// Open a property picker inside the currently visible dialog.
    ///
    /// Strategy order: labelled row group and its nested control; direct
    /// combobox/button by accessible name; row located by visible label
    /// text; finally the chip showing the family's current value.
    pub async fn open_property_chip(
        &self,
        dialog: &DialogContext,
        label: &NamePattern,
    ) -> OpenOutcome {
        self.dismiss_popover().await;
        let dlg = dialog.root();
        let mut clicked_any = false;

        // Labelled group/region, then a control nested in it.
        for container_role in ["group", "region"] {
            let rows = self
                .query_visible(
                    &Selector::Role {
                        role: container_role.to_string(),
                        name: Some(label.clone()),
                    },
                    Some(dlg),
                )
                .await;
            if let Some(row) = rows.into_iter().next() {
                for control in ["combobox", "button"] {
                    if let Some(ctl) = self.first_role(control, None, Some(&row)).await {
                        clicked_any = true;
                        if self.click_and_wait(&ctl).await {
                            return OpenOutcome::Opened;
                        }
                    }
                }
                if let Some(btn) = self
                    .query_visible(&Selector::Css("button".to_string()), Some(&row))
                    .await
                    .into_iter()
                    .next()
                {
                    clicked_any = true;
                    if self.click_and_wait(&btn).await {
                        return OpenOutcome::Opened;
                    }
                }
            }
        }

        // Direct role match by accessible name.
        for role in ["combobox", "button"] {
            if let Some(ctl) = self.first_role(role, Some(label.clone()), Some(dlg)).await {
                clicked_any = true;
                if self.click_and_wait(&ctl).await {
                    return OpenOutcome::Opened;
                }
            }
        }

        // Row located by visible label text, then a control inside it.
        let literal = label.literal_value();
        if !literal.is_empty() {
            let rows = self
                .query_visible(&Selector::Text(literal), Some(dlg))
                .await;
            if let Some(row) = rows.into_iter().next() {
                for control in ["combobox", "button"] {
                    if let Some(ctl) = self.first_role(control, None, Some(&row)).await {
                        clicked_any = true;
                        if self.click_and_wait(&ctl).await {
                            return OpenOutcome::Opened;
                        }
                    }
                }
            }
        }

        // Last resort: only the current value is visible; the chip showing
        // it is the opener.
        if let Some(values) = enum_family_values(label.source()) {
            for value in values {
                if let Some(chip) = self
                    .first_role("button", Some(NamePattern::pattern(*value)), Some(dlg))
                    .await
                {
                    clicked_any = true;
                    if self.click_and_wait(&chip).await {
                        return OpenOutcome::Opened;
                    }
                }
            }
        }

        if clicked_any {
            OpenOutcome::NoPopup
        } else {
            OpenOutcome::NotFound
        }
    }

    /// Open a chip for a selector that may only loosely identify the
    /// property: accessible-name pattern first, then the curated label
    /// hints found in the raw selector, then its trailing text.
    pub async fn open_chip_generic(
        &self,
        dialog: &DialogContext,
        norm: &NormalizedSelector,
    ) -> OpenOutcome {
        let mut saw_no_popup = false;

        if let Some(pat) = norm.selector.name_pattern() {
            match self.open_property_chip(dialog, pat).await {
                OpenOutcome::Opened => return OpenOutcome::Opened,
                OpenOutcome::NoPopup => saw_no_popup = true,
                OpenOutcome::NotFound => {}
            }
        }

        for (hint, pattern) in CHIP_LABEL_HINTS.iter().zip(CHIP_HINT_PATTERNS.iter()) {
            if pattern.is_match(&norm.raw) {
                match self
                    .open_property_chip(dialog, &NamePattern::pattern(*hint))
                    .await
                {
                    OpenOutcome::Opened => return OpenOutcome::Opened,
                    OpenOutcome::NoPopup => saw_no_popup = true,
                    OpenOutcome::NotFound => {}
                }
            }
        }

        if let Some(text) = norm.selector.trailing_text() {
            if self.click_chip_in_dialog(dialog, &text).await {
                if self.wait_any_popup(self.config.popup_wait()).await {
                    return OpenOutcome::Opened;
                }
                saw_no_popup = true;
            }
        }

        if saw_no_popup {
            OpenOutcome::NoPopup
        } else {
            OpenOutcome::NotFound
        }
    }

    /// Click a chip/button in the dialog by its visible text. Returns
    /// whether anything was clicked.
    pub async fn click_chip_in_dialog(&self, dialog: &DialogContext, text: &str) -> bool {
        let dlg = dialog.root();
        let escaped = NamePattern::pattern(regex::escape(text));
        if let Some(btn) = self.first_role("button", Some(escaped), Some(dlg)).await {
            if btn.click().is_ok() {
                return true;
            }
        }
        if let Some(el) = self
            .query_visible(&Selector::Text(text.to_string()), Some(dlg))
            .await
            .into_iter()
            .next()
        {
            if el.click().is_ok() {
                return true;
            }
        }
        false
    }

    /// Whether any chip in the dialog already displays `desired`. Works
    /// even when the owning property is unknown.
    pub async fn any_chip_has_value(&self, dialog: &DialogContext, desired: &str) -> bool {
        let pattern = match RegexBuilder::new(&regex::escape(desired))
            .case_insensitive(true)
            .build()
        {
            Ok(p) => p,
            Err(_) => return false,
        };
        let chips = self
            .query_visible(
                &Selector::Role {
                    role: "button".to_string(),
                    name: None,
                },
                Some(dialog.root()),
            )
            .await;
        for chip in chips.into_iter().take(self.config.max_chip_scan) {
            let text = normalize_ws(&chip.display_text());
            if !text.is_empty() && pattern.is_match(&text) {
                return true;
            }
        }
        false
    }

    /// Phase two: select `desired` inside the open overlay. Searches exact
    /// option roles, then free text, then a filter input; falls back to
    /// document-wide probes for overlays rendered outside the marked roots.
    pub async fn select_from_popup(&self, desired: &str) -> bool {
        if !self.wait_any_popup(self.config.popup_wait()).await {
            return false;
        }
        let pattern = NamePattern::pattern(regex::escape(desired));

        if let Some(overlay) = self.overlay_root().await {
            for item_role in ITEM_ROLES {
                if let Some(item) = self
                    .first_role(item_role, Some(pattern.clone()), Some(&overlay))
                    .await
                {
                    if self.try_click(&item) {
                        return true;
                    }
                }
            }
            if let Some(el) = self
                .query_visible(&Selector::Text(desired.to_string()), Some(&overlay))
                .await
                .into_iter()
                .next()
            {
                if self.try_click(&el) {
                    return true;
                }
            }
            // Virtualized lists hide options until filtered.
            if let Some(filter) = self
                .query_visible(&Selector::Css("input".to_string()), Some(&overlay))
                .await
                .into_iter()
                .next()
            {
                if filter.set_value(desired).is_err() {
                    let _ = filter.type_text(desired);
                }
                if self.engine.press_key("Enter").await.is_ok() {
                    return true;
                }
            }
        }

        for item_role in ITEM_ROLES {
            if let Some(item) = self.first_role(item_role, Some(pattern.clone()), None).await {
                if self.try_click(&item) {
                    return true;
                }
            }
        }
        if let Some(el) = self
            .query_visible(&Selector::Text(desired.to_string()), None)
            .await
            .into_iter()
            .next()
        {
            if self.try_click(&el) {
                return true;
            }
        }
        false
    }

    /// Poll briefly for the overlay to close after a selection click.
    pub async fn wait_popup_closed(&self) -> bool {
        for _ in 0..self.config.popup_close_polls {
            if !self.popup_open().await {
                return true;
            }
            sleep(self.config.popup_close_poll()).await;
        }
        !self.popup_open().await
    }

    /// Full selection turn for a popup-item selector: idempotency check,
    /// selection, close poll, chip verification. Returns `None` when no
    /// selection happened so the caller can fall through to a raw click.
    pub async fn select_and_verify(
        &self,
        dialog: Option<&DialogContext>,
        desired: &str,
    ) -> Option<ActionResult> {
        if let Some(dlg) = dialog {
            if self.any_chip_has_value(dlg, desired).await {
                return Some(ActionResult::skipped_idempotent(format!(
                    "Skipped selecting '{desired}': already set."
                )));
            }
        }

        if !self.select_from_popup(desired).await {
            return None;
        }

        sleep(self.config.popup_close_poll()).await;
        self.wait_popup_closed().await;

        let verified = match dialog {
            Some(dlg) => self.any_chip_has_value(dlg, desired).await,
            None => false,
        };
        let result = if verified {
            ActionResult::success(format!("Selected '{desired}' from popup"))
        } else {
            debug!(desired, "selection click completed but value not confirmed");
            ActionResult::success(format!("Clicked '{desired}' from popup (unverified)"))
        };
        Some(result)
    }

    fn try_click(&self, el: &ElementHandle) -> bool {
        let _ = el.scroll_into_view();
        el.click().is_ok()
    }

    async fn first_role(
        &self,
        role: &str,
        name: Option<NamePattern>,
        scope: Option<&ElementHandle>,
    ) -> Option<ElementHandle> {
        self.query_visible(
            &Selector::Role {
                role: role.to_string(),
                name,
            },
            scope,
        )
        .await
        .into_iter()
        .next()
    }

    async fn query_visible(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> Vec<ElementHandle> {
        match self.engine.find_elements(selector, scope).await {
            Ok(found) => found
                .into_iter()
                .filter(|el| el.is_visible().unwrap_or(false))
                .collect(),
            Err(e) => {
                debug!(error = %e, "overlay query failed, treating as miss");
                Vec::new()
            }
        }
    }
}
