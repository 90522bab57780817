//! Element location against a re-rendering document.
//!
//! A [`Locator`] carries a selector plus an optional scope root and
//! resolves it through an ordered list of strategies, first success wins:
//!
//! 1. labelled group/region by accessible name, then a nested control
//! 2. direct accessible role + name match
//! 3. free-text containment within the scope
//! 4. CSS/structural query as given
//! 5. enumerated "current value" chip for known property families
//!
//! Every strategy failure converts into the next attempt; a strategy that
//! yields several equally-plausible candidates for a data-entering action
//! surfaces [`Resolution::Ambiguous`] instead of guessing.

use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::intent::IntentKind;
use crate::page::{ElementHandle, PageEngine};
use crate::selector::{NamePattern, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

/// Regex fragments for the closed value vocabularies of enumerated
/// property families. The chip showing the current value doubles as the
/// opener when no labelled control is exposed.
pub(crate) const STATUS_VALUES: &[&str] = &[
    "Backlog",
    "Planned",
    r"In\s*Progress",
    "Completed",
    "Canceled|Cancelled",
];
pub(crate) const PRIORITY_VALUES: &[&str] =
    &[r"No\s*priority", "Low", "Medium", "High", "Urgent"];

/// The value vocabulary implied by a property label, if the label names a
/// known enumerated family.
pub(crate) fn enum_family_values(label_text: &str) -> Option<&'static [&'static str]> {
    let lowered = label_text.to_lowercase();
    if lowered.contains("status") {
        Some(STATUS_VALUES)
    } else if lowered.contains("priority") {
        Some(PRIORITY_VALUES)
    } else {
        None
    }
}

/// Result of a uniqueness-checked resolution.
#[derive(Debug)]
pub enum Resolution {
    Found(ElementHandle),
    /// Several equally-plausible candidates; the count is surfaced so the
    /// caller can tell the planner to refine.
    Ambiguous(usize),
    NotFound,
}

/// A high-level API for finding elements in the live document.
///
/// For maximum precision prefer role+name patterns over broad text or CSS
/// selectors that can match several elements.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn PageEngine>,
    selector: Selector,
    timeout: Duration,
    poll: Duration,
    root: Option<ElementHandle>,
}

impl Locator {
    pub(crate) fn new(
        engine: Arc<dyn PageEngine>,
        selector: Selector,
        config: &EngineConfig,
    ) -> Self {
        Self {
            engine,
            selector,
            timeout: config.visibility_wait(),
            poll: config.poll_interval(),
            root: None,
        }
    }

    /// Set a default timeout for waiting operations on this locator.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Confine resolution to the subtree under `root`.
    pub fn within(mut self, root: ElementHandle) -> Self {
        self.root = Some(root);
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Snapshot of all currently visible matches. Chains are resolved left
    /// to right, each link scoping the next.
    pub async fn all(&self) -> Result<Vec<ElementHandle>, AutomationError> {
        match self.effective_scope().await? {
            None => Ok(Vec::new()),
            Some((scope, target)) => {
                let found = self.engine.find_elements(&target, scope.as_ref()).await?;
                Ok(visible_only(found))
            }
        }
    }

    /// First visible match of the current snapshot, if any.
    pub async fn first_visible(&self) -> Result<Option<ElementHandle>, AutomationError> {
        Ok(self.all().await?.into_iter().next())
    }

    /// Wait for a visible match, up to `timeout` (the locator default when
    /// `None`). Expiry converts to [`AutomationError::Timeout`].
    #[instrument(level = "debug", skip(self, timeout))]
    pub async fn wait_visible(
        &self,
        timeout: Option<Duration>,
    ) -> Result<ElementHandle, AutomationError> {
        let effective = timeout.unwrap_or(self.timeout);
        let deadline = Instant::now() + effective;
        loop {
            if let Some(el) = self.first_visible().await? {
                return Ok(el);
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "timed out after {effective:?} waiting for {}",
                    self.selector
                )));
            }
            sleep(self.poll).await;
        }
    }

    /// Run the ranked strategy list until one yields candidates, retrying
    /// the whole pass within the locator timeout when nothing matches yet.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve_unique(&self, kind: IntentKind) -> Result<Resolution, AutomationError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let candidates = self.ranked_pass().await?;
            match candidates.len() {
                0 => {
                    if Instant::now() >= deadline {
                        return Ok(Resolution::NotFound);
                    }
                    sleep(self.poll).await;
                }
                1 => return Ok(Resolution::Found(candidates.into_iter().next().unwrap())),
                n => {
                    if kind == IntentKind::Fill && self.selector.is_generic_editable() {
                        return Ok(Resolution::Ambiguous(n));
                    }
                    debug!(matches = n, "multiple candidates, taking first");
                    return Ok(Resolution::Found(candidates.into_iter().next().unwrap()));
                }
            }
        }
    }

    /// One pass over the strategies. Strategy-internal failures are
    /// swallowed: a broken probe is just a miss.
    async fn ranked_pass(&self) -> Result<Vec<ElementHandle>, AutomationError> {
        let Some((scope, target)) = self.effective_scope().await? else {
            return Ok(Vec::new());
        };
        let scope = scope.as_ref();

        let found = self.strategy_labelled_group(scope, &target).await;
        if !found.is_empty() {
            debug!(strategy = "labelled-group", n = found.len(), "matched");
            return Ok(found);
        }
        let found = self.strategy_role_name(scope, &target).await;
        if !found.is_empty() {
            debug!(strategy = "role-name", n = found.len(), "matched");
            return Ok(found);
        }
        let found = self.strategy_text(scope, &target).await;
        if !found.is_empty() {
            debug!(strategy = "text", n = found.len(), "matched");
            return Ok(found);
        }
        let found = self.strategy_css(scope, &target).await;
        if !found.is_empty() {
            debug!(strategy = "css", n = found.len(), "matched");
            return Ok(found);
        }
        let found = self.strategy_value_chip(scope, &target).await;
        if !found.is_empty() {
            debug!(strategy = "value-chip", n = found.len(), "matched");
        }
        Ok(found)
    }

    /// Resolve chain prefixes down to the scope the final part searches in.
    /// Returns `None` while a prefix link has no visible match.
    async fn effective_scope(
        &self,
    ) -> Result<Option<(Option<ElementHandle>, Selector)>, AutomationError> {
        let parts = self.selector.parts();
        if parts.len() < 2 {
            return Ok(Some((self.root.clone(), self.selector.last_part().clone())));
        }
        let mut scope = self.root.clone();
        for part in &parts[..parts.len() - 1] {
            let matches = self
                .engine
                .find_elements(part, scope.as_ref())
                .await
                .unwrap_or_default();
            match visible_only(matches).into_iter().next() {
                Some(el) => scope = Some(el),
                None => return Ok(None),
            }
        }
        Ok(Some((scope, parts[parts.len() - 1].clone())))
    }

    /// Strategy 1: find the labelled group/region, then a control inside it.
    async fn strategy_labelled_group(
        &self,
        scope: Option<&ElementHandle>,
        target: &Selector,
    ) -> Vec<ElementHandle> {
        let Selector::Role {
            name: Some(pat), ..
        } = target
        else {
            return Vec::new();
        };

        for container_role in ["group", "region"] {
            let groups = self
                .query(
                    &Selector::Role {
                        role: container_role.to_string(),
                        name: Some(pat.clone()),
                    },
                    scope,
                )
                .await;
            let Some(group) = groups.into_iter().next() else {
                continue;
            };
            for control in [
                Selector::Role {
                    role: "combobox".to_string(),
                    name: None,
                },
                Selector::Role {
                    role: "button".to_string(),
                    name: None,
                },
                Selector::Css("button".to_string()),
            ] {
                let controls = self.query(&control, Some(&group)).await;
                if !controls.is_empty() {
                    return controls;
                }
            }
        }
        Vec::new()
    }

    /// Strategy 2: direct role + accessible-name match on the scope root.
    async fn strategy_role_name(
        &self,
        scope: Option<&ElementHandle>,
        target: &Selector,
    ) -> Vec<ElementHandle> {
        let Selector::Role { role, name } = target else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for alternative in role.split('|') {
            let probe = Selector::Role {
                role: alternative.trim().to_string(),
                name: name.clone(),
            };
            found.extend(self.query(&probe, scope).await);
        }
        found
    }

    /// Strategy 3: free-text containment. Applies to text targets and, as a
    /// fallback, to role targets with a literal (non-regex) name.
    async fn strategy_text(
        &self,
        scope: Option<&ElementHandle>,
        target: &Selector,
    ) -> Vec<ElementHandle> {
        let needle = match target {
            Selector::Text(t) => t.clone(),
            Selector::Role {
                name: Some(pat), ..
            } if !pat.is_regex() => pat.source().to_string(),
            _ => return Vec::new(),
        };
        if needle.is_empty() {
            return Vec::new();
        }
        self.query(&Selector::Text(needle), scope).await
    }

    /// Strategy 4: pass the CSS/structural query through verbatim.
    async fn strategy_css(
        &self,
        scope: Option<&ElementHandle>,
        target: &Selector,
    ) -> Vec<ElementHandle> {
        let Selector::Css(_) = target else {
            return Vec::new();
        };
        self.query(target, scope).await
    }

    /// Strategy 5: last resort for enumerated properties. The selector
    /// names the property (Status, Priority) but the UI only exposes a chip
    /// showing the current value; match the chip through the family's
    /// closed vocabulary.
    async fn strategy_value_chip(
        &self,
        scope: Option<&ElementHandle>,
        target: &Selector,
    ) -> Vec<ElementHandle> {
        let label = match target {
            Selector::Role {
                name: Some(pat), ..
            } => pat.source().to_string(),
            Selector::Text(t) => t.clone(),
            Selector::Css(css) => css.clone(),
            Selector::Role { name: None, .. } => return Vec::new(),
            Selector::Chain(_) => return Vec::new(),
        };
        let Some(values) = enum_family_values(&label) else {
            return Vec::new();
        };
        for value in values {
            let chips = self
                .query(
                    &Selector::Role {
                        role: "button".to_string(),
                        name: Some(NamePattern::pattern(*value)),
                    },
                    scope,
                )
                .await;
            if !chips.is_empty() {
                return chips;
            }
        }
        Vec::new()
    }

    async fn query(&self, selector: &Selector, scope: Option<&ElementHandle>) -> Vec<ElementHandle> {
        match self.engine.find_elements(selector, scope).await {
            Ok(found) => visible_only(found),
            Err(e) => {
                debug!(error = %e, "query failed, treating as miss");
                Vec::new()
            }
        }
    }
}

fn visible_only(elements: Vec<ElementHandle>) -> Vec<ElementHandle> {
    elements
        .into_iter()
        .filter(|el| el.is_visible().unwrap_or(false))
        .collect()
}

/// The textbox a long description-like value belongs in: accessible name
/// mentioning description/summary, then aria-label fallbacks.
pub(crate) async fn find_description_field(
    engine: &Arc<dyn PageEngine>,
    scope: Option<&ElementHandle>,
) -> Option<ElementHandle> {
    let probes = [
        Selector::Role {
            role: "textbox".to_string(),
            name: Some(NamePattern::pattern("description|summary")),
        },
        Selector::Css(r#"[aria-label*="description" i]"#.to_string()),
        Selector::Css(r#"[aria-label*="summary" i]"#.to_string()),
    ];
    for probe in probes {
        if let Ok(found) = engine.find_elements(&probe, scope).await {
            if let Some(el) = visible_only(found).into_iter().next() {
                return Some(el);
            }
        }
    }
    None
}

/// The textbox a short name-like value belongs in.
pub(crate) async fn find_name_field(
    engine: &Arc<dyn PageEngine>,
    scope: Option<&ElementHandle>,
) -> Option<ElementHandle> {
    let probes = [
        Selector::Role {
            role: "textbox".to_string(),
            name: Some(NamePattern::pattern("project name|name")),
        },
        Selector::Css(r#"[aria-label*="name" i]"#.to_string()),
    ];
    for probe in probes {
        if let Ok(found) = engine.find_elements(&probe, scope).await {
            if let Some(el) = visible_only(found).into_iter().next() {
                return Some(el);
            }
        }
    }
    None
}
