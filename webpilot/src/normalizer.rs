//! Canonicalization of planner-supplied selector strings.
//!
//! Planners reach for brittle container-text navigation patterns
//! (`aside:has-text("Your teams") >> text=Projects`) that break whenever a
//! sidebar re-renders. For a small curated vocabulary of primary navigation
//! labels these are rewritten into equivalent accessible-role link patterns
//! before resolution. Everything else passes through unchanged: this
//! transform is pure and never fails.

use crate::selector::{self, Selector};
use once_cell::sync::Lazy;
use regex::Regex;

/// Quoted-or-bare label capture shared by the nav rewrites.
const TEXT_PAT: &str = r#"(?:"([^"]+)"|'([^']+)'|([^\s][^>]*))"#;

static ASIDE_NAV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?i)aside:has-text\(\s*"(?:your teams|workspace)"\s*\)\s*>>\s*text\s*=\s*{TEXT_PAT}"#
    ))
    .unwrap()
});

static NAV_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)nav\s*>>\s*text\s*=\s*{TEXT_PAT}")).unwrap());

static BARE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^text\s*=\s*{TEXT_PAT}$")).unwrap());

/// Labels safe to rewrite into a `role=link` pattern.
static PRIMARY_NAV_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(projects|issues|views|inbox|my issues)$").unwrap());

/// Characters that mark a raw planner string as CSS rather than bare text.
const CSS_SIGNS: &[char] = &[
    '#', '[', '.', '>', ':', '"', '\'', '\\', '=', ')', '(',
];
const CSS_TAG_PREFIXES: &[&str] = &[
    "nav", "div", "span", "button", "input", "a ", "ul", "li", "section", "aside", "main",
    "form", "label", "textarea", "select",
];

/// A selector in canonical form plus the resolution hints derived from it.
#[derive(Debug, Clone)]
pub struct NormalizedSelector {
    /// The (possibly rewritten) selector string, kept for messages and for
    /// the debounce ledger key.
    pub raw: String,
    pub selector: Selector,
    /// The planner scoped this selector into a dialog explicitly.
    pub dialog_scoped: bool,
    /// The selector uses `>>` scope chaining.
    pub chained: bool,
}

impl NormalizedSelector {
    pub fn is_popup_item(&self) -> bool {
        self.selector.is_popup_item()
    }
}

/// Canonicalize a raw planner selector. Worst case returns the input
/// unchanged as a CSS passthrough.
pub fn normalize(raw: &str) -> NormalizedSelector {
    let trimmed = raw.trim();
    let rewritten = rewrite_nav(trimmed);

    let selector = if looks_like_grammar(&rewritten) {
        selector::parse(&rewritten)
    } else {
        // Bare words with no CSS markers are a visible-text lookup.
        Selector::Text(rewritten.clone())
    };

    let lowered = rewritten.to_lowercase();
    NormalizedSelector {
        dialog_scoped: lowered.contains("role=dialog") || rewritten.contains(">>"),
        chained: rewritten.contains(">>"),
        raw: rewritten,
        selector,
    }
}

/// Rewrite known-fragile navigation patterns to a role=link form.
fn rewrite_nav(raw: &str) -> String {
    for re in [&*ASIDE_NAV, &*NAV_TEXT] {
        if let Some(caps) = re.captures(raw) {
            if let Some(label) = first_group(&caps) {
                return link_selector(&label);
            }
        }
    }

    if let Some(caps) = BARE_TEXT.captures(raw) {
        if let Some(label) = first_group(&caps) {
            if PRIMARY_NAV_LABEL.is_match(&label) {
                return link_selector(&label);
            }
        }
    }

    raw.to_string()
}

fn first_group(caps: &regex::Captures<'_>) -> Option<String> {
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().trim().to_string())
        .find(|s| !s.is_empty())
}

fn link_selector(label: &str) -> String {
    format!("role=link[name=/^{}$/i]", regex::escape(label))
}

/// Whether a raw string is already in the selector grammar (or CSS), as
/// opposed to bare visible text.
fn looks_like_grammar(s: &str) -> bool {
    let lowered = s.to_lowercase();
    if s.contains(">>")
        || lowered.starts_with("role=")
        || lowered.starts_with("role:")
        || lowered.starts_with("text=")
    {
        return true;
    }
    if CSS_TAG_PREFIXES
        .iter()
        .any(|t| lowered.starts_with(t))
    {
        return true;
    }
    s.contains(CSS_SIGNS)
}
