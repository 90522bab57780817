//! Typed selector AST and the grammar accepted from the planner.
//!
//! The planner emits Playwright-flavored selector strings:
//!
//! ```text
//! selector  := part ( ">>" part )*
//! part      := role-part | text-part | css-part
//! role-part := ("role=" | "role:") ROLE [ "[" "name=" name-pat "]" ]
//!            | ROLE " name=" name-pat            (bare known-role shorthand)
//! text-part := "text=" ( quoted | bare )
//! name-pat  := "/" regex "/" [ "i" ] | quoted | bare
//! css-part  := anything else, passed through to the backend verbatim
//! ```
//!
//! Parsing never fails: unknown syntax becomes a [`Selector::Css`] part so a
//! selector the grammar does not understand still reaches the backend.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Roles accepted by the bare `ROLE name=...` shorthand.
const KNOWN_ROLES: &[&str] = &[
    "button",
    "checkbox",
    "combobox",
    "dialog",
    "group",
    "heading",
    "link",
    "listbox",
    "menu",
    "menuitem",
    "menuitemradio",
    "option",
    "radio",
    "region",
    "switch",
    "tab",
    "textbox",
];

/// Roles whose items live inside a transient overlay.
const POPUP_ITEM_ROLES: &[&str] = &["menuitem", "menuitemradio", "option"];

static SUBMIT_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(create|save|submit|confirm|finish|publish|done)\b").unwrap()
});

/// Accessible-name pattern attached to a role part.
///
/// `/re/i` patterns compile case-insensitively; literal names match by
/// case-insensitive containment, mirroring accessible-name lookup in the
/// backends this engine drives.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Option<Regex>,
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.regex.is_some() == other.regex.is_some()
    }
}

impl NamePattern {
    pub fn literal(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            regex: None,
        }
    }

    /// Compile a `/re/i` body. An invalid pattern degrades to a literal
    /// match on the raw source rather than failing the parse.
    pub fn pattern(source: impl Into<String>) -> Self {
        let source = source.into();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .ok();
        Self { source, regex }
    }

    pub fn matches(&self, haystack: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(haystack),
            None => haystack
                .to_lowercase()
                .contains(&self.source.to_lowercase()),
        }
    }

    pub fn is_regex(&self) -> bool {
        self.regex.is_some()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Recover the plain value a pattern was built from, stripping the
    /// anchors the normalizer adds. `/^In Progress$/i` yields `In Progress`.
    pub fn literal_value(&self) -> String {
        let mut s = self.source.as_str();
        s = s.strip_prefix('^').unwrap_or(s);
        s = s.strip_suffix('$').unwrap_or(s);
        s.replace('\\', "").trim().to_string()
    }
}

/// One resolvable selector, or a chain of them scoping left to right.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Accessible role plus optional accessible-name pattern. The role may
    /// carry `|`-separated alternatives (`button|combobox`).
    Role {
        role: String,
        name: Option<NamePattern>,
    },
    /// Case-insensitive visible-text containment.
    Text(String),
    /// CSS/structural query passed to the backend verbatim.
    Css(String),
    /// `parent >> child` scope chaining.
    Chain(Vec<Selector>),
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        parse(s)
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        parse(&s)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Role { role, name: None } => write!(f, "role={role}"),
            Selector::Role {
                role,
                name: Some(pat),
            } => {
                if pat.is_regex() {
                    write!(f, "role={role}[name=/{}/i]", pat.source())
                } else {
                    write!(f, "role={role}[name=\"{}\"]", pat.source())
                }
            }
            Selector::Text(t) => write!(f, "text={t}"),
            Selector::Css(c) => write!(f, "{c}"),
            Selector::Chain(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", rendered.join(" >> "))
            }
        }
    }
}

/// Parse a planner selector string. Never fails.
pub fn parse(input: &str) -> Selector {
    let input = input.trim();
    let parts = split_chain(input);
    if parts.len() > 1 {
        return Selector::Chain(parts.iter().map(|p| parse_part(p)).collect());
    }
    parse_part(input)
}

/// Split on `>>` outside quotes and brackets.
fn split_chain(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' | '(' => {
                    depth += 1;
                    current.push(c);
                }
                ']' | ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                '>' if depth == 0 && chars.get(i + 1) == Some(&'>') => {
                    parts.push(current.trim().to_string());
                    current = String::new();
                    i += 1;
                }
                _ => current.push(c),
            },
        }
        i += 1;
    }
    parts.push(current.trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_part(part: &str) -> Selector {
    let trimmed = part.trim();

    if let Some(rest) = trimmed
        .strip_prefix("role=")
        .or_else(|| trimmed.strip_prefix("role:"))
    {
        if let Some(sel) = parse_role_part(rest) {
            return sel;
        }
        return Selector::Css(trimmed.to_string());
    }

    if let Some(rest) = trimmed.strip_prefix("text=") {
        return Selector::Text(unquote(rest));
    }

    // Bare `textbox name=/description|summary/i` shorthand for known roles.
    if let Some((head, tail)) = trimmed.split_once(" name=") {
        let head = head.trim();
        if head
            .split('|')
            .all(|r| KNOWN_ROLES.contains(&r.trim().to_lowercase().as_str()))
        {
            return Selector::Role {
                role: head.to_lowercase(),
                name: Some(parse_name_pattern(tail.trim())),
            };
        }
    }

    Selector::Css(trimmed.to_string())
}

fn parse_role_part(rest: &str) -> Option<Selector> {
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    match rest.find('[') {
        None => Some(Selector::Role {
            role: rest.to_lowercase(),
            name: None,
        }),
        Some(open) => {
            let role = rest[..open].trim().to_lowercase();
            if role.is_empty() {
                return None;
            }
            let attrs = rest[open + 1..].strip_suffix(']')?;
            let name_val = attrs.trim().strip_prefix("name=")?;
            Some(Selector::Role {
                role,
                name: Some(parse_name_pattern(name_val.trim())),
            })
        }
    }
}

fn parse_name_pattern(raw: &str) -> NamePattern {
    let raw = raw.trim();
    // /re/ with optional trailing i flag
    if let Some(body) = raw.strip_prefix('/') {
        let body = body
            .strip_suffix("/i")
            .or_else(|| body.strip_suffix('/'))
            .unwrap_or(body);
        return NamePattern::pattern(body);
    }
    NamePattern::literal(unquote(raw))
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

impl Selector {
    pub fn parts(&self) -> &[Selector] {
        match self {
            Selector::Chain(parts) => parts,
            _ => std::slice::from_ref(self),
        }
    }

    pub fn last_part(&self) -> &Selector {
        match self {
            Selector::Chain(parts) => parts.last().unwrap_or(self),
            _ => self,
        }
    }

    /// Role alternatives of a role part (`button|combobox` yields both).
    pub fn roles(&self) -> Vec<&str> {
        match self {
            Selector::Role { role, .. } => role.split('|').map(|r| r.trim()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn name_pattern(&self) -> Option<&NamePattern> {
        match self.last_part() {
            Selector::Role { name, .. } => name.as_ref(),
            _ => None,
        }
    }

    /// True when any part scopes into a dialog.
    pub fn scopes_into_dialog(&self) -> bool {
        self.parts()
            .iter()
            .any(|p| matches!(p, Selector::Role { role, .. } if role.split('|').any(|r| r == "dialog")))
    }

    /// True when the final target is an enumerated option inside an overlay.
    pub fn is_popup_item(&self) -> bool {
        self.parts().iter().any(|p| {
            p.roles()
                .iter()
                .any(|r| POPUP_ITEM_ROLES.contains(r))
        })
    }

    /// The desired value implied by a popup-item or trailing-text selector.
    pub fn desired_value(&self) -> Option<String> {
        for part in self.parts() {
            if part
                .roles()
                .iter()
                .any(|r| POPUP_ITEM_ROLES.contains(r))
            {
                if let Selector::Role {
                    name: Some(pat), ..
                } = part
                {
                    let value = pat.literal_value();
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
        }
        self.trailing_text()
    }

    /// The literal text of a trailing `text=` part, if any.
    pub fn trailing_text(&self) -> Option<String> {
        match self.last_part() {
            Selector::Text(t) if !t.is_empty() => Some(t.clone()),
            _ => None,
        }
    }

    /// Generic editable-region selectors that may match many fields at once.
    pub fn is_generic_editable(&self) -> bool {
        match self.last_part() {
            Selector::Role { role, name } => {
                role.split('|').any(|r| r == "textbox") && name.is_none()
            }
            Selector::Css(css) => {
                let lowered = css.to_lowercase();
                lowered.contains("contenteditable")
                    || lowered == "textarea"
                    || lowered == "input"
                    || lowered.contains("[role=\"textbox\"]")
                    || lowered.contains("[role='textbox']")
            }
            _ => false,
        }
    }

    /// Whether this selector targets a form-submit control.
    pub fn looks_like_submit(&self) -> bool {
        self.parts().iter().any(|p| match p {
            Selector::Role { role, name } => {
                role.split('|').any(|r| r == "button")
                    && name
                        .as_ref()
                        .is_some_and(|pat| SUBMIT_LABEL.is_match(pat.source()))
            }
            Selector::Text(t) => SUBMIT_LABEL.is_match(t),
            Selector::Css(css) => {
                css.to_lowercase().contains("button:has-text") && SUBMIT_LABEL.is_match(css)
            }
            Selector::Chain(_) => false,
        })
    }
}
