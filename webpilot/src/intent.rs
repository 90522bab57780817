//! Wire types exchanged with the planning collaborator.
//!
//! The planner speaks JSON: one object per turn with an `action` tag plus
//! the fields that action needs. [`PlannedAction`] is the full wire shape
//! (intent + advisory screenshot flags + credential-request metadata);
//! [`Intent`] is the subset the engine executes.

use serde::{Deserialize, Serialize};

fn is_empty_string(opt: &Option<String>) -> bool {
    match opt {
        Some(s) => s.is_empty(),
        None => true,
    }
}

/// One executable intent. Immutable once issued to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    Click {
        #[serde(default)]
        selector: String,
    },
    Fill {
        #[serde(default)]
        selector: String,
        #[serde(default)]
        value: String,
    },
    /// Key press; an empty key means Enter.
    Press {
        #[serde(default, rename = "value")]
        key: String,
    },
    Navigate {
        #[serde(rename = "value")]
        url: String,
    },
    Done,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Click { .. } => IntentKind::Click,
            Intent::Fill { .. } => IntentKind::Fill,
            Intent::Press { .. } => IntentKind::Press,
            Intent::Navigate { .. } => IntentKind::Navigate,
            Intent::Done => IntentKind::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Click,
    Fill,
    Press,
    Navigate,
    Done,
}

/// Credential/value collection metadata attached to a `request_input` turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    #[serde(default)]
    pub selector: String,
    /// email | password | otp | code | phone | username | custom
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub mask: Option<bool>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub persist_key: Option<String>,
}

impl InputRequest {
    /// Sensitive fields are masked unless the planner says otherwise.
    pub fn should_mask(&self) -> bool {
        self.mask
            .unwrap_or_else(|| matches!(self.field.as_str(), "password" | "otp" | "code"))
    }
}

/// The planner's decision for one turn, as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    #[serde(flatten)]
    pub kind: PlannedKind,
    /// Advisory: the persistence collaborator may capture a screenshot.
    #[serde(default)]
    pub take_screenshot: bool,
    /// Advisory: short description persisted with the step.
    #[serde(default)]
    pub screenshot_description: String,
}

/// All turn kinds the planner may emit: the five engine intents plus the
/// out-of-band credential request, plus `done` possibly carrying stray
/// input metadata that the caller loop inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedKind {
    Click {
        #[serde(default)]
        selector: String,
    },
    Fill {
        #[serde(default)]
        selector: String,
        #[serde(default)]
        value: String,
    },
    Press {
        #[serde(default, rename = "value")]
        key: String,
    },
    Navigate {
        #[serde(rename = "value")]
        url: String,
    },
    RequestInput {
        #[serde(default)]
        selector: String,
        #[serde(default)]
        field: String,
        #[serde(default)]
        prompt: String,
        #[serde(default)]
        mask: Option<bool>,
        #[serde(default, skip_serializing_if = "is_empty_string")]
        persist_key: Option<String>,
    },
    Done {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        selector: String,
        #[serde(default, skip_serializing_if = "is_empty_string")]
        field: Option<String>,
        #[serde(default, skip_serializing_if = "is_empty_string")]
        prompt: Option<String>,
    },
}

impl PlannedKind {
    /// The engine intent this turn maps to, `None` for `request_input`.
    pub fn as_intent(&self) -> Option<Intent> {
        match self {
            PlannedKind::Click { selector } => Some(Intent::Click {
                selector: selector.clone(),
            }),
            PlannedKind::Fill { selector, value } => Some(Intent::Fill {
                selector: selector.clone(),
                value: value.clone(),
            }),
            PlannedKind::Press { key } => Some(Intent::Press { key: key.clone() }),
            PlannedKind::Navigate { url } => Some(Intent::Navigate { url: url.clone() }),
            PlannedKind::Done { .. } => Some(Intent::Done),
            PlannedKind::RequestInput { .. } => None,
        }
    }

    pub fn input_request(&self) -> Option<InputRequest> {
        match self {
            PlannedKind::RequestInput {
                selector,
                field,
                prompt,
                mask,
                persist_key,
            } => Some(InputRequest {
                selector: selector.clone(),
                field: field.clone(),
                prompt: prompt.clone(),
                mask: *mask,
                persist_key: persist_key.clone(),
            }),
            _ => None,
        }
    }

    /// A `done` that smuggles input metadata is a disguised input request.
    pub fn done_carries_input_meta(&self) -> bool {
        match self {
            PlannedKind::Done {
                selector,
                field,
                prompt,
            } => {
                !selector.trim().is_empty()
                    || field.as_deref().is_some_and(|f| !f.is_empty())
                    || prompt.as_deref().is_some_and(|p| !p.is_empty())
            }
            _ => false,
        }
    }
}

/// Terminal classification of one executed intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The target already reflected the desired state; nothing was mutated.
    SkippedIdempotent,
    /// Suppressed as a repeat of a recent identical attempt.
    SkippedDebounced,
    NotFound,
    Ambiguous,
    PopupTimeout,
    Error,
}

impl Outcome {
    /// Outcomes that count toward the caller loop's failure streak.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::NotFound | Outcome::Ambiguous | Outcome::PopupTimeout | Outcome::Error
        )
    }
}

/// What happened to one intent. Returned synchronously; never thrown.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub outcome: Outcome,
    /// Concise, actionable summary retained as the "last result" the
    /// planner sees on its next turn.
    pub message: String,
    /// Advisory flags copied through from the planned action.
    pub take_screenshot: bool,
    pub screenshot_description: String,
}

impl ActionResult {
    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
            take_screenshot: false,
            screenshot_description: String::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Outcome::Success, message)
    }

    pub fn skipped_idempotent(message: impl Into<String>) -> Self {
        Self::new(Outcome::SkippedIdempotent, message)
    }

    pub fn skipped_debounced(message: impl Into<String>) -> Self {
        Self::new(Outcome::SkippedDebounced, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Outcome::NotFound, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(Outcome::Ambiguous, message)
    }

    pub fn popup_timeout(message: impl Into<String>) -> Self {
        Self::new(Outcome::PopupTimeout, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Outcome::Error, message)
    }

    pub fn with_advisory(mut self, take_screenshot: bool, description: &str) -> Self {
        self.take_screenshot = take_screenshot;
        self.screenshot_description = description.to_string();
        self
    }
}
