//! The caller loop around the engine.
//!
//! One turn per planner decision: gather visible text, ask the planner,
//! execute the resulting intent, feed the result message back. The loop
//! owns the circuit breakers (step cap, consecutive-failure cap, repeated
//! fill guard) and the credential round-trip; the engine itself knows
//! nothing about any of these.

use crate::config::EngineConfig;
use crate::executor::ActionExecutor;
use crate::intent::{InputRequest, Intent, PlannedAction, PlannedKind};
use crate::Session;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Phrases that mark an authentication/verification screen. `done` is
/// never accepted while one is visible.
static AUTH_SCREEN_MARKERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "log in",
        "login",
        "sign in",
        "sign-in",
        "continue with email",
        "verification code",
        "one-time code",
        "otp",
        "enter code",
        "magic link",
        "back to login",
        "continue with login code",
    ]
});

fn looks_like_auth_screen(visible_text: &str) -> bool {
    let lowered = visible_text.to_lowercase();
    AUTH_SCREEN_MARKERS.iter().any(|k| lowered.contains(k))
}

/// The planning collaborator: a black box consuming page state and history
/// and emitting one decision per turn.
#[async_trait::async_trait]
pub trait Planner: Send {
    async fn next_action(
        &mut self,
        task: &str,
        visible_text: &str,
        previous_result: Option<&str>,
        last_screenshot: Option<&PathBuf>,
    ) -> anyhow::Result<PlannedAction>;
}

/// Out-of-band human input (credentials, one-time codes).
#[async_trait::async_trait]
pub trait InputCollector: Send {
    async fn request(&mut self, request: &InputRequest) -> anyhow::Result<String>;
}

/// Persistence collaborator for the advisory screenshot flags. Returns the
/// captured path, if any, for the planner's next turn.
#[async_trait::async_trait]
pub trait StepRecorder: Send {
    async fn record_step(
        &mut self,
        step: u32,
        description: &str,
    ) -> anyhow::Result<Option<PathBuf>>;
}

/// Circuit-breaker policy. These caps are caller policy, not part of the
/// engine contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverPolicy {
    pub max_steps: u32,
    pub max_fail_streak: u32,
    /// Identical fill targets tolerated before the planner is told to
    /// propose a more specific selector.
    pub fill_repeat_limit: u32,
}

impl Default for DriverPolicy {
    fn default() -> Self {
        Self {
            max_steps: 40,
            max_fail_streak: 3,
            fill_repeat_limit: 3,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps: u32,
    pub completed: bool,
    pub last_result: String,
}

/// Drives one task to completion or to a circuit breaker.
pub struct Driver<P, I, R> {
    executor: ActionExecutor,
    planner: P,
    inputs: I,
    recorder: R,
    policy: DriverPolicy,
}

impl<P: Planner, I: InputCollector, R: StepRecorder> Driver<P, I, R> {
    pub fn new(
        session: Session,
        config: EngineConfig,
        planner: P,
        inputs: I,
        recorder: R,
        policy: DriverPolicy,
    ) -> Self {
        Self {
            executor: ActionExecutor::new(session, config),
            planner,
            inputs,
            recorder,
            policy,
        }
    }

    #[instrument(level = "info", skip(self, task))]
    pub async fn run(&mut self, task: &str) -> RunSummary {
        let mut step: u32 = 1;
        let mut prev_result: Option<String> = None;
        let mut fail_streak: u32 = 0;
        let mut recent_fills: HashMap<String, u32> = HashMap::new();
        let mut last_screenshot: Option<PathBuf> = None;
        let mut completed = false;

        while step <= self.policy.max_steps {
            let visible = self
                .executor
                .session()
                .visible_text()
                .await
                .unwrap_or_default();

            let planned = match self
                .planner
                .next_action(task, &visible, prev_result.as_deref(), last_screenshot.as_ref())
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "planner failed, stopping run");
                    return RunSummary {
                        steps: step.saturating_sub(1),
                        completed: false,
                        last_result: format!("Planner error: {e}"),
                    };
                }
            };

            // Bouncing on one fill target means the selector is wrong, not
            // the timing; tell the planner instead of repeating.
            if let PlannedKind::Fill { selector, .. } = &planned.kind {
                let key = selector.trim().to_string();
                let count = recent_fills.entry(key.clone()).or_insert(0);
                *count += 1;
                if *count >= self.policy.fill_repeat_limit {
                    prev_result = Some(format!(
                        "Guard: selector '{key}' used repeatedly; propose a more specific \
                         selector (e.g., aria-label/role/name) to avoid the wrong field."
                    ));
                    recent_fills.remove(&key);
                    continue;
                }
            }

            let planned = match self.gate_done(planned, &visible) {
                DoneGate::Complete => {
                    info!(step, "task marked complete");
                    completed = true;
                    break;
                }
                DoneGate::Proceed(p) => p,
            };

            let planned = match planned.kind.input_request() {
                Some(request) => match self.collect_input(&request).await {
                    Ok(follow_up) => follow_up,
                    Err(e) => {
                        prev_result = Some(format!("Input collection failed: {e}"));
                        continue;
                    }
                },
                None => planned,
            };

            let Some(intent) = planned.kind.as_intent() else {
                // request_input was already folded into a fill above.
                continue;
            };

            let result = self
                .executor
                .execute(&intent)
                .await
                .with_advisory(planned.take_screenshot, &planned.screenshot_description);

            if planned.take_screenshot {
                match self
                    .recorder
                    .record_step(step, &planned.screenshot_description)
                    .await
                {
                    Ok(path) => last_screenshot = path,
                    Err(e) => warn!(error = %e, "step recording failed"),
                }
            }

            if result.outcome.is_failure() {
                fail_streak += 1;
            } else {
                fail_streak = 0;
            }
            info!(step, outcome = ?result.outcome, message = %result.message, "step finished");

            if matches!(intent, Intent::Done) {
                completed = true;
                break;
            }
            if fail_streak >= self.policy.max_fail_streak {
                warn!(fail_streak, "stopping on repeated failures");
                break;
            }

            prev_result = Some(result.message);
            step += 1;
        }

        RunSummary {
            steps: step.min(self.policy.max_steps),
            completed,
            last_result: self.executor.last_result().to_string(),
        }
    }

    /// `done` is only accepted off auth screens and without smuggled input
    /// metadata; otherwise it converts into a credential request.
    fn gate_done(&self, planned: PlannedAction, visible: &str) -> DoneGate {
        let PlannedKind::Done {
            selector,
            field,
            prompt,
        } = &planned.kind
        else {
            return DoneGate::Proceed(planned);
        };

        let carries_meta = planned.kind.done_carries_input_meta();
        if !looks_like_auth_screen(visible) && !carries_meta {
            return DoneGate::Complete;
        }

        let lowered = visible.to_lowercase();
        let inferred_field = field
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| {
                if lowered.contains("email") {
                    "email".to_string()
                } else if ["code", "otp", "verification"]
                    .iter()
                    .any(|w| lowered.contains(w))
                {
                    "otp".to_string()
                } else {
                    "custom".to_string()
                }
            });

        let inferred_selector = if !selector.trim().is_empty() {
            selector.clone()
        } else {
            match inferred_field.as_str() {
                "email" => r#"input[type="email"]"#.to_string(),
                "otp" | "code" => {
                    r#"input[autocomplete="one-time-code"], input[name*="code"], input[placeholder*="code" i]"#
                        .to_string()
                }
                _ => String::new(),
            }
        };

        if inferred_field == "custom" && inferred_selector.is_empty() {
            // Spurious input request on a non-auth screen.
            return DoneGate::Complete;
        }

        DoneGate::Proceed(PlannedAction {
            kind: PlannedKind::RequestInput {
                selector: inferred_selector,
                field: inferred_field.clone(),
                prompt: prompt
                    .clone()
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| format!("Enter your {inferred_field}")),
                mask: None,
                persist_key: Some(format!("auth.{inferred_field}")),
            },
            take_screenshot: true,
            screenshot_description: format!("Awaiting {inferred_field}"),
        })
    }

    /// Satisfy a credential request and fold the value into a fill turn.
    async fn collect_input(&mut self, request: &InputRequest) -> anyhow::Result<PlannedAction> {
        if request.selector.trim().is_empty() {
            anyhow::bail!("request_input missing selector for the input field");
        }
        let value = self.inputs.request(request).await?;
        Ok(PlannedAction {
            kind: PlannedKind::Fill {
                selector: request.selector.clone(),
                value,
            },
            take_screenshot: true,
            screenshot_description: format!("Filled {}", request.field),
        })
    }

    /// The most recent result message, for callers that interleave their
    /// own bookkeeping.
    pub fn last_result(&self) -> &str {
        self.executor.last_result()
    }
}

enum DoneGate {
    Complete,
    Proceed(PlannedAction),
}

/// Convenience check used by result consumers that only see messages.
pub fn message_indicates_failure(message: &str) -> bool {
    message.contains("Error") || message.contains("Timeout")
}
