//! Caller-loop policy tests: circuit breakers, the repeated-fill guard,
//! the credential round-trip, and the planner wire format.

use crate::driver::{Driver, DriverPolicy, InputCollector, Planner, StepRecorder};
use crate::intent::{InputRequest, Outcome, PlannedAction, PlannedKind};
use crate::tests::fixtures::{fast_config, spec, FakePage};
use crate::Session;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn planned(kind: PlannedKind) -> PlannedAction {
    PlannedAction {
        kind,
        take_screenshot: false,
        screenshot_description: String::new(),
    }
}

fn done() -> PlannedKind {
    PlannedKind::Done {
        selector: String::new(),
        field: None,
        prompt: None,
    }
}

fn click(selector: &str) -> PlannedKind {
    PlannedKind::Click {
        selector: selector.to_string(),
    }
}

fn fill(selector: &str, value: &str) -> PlannedKind {
    PlannedKind::Fill {
        selector: selector.to_string(),
        value: value.to_string(),
    }
}

/// Replays a fixed script, then repeats `fallback`; records every result
/// message it is shown.
struct ScriptedPlanner {
    script: VecDeque<PlannedAction>,
    fallback: PlannedKind,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPlanner {
    fn new(script: Vec<PlannedKind>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: script.into_iter().map(planned).collect(),
                fallback: done(),
                seen: seen.clone(),
            },
            seen,
        )
    }

    fn with_fallback(mut self, fallback: PlannedKind) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait::async_trait]
impl Planner for ScriptedPlanner {
    async fn next_action(
        &mut self,
        _task: &str,
        _visible_text: &str,
        previous_result: Option<&str>,
        _last_screenshot: Option<&PathBuf>,
    ) -> anyhow::Result<PlannedAction> {
        if let Some(result) = previous_result {
            self.seen.lock().unwrap().push(result.to_string());
        }
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| planned(self.fallback.clone())))
    }
}

struct StaticInput {
    value: String,
    requests: Arc<Mutex<Vec<InputRequest>>>,
}

impl StaticInput {
    fn new(value: &str) -> (Self, Arc<Mutex<Vec<InputRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                value: value.to_string(),
                requests: requests.clone(),
            },
            requests,
        )
    }
}

#[async_trait::async_trait]
impl InputCollector for StaticInput {
    async fn request(&mut self, request: &InputRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.value.clone())
    }
}

struct NullRecorder;

#[async_trait::async_trait]
impl StepRecorder for NullRecorder {
    async fn record_step(
        &mut self,
        _step: u32,
        _description: &str,
    ) -> anyhow::Result<Option<PathBuf>> {
        Ok(None)
    }
}

fn driver(
    page: &FakePage,
    planner: ScriptedPlanner,
    inputs: StaticInput,
    policy: DriverPolicy,
) -> Driver<ScriptedPlanner, StaticInput, NullRecorder> {
    Driver::new(
        Session::new(page.engine()),
        fast_config(),
        planner,
        inputs,
        NullRecorder,
        policy,
    )
}

#[tokio::test]
async fn runs_until_the_planner_reports_done() {
    crate::tests::fixtures::init_tracing();
    let page = FakePage::new();
    let root = page.root();
    page.add(root, spec("button").name("Write an update"));

    let (planner, _) = ScriptedPlanner::new(vec![
        click("role=button[name=/Write an update/i]"),
        done(),
    ]);
    let (inputs, _) = StaticInput::new("");
    let mut driver = driver(&page, planner, inputs, DriverPolicy::default());

    let summary = driver.run("post the first update").await;
    assert!(summary.completed);
    assert_eq!(page.clicks().len(), 1);
}

#[tokio::test]
async fn stops_after_three_consecutive_failures() {
    let page = FakePage::new();
    let (planner, _) = ScriptedPlanner::new(vec![
        click("#missing"),
        click("#missing-2"),
        click("#missing-3"),
        click("#never-reached"),
    ]);
    let (inputs, _) = StaticInput::new("");
    let mut driver = driver(&page, planner, inputs, DriverPolicy::default());

    let summary = driver.run("anything").await;
    assert!(!summary.completed);
    assert_eq!(summary.steps, 3);
}

#[tokio::test]
async fn hard_step_cap_bounds_the_run() {
    let page = FakePage::new();
    let (planner, _) = ScriptedPlanner::new(vec![]);
    let planner = planner.with_fallback(PlannedKind::Press {
        key: "Enter".to_string(),
    });
    let (inputs, _) = StaticInput::new("");
    let policy = DriverPolicy {
        max_steps: 4,
        ..DriverPolicy::default()
    };
    let mut driver = driver(&page, planner, inputs, policy);

    let summary = driver.run("loop forever").await;
    assert!(!summary.completed);
    assert_eq!(summary.steps, 4);
    assert_eq!(page.keys().len(), 4);
}

#[tokio::test]
async fn repeated_fill_target_triggers_the_guard() {
    let page = FakePage::new();
    let root = page.root();
    let field = page.add(root, spec("textbox").name("Notes"));

    let selector = "role=textbox[name=/Notes/i]";
    let (planner, seen) = ScriptedPlanner::new(vec![
        fill(selector, "hello"),
        fill(selector, "hello"),
        fill(selector, "hello"),
        done(),
    ]);
    let (inputs, _) = StaticInput::new("");
    let mut driver = driver(&page, planner, inputs, DriverPolicy::default());

    let summary = driver.run("fill notes").await;
    assert!(summary.completed);
    assert_eq!(page.value_of(field).as_deref(), Some("hello"));

    let seen = seen.lock().unwrap();
    assert!(
        seen.iter().any(|m| m.contains("Guard:")),
        "planner was never told to refine: {seen:?}"
    );
}

#[tokio::test]
async fn done_on_an_auth_screen_becomes_a_credential_round_trip() {
    let page = FakePage::new();
    let root = page.root();
    page.add(root, spec("generic").text("Sign in — Continue with email"));
    let email = page.add(root, spec("textbox").name("Email"));

    let (planner, _) = ScriptedPlanner::new(vec![done()]);
    let (inputs, requests) = StaticInput::new("user@example.com");
    let policy = DriverPolicy {
        max_steps: 2,
        ..DriverPolicy::default()
    };
    let mut driver = driver(&page, planner, inputs, policy);

    let summary = driver.run("log in and create a project").await;
    // The run did not complete: done was refused on the auth screen.
    assert!(!summary.completed);
    assert_eq!(page.value_of(email).as_deref(), Some("user@example.com"));

    let requests = requests.lock().unwrap();
    assert!(!requests.is_empty());
    assert_eq!(requests[0].field, "email");
    assert!(!requests[0].should_mask());
}

#[tokio::test]
async fn request_input_without_selector_feeds_an_error_back() {
    let page = FakePage::new();
    let (planner, seen) = ScriptedPlanner::new(vec![
        PlannedKind::RequestInput {
            selector: String::new(),
            field: "otp".to_string(),
            prompt: "Enter the code".to_string(),
            mask: None,
            persist_key: None,
        },
        done(),
    ]);
    let (inputs, requests) = StaticInput::new("123456");
    let mut driver = driver(&page, planner, inputs, DriverPolicy::default());

    let summary = driver.run("anything").await;
    assert!(summary.completed);
    assert!(requests.lock().unwrap().is_empty());
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("Input collection failed")));
}

mod wire_format {
    use super::*;
    use crate::intent::{ActionResult, Intent};

    #[test]
    fn click_turn_deserializes_with_extra_fields() {
        let json = r#"{
            "action": "click",
            "selector": "role=button[name=/Create project/i]",
            "value": "",
            "take_screenshot": true,
            "screenshot_description": "submit the form"
        }"#;
        let planned: PlannedAction = serde_json::from_str(json).unwrap();
        assert!(planned.take_screenshot);
        assert_eq!(
            planned.kind.as_intent(),
            Some(Intent::Click {
                selector: "role=button[name=/Create project/i]".to_string()
            })
        );
    }

    #[test]
    fn press_and_navigate_carry_their_value() {
        let press: PlannedAction =
            serde_json::from_str(r#"{"action": "press", "value": "Enter"}"#).unwrap();
        assert_eq!(
            press.kind.as_intent(),
            Some(Intent::Press {
                key: "Enter".to_string()
            })
        );

        let nav: PlannedAction =
            serde_json::from_str(r#"{"action": "navigate", "value": "https://linear.app/"}"#)
                .unwrap();
        assert_eq!(
            nav.kind.as_intent(),
            Some(Intent::Navigate {
                url: "https://linear.app/".to_string()
            })
        );
    }

    #[test]
    fn request_input_turn_has_no_engine_intent() {
        let json = r#"{
            "action": "request_input",
            "selector": "input[type=\"email\"]",
            "field": "email",
            "prompt": "Enter your email",
            "mask": false,
            "persist_key": "auth.email"
        }"#;
        let planned: PlannedAction = serde_json::from_str(json).unwrap();
        assert_eq!(planned.kind.as_intent(), None);
        let request = planned.kind.input_request().unwrap();
        assert_eq!(request.field, "email");
        assert!(!request.should_mask());
    }

    #[test]
    fn done_with_input_metadata_is_flagged() {
        let json = r#"{"action": "done", "field": "otp", "prompt": "Enter code"}"#;
        let planned: PlannedAction = serde_json::from_str(json).unwrap();
        assert!(planned.kind.done_carries_input_meta());

        let plain: PlannedAction = serde_json::from_str(r#"{"action": "done"}"#).unwrap();
        assert!(!plain.kind.done_carries_input_meta());
    }

    #[test]
    fn outcomes_serialize_snake_case() {
        let result = ActionResult::skipped_idempotent("already set");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "skipped_idempotent");
        assert_eq!(
            serde_json::to_value(Outcome::PopupTimeout).unwrap(),
            "popup_timeout"
        );
    }

    #[test]
    fn otp_requests_mask_by_default() {
        let request = InputRequest {
            field: "otp".to_string(),
            ..InputRequest::default()
        };
        assert!(request.should_mask());
    }
}
