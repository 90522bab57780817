//! Ranked-strategy resolution tests.

use crate::intent::IntentKind;
use crate::locator::{Locator, Resolution};
use crate::selector::parse;
use crate::tests::fixtures::{fast_config, spec, FakePage};

fn locator(page: &FakePage, selector: &str) -> Locator {
    Locator::new(page.engine(), parse(selector), &fast_config())
}

#[tokio::test]
async fn labelled_group_strategy_finds_nested_control() {
    let page = FakePage::new();
    let root = page.root();
    let dialog = page.add(root, spec("dialog").text("Create project"));
    let row = page.add(dialog, spec("group").name("Status"));
    let chip = page.add(row, spec("button").text("Backlog"));

    let resolved = locator(&page, "role=button[name=/Status/i]")
        .within(page.element(dialog))
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");

    match resolved {
        Resolution::Found(el) => assert_eq!(el.id().unwrap(), chip.to_string()),
        other => panic!("expected the chip inside the Status row, got {other:?}"),
    }
}

#[tokio::test]
async fn role_name_strategy_matches_directly() {
    let page = FakePage::new();
    let root = page.root();
    let button = page.add(root, spec("button").name("Write an update"));

    let resolved = locator(&page, "role=button[name=/write an update/i]")
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");
    match resolved {
        Resolution::Found(el) => assert_eq!(el.id().unwrap(), button.to_string()),
        other => panic!("expected direct role+name match, got {other:?}"),
    }
}

#[tokio::test]
async fn text_strategy_is_scoped_to_the_given_root() {
    let page = FakePage::new();
    let root = page.root();
    // Identical label in the underlying page and inside the dialog.
    page.add(root, spec("button").text("Archive"));
    let dialog = page.add(root, spec("dialog").text("Edit item"));
    let inner = page.add(dialog, spec("button").text("Archive"));

    let resolved = locator(&page, "text=Archive")
        .within(page.element(dialog))
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");
    match resolved {
        Resolution::Found(el) => assert_eq!(el.id().unwrap(), inner.to_string()),
        other => panic!("expected the dialog-scoped match, got {other:?}"),
    }
}

#[tokio::test]
async fn value_chip_strategy_matches_current_value() {
    let page = FakePage::new();
    let root = page.root();
    let dialog = page.add(root, spec("dialog").text("Create project"));
    // Only the current value is visible; no control exposes a "Status" name.
    let chip = page.add(dialog, spec("button").text("Backlog"));

    let resolved = locator(&page, "role=combobox[name=/Status/i]")
        .within(page.element(dialog))
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");
    match resolved {
        Resolution::Found(el) => assert_eq!(el.id().unwrap(), chip.to_string()),
        other => panic!("expected the current-value chip, got {other:?}"),
    }
}

#[tokio::test]
async fn generic_fill_selector_with_multiple_matches_is_ambiguous() {
    let page = FakePage::new();
    let root = page.root();
    for _ in 0..3 {
        page.add(root, spec("generic").content_editable());
    }

    let resolved = locator(&page, r#"div[contenteditable="true"]"#)
        .resolve_unique(IntentKind::Fill)
        .await
        .expect("resolution");
    assert!(matches!(resolved, Resolution::Ambiguous(3)));
}

#[tokio::test]
async fn click_takes_first_of_multiple_matches() {
    let page = FakePage::new();
    let root = page.root();
    let first = page.add(root, spec("button").name("Next"));
    page.add(root, spec("button").name("Next"));

    let resolved = locator(&page, "role=button[name=/Next/i]")
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");
    match resolved {
        Resolution::Found(el) => assert_eq!(el.id().unwrap(), first.to_string()),
        other => panic!("expected first match, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_element_resolves_to_not_found_within_the_wait() {
    let page = FakePage::new();
    let resolved = locator(&page, "role=button[name=/Nowhere/i]")
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");
    assert!(matches!(resolved, Resolution::NotFound));
}

#[tokio::test]
async fn invisible_candidates_are_ignored() {
    let page = FakePage::new();
    let root = page.root();
    let hidden = page.add(root, spec("button").name("Publish"));
    // Hide it after insertion.
    {
        let el = page.element(hidden);
        assert!(el.is_visible().unwrap());
    }
    page.hide(hidden);

    let resolved = locator(&page, "role=button[name=/Publish/i]")
        .resolve_unique(IntentKind::Click)
        .await
        .expect("resolution");
    assert!(matches!(resolved, Resolution::NotFound));
}

#[tokio::test]
async fn chain_prefix_scopes_the_final_part() {
    let page = FakePage::new();
    let root = page.root();
    page.add(root, spec("button").name("Save"));
    let dialog = page.add(root, spec("dialog").name("Create project").text("Create project"));
    let inner = page.add(dialog, spec("button").name("Save"));

    let resolved = locator(
        &page,
        "role=dialog[name=/create project/i] >> role=button[name=/Save/i]",
    )
    .resolve_unique(IntentKind::Click)
    .await
    .expect("resolution");
    match resolved {
        Resolution::Found(el) => assert_eq!(el.id().unwrap(), inner.to_string()),
        other => panic!("expected the chained match, got {other:?}"),
    }
}
