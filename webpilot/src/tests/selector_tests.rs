//! Grammar tests for the selector parser.

use crate::selector::{parse, NamePattern, Selector};

#[test]
fn role_with_regex_name() {
    let sel = parse("role=button[name=/Status/i]");
    match &sel {
        Selector::Role { role, name } => {
            assert_eq!(role, "button");
            let pat = name.as_ref().expect("name pattern");
            assert!(pat.is_regex());
            assert!(pat.matches("Status"));
            assert!(pat.matches("status row"));
            assert!(!pat.matches("Priority"));
        }
        other => panic!("expected role selector, got {other:?}"),
    }
}

#[test]
fn role_with_quoted_name_matches_by_containment() {
    let sel = parse(r#"role=button[name="Save draft"]"#);
    let pat = sel.name_pattern().expect("name pattern");
    assert!(!pat.is_regex());
    assert!(pat.matches("save DRAFT now"));
    assert!(!pat.matches("discard"));
}

#[test]
fn role_alternatives_are_preserved() {
    let sel = parse("role=button|combobox[name=/Status|Priority/i]");
    assert_eq!(sel.roles(), vec!["button", "combobox"]);
}

#[test]
fn chain_with_dialog_scope() {
    let sel = parse("role=dialog[name=/create project/i] >> [aria-label='Project name']");
    let parts = sel.parts();
    assert_eq!(parts.len(), 2);
    assert!(sel.scopes_into_dialog());
    assert!(matches!(parts[1], Selector::Css(_)));
}

#[test]
fn chain_split_ignores_quoted_arrows() {
    let sel = parse(r#"button:has-text(">> weird") >> text=Next"#);
    assert_eq!(sel.parts().len(), 2);
    assert_eq!(sel.trailing_text().as_deref(), Some("Next"));
}

#[test]
fn text_part_unquotes() {
    assert_eq!(
        parse(r#"text="Continue with email""#),
        Selector::Text("Continue with email".to_string())
    );
    assert_eq!(
        parse("text=Sign in"),
        Selector::Text("Sign in".to_string())
    );
}

#[test]
fn css_passes_through_verbatim() {
    let raw = r#"input[type="email"]"#;
    assert_eq!(parse(raw), Selector::Css(raw.to_string()));
}

#[test]
fn popup_item_detection_and_desired_value() {
    let sel = parse("role=menuitem[name=/In Progress/i]");
    assert!(sel.is_popup_item());
    assert_eq!(sel.desired_value().as_deref(), Some("In Progress"));

    let sel = parse("role=option[name=/High/i]");
    assert!(sel.is_popup_item());
    assert_eq!(sel.desired_value().as_deref(), Some("High"));

    let sel = parse("role=button[name=/Status/i]");
    assert!(!sel.is_popup_item());
}

#[test]
fn desired_value_from_trailing_text() {
    let sel = parse("role=dialog[name=/create project/i] >> text=Backlog");
    assert_eq!(sel.desired_value().as_deref(), Some("Backlog"));
    assert_eq!(sel.trailing_text().as_deref(), Some("Backlog"));
}

#[test]
fn anchored_patterns_recover_their_literal() {
    let pat = NamePattern::pattern("^In Progress$");
    assert_eq!(pat.literal_value(), "In Progress");
    assert!(pat.matches("In Progress"));
    assert!(!pat.matches("Not In Progress"));
}

#[test]
fn generic_editable_detection() {
    assert!(parse(r#"div[contenteditable="true"]"#).is_generic_editable());
    assert!(parse(r#"[contenteditable="true"]"#).is_generic_editable());
    assert!(parse("textarea").is_generic_editable());
    assert!(parse("role=textbox").is_generic_editable());
    assert!(!parse("role=textbox[name=/Project name/i]").is_generic_editable());
    assert!(!parse("role=button[name=/Save/i]").is_generic_editable());
}

#[test]
fn submit_detection() {
    assert!(parse("role=dialog[name=/create/i] >> role=button[name=/Create project/i]")
        .looks_like_submit());
    assert!(parse("text=Save").looks_like_submit());
    assert!(!parse("role=button[name=/Status/i]").looks_like_submit());
}

#[test]
fn bare_known_role_shorthand() {
    let sel = parse("textbox name=/description|summary/i");
    match sel {
        Selector::Role { role, name } => {
            assert_eq!(role, "textbox");
            assert!(name.expect("pattern").matches("Project description"));
        }
        other => panic!("expected role selector, got {other:?}"),
    }
}

#[test]
fn invalid_regex_degrades_to_literal() {
    let sel = parse("role=button[name=/(unclosed/i]");
    let pat = sel.name_pattern().expect("name pattern");
    assert!(!pat.is_regex());
    // Still usable as a containment match on the raw source.
    assert!(pat.matches("x (unclosed y"));
}

#[test]
fn unknown_bare_word_is_css_not_role() {
    // Only words in the known-role vocabulary get the shorthand.
    assert!(matches!(
        parse("sidebar name=/Projects/i"),
        Selector::Css(_)
    ));
}
