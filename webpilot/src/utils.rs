//! Small text helpers shared across the engine.

/// Collapse all runs of whitespace to single spaces and trim the ends.
/// Used everywhere two pieces of UI text are compared.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shorten a value for log/result messages.
pub fn preview(s: &str) -> String {
    if s.chars().count() > 30 {
        let head: String = s.chars().take(30).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ws_collapses_runs() {
        assert_eq!(normalize_ws("  In \t Progress \n"), "In Progress");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn preview_truncates_long_values() {
        let long = "a".repeat(48);
        assert_eq!(preview(&long).len(), 33);
        assert_eq!(preview("short"), "short");
    }
}
