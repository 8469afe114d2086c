//! Unified diff rendering for plan output. Diffs are for display only;
//! nothing is ever patched from them.

use similar::TextDiff;

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// Render a unified diff between two texts with the given header labels.
///
/// Returns an empty string when the texts are equal.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(old_label, new_label)
        .to_string()
}

/// Diff of a file's current content against proposed content
/// (`--- a/path`, `+++ b/path`).
pub fn file_diff(path: &str, old: &str, new: &str) -> String {
    unified_diff(old, new, &format!("a/{path}"), &format!("b/{path}"))
}

/// Diff of the caller's expected baseline against what is on disk.
pub fn expected_vs_current(path: &str, expected: &str, current: &str) -> String {
    unified_diff(
        expected,
        current,
        &format!("expected/{path}"),
        &format!("current/{path}"),
    )
}

/// Diff of what is on disk against the proposed content.
pub fn current_vs_proposed(path: &str, current: &str, proposed: &str) -> String {
    unified_diff(
        current,
        proposed,
        &format!("current/{path}"),
        &format!("proposed/{path}"),
    )
}
