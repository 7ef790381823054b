//! Structural acceptance check for model-produced unified diffs.
//!
//! The check only looks for the three marker substrings; it never parses
//! hunks. Order does not matter.

/// File header for the original side (`--- a/path`).
pub const OLD_FILE_MARKER: &str = "--- ";
/// File header for the new side (`+++ b/path`).
pub const NEW_FILE_MARKER: &str = "+++";
/// Hunk header (`@@ -1 +1,2 @@`).
pub const HUNK_MARKER: &str = "@@ ";

/// True when `content` carries all three unified-diff markers.
pub fn looks_like_unified_diff(content: &str) -> bool {
    missing_markers(content).is_empty()
}

/// Markers absent from `content`, in declaration order.
pub fn missing_markers(content: &str) -> Vec<&'static str> {
    [OLD_FILE_MARKER, NEW_FILE_MARKER, HUNK_MARKER]
        .into_iter()
        .filter(|marker| !content.contains(marker))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str =
        "--- a/app.py\n+++ b/app.py\n@@ -1 +1,2 @@\n print('hi')\n+print('health ok')\n";

    #[test]
    fn accepts_well_formed_diff() {
        assert!(looks_like_unified_diff(VALID));
    }

    #[test]
    fn accepts_markers_in_any_order() {
        assert!(looks_like_unified_diff("@@ -1 +1 @@\n+++ b/x\n--- a/x\n"));
        assert!(looks_like_unified_diff("prose --- then +++ and @@ inline"));
    }

    #[test]
    fn rejects_when_any_marker_is_missing() {
        assert!(!looks_like_unified_diff("+++ b/x\n@@ -1 +1 @@\n"));
        assert!(!looks_like_unified_diff("--- a/x\n@@ -1 +1 @@\n"));
        assert!(!looks_like_unified_diff("--- a/x\n+++ b/x\n"));
        assert!(!looks_like_unified_diff("Sure! Here is what I would change."));
    }

    #[test]
    fn marker_spacing_is_significant() {
        // "---" without a trailing space and "@@" without one do not count.
        assert!(!looks_like_unified_diff("---a/x\n+++ b/x\n@@ -1 +1 @@\n"));
        assert!(!looks_like_unified_diff("--- a/x\n+++ b/x\n@@-1 +1@@\n"));
    }

    #[test]
    fn reports_missing_markers() {
        assert_eq!(missing_markers("+++ b/x"), vec![OLD_FILE_MARKER, HUNK_MARKER]);
        assert!(missing_markers(VALID).is_empty());
    }
}
