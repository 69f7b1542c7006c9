//! Content selection for included files: `lines=`, `tags=` and `indent=`.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::directive::{IncludeOptions, LineSelection};
use crate::heading::is_heading;

static TAG_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btag::([\w.-]+)\[\]").unwrap());
static TAG_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bend::([\w.-]+)\[\]").unwrap());

/// Apply the selection options of a directive to raw file content.
///
/// `lines` wins over `tags` when both are present. Re-indentation runs last.
/// A single trailing newline is dropped from whole-file content.
pub(crate) fn select(raw: &str, options: &IncludeOptions) -> String {
    let content = if let Some(lines) = &options.lines {
        select_lines(raw, lines)
    } else if let Some(tags) = &options.tags {
        select_tags(raw, tags)
    } else {
        let trimmed = raw.strip_suffix('\n').unwrap_or(raw);
        trimmed.strip_suffix('\r').unwrap_or(trimmed).to_owned()
    };

    match options.indent {
        Some(indent) => reindent(&content, indent),
        None => content,
    }
}

/// Keep the selected lines.
///
/// A blank line separates non-contiguous runs, and one is inserted before a
/// selected heading that would otherwise butt against a preceding line.
pub(crate) fn select_lines(raw: &str, selection: &LineSelection) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let total = lines.len();

    let wanted: BTreeSet<usize> = selection
        .ranges()
        .iter()
        .flat_map(|range| {
            let end = range.end.unwrap_or(total).min(total);
            range.start..=end
        })
        .filter(|&n| n >= 1 && n <= total)
        .collect();

    let mut out: Vec<&str> = Vec::with_capacity(wanted.len());
    let mut previous: Option<usize> = None;

    for n in wanted {
        let line = lines[n - 1];
        if let Some(prev) = previous {
            let last_blank = out.last().is_some_and(|l| l.trim().is_empty());
            let gap = n != prev + 1;
            if !last_blank && (gap || is_heading(line)) {
                out.push("");
            }
        }
        out.push(line);
        previous = Some(n);
    }

    out.join("\n")
}

/// Keep the lines inside the requested tag regions.
///
/// Marker lines are never emitted. Any `end::` marker closes the current
/// capture, whatever its name.
pub(crate) fn select_tags(raw: &str, tags: &BTreeSet<String>) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut capturing = false;
    let mut seen: HashSet<&str> = HashSet::new();

    for line in raw.lines() {
        if TAG_END.is_match(line) {
            capturing = false;
            continue;
        }
        if let Some(captures) = TAG_START.captures(line) {
            if let Some(name) = captures.get(1).map(|m| m.as_str())
                && tags.contains(name)
            {
                capturing = true;
                seen.insert(name);
            }
            continue;
        }
        if capturing {
            out.push(line);
        }
    }

    for tag in tags.iter().filter(|t| !seen.contains(t.as_str())) {
        tracing::debug!(tag = %tag, "Tag not found in included file");
    }

    out.join("\n")
}

/// Strip the common leading whitespace, then indent every non-blank line by
/// `indent` spaces.
pub(crate) fn reindent(content: &str, indent: usize) -> String {
    let common = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    let padding = " ".repeat(indent);

    content
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{padding}{}", &line[common..])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn lines(value: &str) -> LineSelection {
        LineSelection::parse(value).unwrap()
    }

    #[test]
    fn test_select_lines_with_gap() {
        let raw = "L1\nL2\nL3\nL4\nL5\nL6\nL7\n";

        assert_eq!(select_lines(raw, &lines("2;5..6")), "L2\n\nL5\nL6");
    }

    #[test]
    fn test_select_lines_open_ended_and_clamped() {
        let raw = "a\nb\nc";

        assert_eq!(select_lines(raw, &lines("2..-1")), "b\nc");
        assert_eq!(select_lines(raw, &lines("2..99")), "b\nc");
        assert_eq!(select_lines(raw, &lines("7")), "");
    }

    #[test]
    fn test_select_lines_overlapping_ranges_deduplicated() {
        let raw = "a\nb\nc\nd";

        assert_eq!(select_lines(raw, &lines("1..3;2..4")), "a\nb\nc\nd");
    }

    #[test]
    fn test_select_lines_separates_heading() {
        let raw = "intro\n== Section\nbody";

        assert_eq!(select_lines(raw, &lines("1..3")), "intro\n\n== Section\nbody");
    }

    #[test]
    fn test_select_lines_no_double_blank() {
        let raw = "a\n\nc\nd";

        assert_eq!(select_lines(raw, &lines("1..2;4")), "a\n\nd");
    }

    #[test]
    fn test_select_tags() {
        let raw = "before\n// tag::setup[]\nsetup line\n// end::setup[]\nmiddle\n// tag::other[]\nother line\n// end::other[]\n";
        let tags = BTreeSet::from(["setup".to_owned()]);

        assert_eq!(select_tags(raw, &tags), "setup line");
    }

    #[test]
    fn test_select_multiple_tags_in_document_order() {
        let raw = "# tag::b[]\nB\n# end::b[]\n# tag::a[]\nA\n# end::a[]";
        let tags = BTreeSet::from(["a".to_owned(), "b".to_owned()]);

        assert_eq!(select_tags(raw, &tags), "B\nA");
    }

    #[test]
    fn test_any_end_marker_closes_capture() {
        let raw = "// tag::outer[]\none\n// tag::inner[]\ntwo\n// end::inner[]\nthree\n// end::outer[]";
        let tags = BTreeSet::from(["outer".to_owned()]);

        assert_eq!(select_tags(raw, &tags), "one\ntwo");
    }

    #[test]
    fn test_missing_tag_selects_nothing() {
        let tags = BTreeSet::from(["nope".to_owned()]);

        assert_eq!(select_tags("a\nb", &tags), "");
    }

    #[test]
    fn test_reindent() {
        let content = "    fn main() {\n        run();\n\n    }";

        assert_eq!(reindent(content, 2), "  fn main() {\n      run();\n\n  }");
        assert_eq!(reindent(content, 0), "fn main() {\n    run();\n\n}");
    }

    #[test]
    fn test_select_lines_take_precedence_over_tags() {
        let options = IncludeOptions {
            lines: Some(lines("1")),
            tags: Some(BTreeSet::from(["x".to_owned()])),
            ..IncludeOptions::default()
        };

        assert_eq!(select("first\n// tag::x[]\nsecond\n// end::x[]\n", &options), "first");
    }

    #[test]
    fn test_select_whole_file_drops_final_newline() {
        assert_eq!(select("a\nb\r\n", &IncludeOptions::default()), "a\nb");
        assert_eq!(select("a\n\n", &IncludeOptions::default()), "a\n");
    }
}
