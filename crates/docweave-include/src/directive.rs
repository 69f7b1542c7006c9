//! Include directive parsing.
//!
//! Recognizes `include::target[attributes]` lines and parses the attribute
//! list into [`IncludeOptions`].

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// A whole-line include directive, with optional trailing `//` comment.
static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x{FEFF}?[ \t]*include::([^\[]+)\[([^\]]*)\][ \t]*(?://.*)?$").unwrap()
});

/// A parsed include directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Raw target as written, with surrounding quotes and any `#fragment`
    /// removed.
    pub target: String,
    pub options: IncludeOptions,
}

/// Attributes of an include directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// Heading level offset applied to the included content.
    pub level_offset: Option<i32>,
    /// Line ranges to keep. Takes precedence over `tags`.
    pub lines: Option<LineSelection>,
    /// Tag regions to keep.
    pub tags: Option<BTreeSet<String>>,
    /// Re-indent the included content to this many spaces.
    pub indent: Option<usize>,
    /// Missing targets are silently skipped.
    pub optional: bool,
}

/// 1-based inclusive line ranges from a `lines=` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSelection {
    ranges: Vec<LineRange>,
}

/// A single line range; `end == None` runs to the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl LineSelection {
    /// Parse a `lines=` value such as `2;5..6` or `10..-1`.
    ///
    /// Ranges may be separated by `;`, `,` or `|`. Reversed ranges are
    /// normalized. Unparseable parts are skipped; returns `None` if
    /// nothing remains.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let ranges: Vec<LineRange> = value
            .split([';', ',', '|'])
            .filter_map(|part| parse_range(part.trim()))
            .collect();

        if ranges.is_empty() {
            None
        } else {
            Some(Self { ranges })
        }
    }

    /// Ranges in the order they were written.
    #[must_use]
    pub fn ranges(&self) -> &[LineRange] {
        &self.ranges
    }
}

fn parse_range(part: &str) -> Option<LineRange> {
    if part.is_empty() {
        return None;
    }
    let Some((start, end)) = part.split_once("..") else {
        let line: usize = part.parse().ok()?;
        return (line > 0).then_some(LineRange {
            start: line,
            end: Some(line),
        });
    };

    let start: usize = start.trim().parse().ok()?;
    let end = end.trim();
    let end = if end.is_empty() || end == "-1" {
        None
    } else {
        Some(end.parse::<usize>().ok()?)
    };

    match end {
        Some(end) if end < start => Some(LineRange {
            start: end.max(1),
            end: Some(start),
        }),
        _ => Some(LineRange {
            start: start.max(1),
            end,
        }),
    }
}

/// Parse a single line as an include directive.
///
/// Escaped directives (`\include::`) and directives with trailing text are
/// not recognized.
#[must_use]
pub fn parse_directive(line: &str) -> Option<IncludeDirective> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let captures = DIRECTIVE_PATTERN.captures(line)?;
    let target = clean_target(&captures[1]);
    if target.is_empty() {
        return None;
    }
    Some(IncludeDirective {
        target,
        options: parse_options(&captures[2]),
    })
}

/// Whether a line starts an include directive, complete or not.
pub(crate) fn starts_directive(line: &str) -> bool {
    line.trim_start_matches('\u{FEFF}')
        .trim_start()
        .starts_with("include::")
}

/// Join include directives whose attribute list was broken across lines.
///
/// A line starting with `include::` but lacking a closing `]` absorbs the
/// trimmed lines that follow it until one contains `]`. Scanning gives up at
/// a blank line, leaving the text untouched.
#[must_use]
pub fn join_broken_directives(text: &str) -> Cow<'_, str> {
    if !text.contains("include::") {
        return Cow::Borrowed(text);
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<Cow<'_, str>> = Vec::with_capacity(lines.len());
    let mut changed = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if starts_directive(line) && !line.contains(']') {
            if let Some((joined, last)) = join_from(&lines, i) {
                out.push(Cow::Owned(joined));
                changed = true;
                i = last + 1;
                continue;
            }
        }
        out.push(Cow::Borrowed(line));
        i += 1;
    }

    if changed {
        Cow::Owned(out.join("\n"))
    } else {
        Cow::Borrowed(text)
    }
}

fn join_from(lines: &[&str], first: usize) -> Option<(String, usize)> {
    let mut joined = lines[first].trim_end().to_owned();
    for (offset, line) in lines[first + 1..].iter().enumerate() {
        let next = line.trim();
        if next.is_empty() {
            return None;
        }
        joined.push_str(next);
        if next.contains(']') {
            return Some((joined, first + 1 + offset));
        }
    }
    None
}

fn clean_target(raw: &str) -> String {
    let target = raw.trim();
    let target = unquote(target);
    let target = target.split_once('#').map_or(target, |(path, _)| path);
    target.trim().to_owned()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Parse the attribute list between the brackets of a directive.
///
/// Unknown attributes are ignored.
#[must_use]
pub fn parse_options(attrs: &str) -> IncludeOptions {
    let mut options = IncludeOptions::default();

    for token in split_attributes(attrs) {
        let Some((key, value)) = token.split_once('=') else {
            if token.trim() == "optional" {
                options.optional = true;
            }
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());

        match key {
            "leveloffset" => {
                options.level_offset = value.trim_start_matches('+').parse().ok();
                if options.level_offset.is_none() {
                    tracing::debug!(value, "Ignoring invalid leveloffset");
                }
            }
            "lines" => options.lines = LineSelection::parse(value),
            "tag" => {
                let tag = value.trim();
                if !tag.is_empty() {
                    options.tags = Some(BTreeSet::from([tag.to_owned()]));
                }
            }
            "tags" => {
                let tags: BTreeSet<String> = value
                    .split([';', ','])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect();
                if !tags.is_empty() {
                    options.tags = Some(tags);
                }
            }
            "indent" => options.indent = value.trim().parse().ok(),
            "opts" | "options" => {
                if value.split([',', ';']).any(|o| o.trim() == "optional") {
                    options.optional = true;
                }
            }
            "optional" => options.optional = value != "false",
            _ => {}
        }
    }

    options
}

/// Split an attribute list on commas that are not inside quotes.
fn split_attributes(attrs: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in attrs.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&attrs[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&attrs[start..]);

    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_plain_directive() {
        let directive = parse_directive("include::chapters/one.adoc[]").unwrap();

        assert_eq!(directive.target, "chapters/one.adoc");
        assert_eq!(directive.options, IncludeOptions::default());
    }

    #[test]
    fn test_parse_ignores_indent_bom_and_trailing_comment() {
        let directive = parse_directive("\u{FEFF}  include::a.adoc[] // shared\r").unwrap();

        assert_eq!(directive.target, "a.adoc");
    }

    #[test]
    fn test_parse_rejects_non_directives() {
        assert_eq!(parse_directive("see include::a.adoc[] here"), None);
        assert_eq!(parse_directive("\\include::a.adoc[]"), None);
        assert_eq!(parse_directive("include::a.adoc[] trailing"), None);
        assert_eq!(parse_directive("include::a.adoc"), None);
        assert_eq!(parse_directive("// include::a.adoc[]"), None);
    }

    #[test]
    fn test_parse_quoted_target_and_fragment() {
        let directive = parse_directive("include::\"my part.adoc#intro\"[]").unwrap();

        assert_eq!(directive.target, "my part.adoc");
    }

    #[test]
    fn test_parse_all_options() {
        let options =
            parse_options(r#"leveloffset=+1, lines="2;5..6", indent=4, opts=optional"#);

        assert_eq!(options.level_offset, Some(1));
        assert_eq!(
            options.lines.unwrap().ranges(),
            &[
                LineRange {
                    start: 2,
                    end: Some(2)
                },
                LineRange {
                    start: 5,
                    end: Some(6)
                },
            ]
        );
        assert_eq!(options.indent, Some(4));
        assert!(options.optional);
    }

    #[test]
    fn test_parse_negative_level_offset() {
        assert_eq!(parse_options("leveloffset=-2").level_offset, Some(-2));
        assert_eq!(parse_options("leveloffset=abc").level_offset, None);
    }

    #[test]
    fn test_parse_tags() {
        let single = parse_options("tag=setup");
        let many = parse_options("tags=\"setup,teardown\"");
        let semicolons = parse_options("tags=setup;teardown");

        assert_eq!(single.tags, Some(BTreeSet::from(["setup".to_owned()])));
        let expected = Some(BTreeSet::from(["setup".to_owned(), "teardown".to_owned()]));
        assert_eq!(many.tags, expected);
        assert_eq!(semicolons.tags, expected);
    }

    #[test]
    fn test_parse_bare_optional() {
        assert!(parse_options("optional").optional);
        assert!(parse_options("opts=\"nowarn,optional\"").optional);
        assert!(!parse_options("opts=nowarn").optional);
    }

    #[test]
    fn test_line_selection_open_and_reversed_ranges() {
        let selection = LineSelection::parse("10..-1;4..2;7..").unwrap();

        assert_eq!(
            selection.ranges(),
            &[
                LineRange {
                    start: 10,
                    end: None
                },
                LineRange {
                    start: 2,
                    end: Some(4)
                },
                LineRange {
                    start: 7,
                    end: None
                },
            ]
        );
    }

    #[test]
    fn test_line_selection_skips_garbage() {
        assert_eq!(LineSelection::parse("x;0"), None);
        assert_eq!(LineSelection::parse("x;3").unwrap().ranges().len(), 1);
    }

    #[test]
    fn test_join_broken_directive() {
        let text = "before\ninclude::a.adoc[lines=\"1..3\",\n  leveloffset=+1]\nafter";

        let joined = join_broken_directives(text);

        assert_eq!(
            joined,
            "before\ninclude::a.adoc[lines=\"1..3\",leveloffset=+1]\nafter"
        );
    }

    #[test]
    fn test_join_stops_at_blank_line() {
        let text = "include::a.adoc[lines=1,\n\nnext]";

        assert!(matches!(join_broken_directives(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_join_without_directives_borrows() {
        let text = "= Title\n\nNo directives here.";

        assert!(matches!(join_broken_directives(text), Cow::Borrowed(t) if t == text));
    }
}
