//! Heading level shifting for `leveloffset`.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Section heading: a run of `=` (or Markdown-style `#`) followed by
/// whitespace and a title.
static HEADING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(=+|#+)([ \t]+\S.*)$").unwrap());

/// Whether `line` is a section heading.
pub(crate) fn is_heading(line: &str) -> bool {
    HEADING_PATTERN.is_match(line.trim_end_matches('\r'))
}

/// Shift every heading in `text` by `offset` levels.
///
/// Levels never drop below 1. Headings inside verbatim, passthrough and
/// comment blocks are left alone.
///
/// # Example
///
/// ```
/// use docweave_include::shift_headings;
///
/// assert_eq!(shift_headings("= Title\n== Section", 1), "== Title\n=== Section");
/// assert_eq!(shift_headings("== Section", -5), "= Section");
/// ```
#[must_use]
pub fn shift_headings(text: &str, offset: i32) -> String {
    let mut shifter = HeadingShifter::default();
    text.split('\n')
        .map(|line| shifter.shift_line(line, offset))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line-at-a-time heading shifter that tracks delimited blocks.
#[derive(Debug, Default)]
pub(crate) struct HeadingShifter {
    /// Closing delimiter of the block we are inside, if any.
    open_block: Option<String>,
}

impl HeadingShifter {
    pub(crate) fn shift_line<'a>(&mut self, line: &'a str, offset: i32) -> Cow<'a, str> {
        let trimmed = line.trim_end();

        if let Some(closing) = &self.open_block {
            if trimmed == closing {
                self.open_block = None;
            }
            return Cow::Borrowed(line);
        }

        if let Some(closing) = block_delimiter(trimmed) {
            self.open_block = Some(closing);
            return Cow::Borrowed(line);
        }

        if offset == 0 {
            return Cow::Borrowed(line);
        }

        let Some(captures) = HEADING_PATTERN.captures(line) else {
            return Cow::Borrowed(line);
        };
        let marker = &captures[1];
        let Some(symbol) = marker.chars().next() else {
            return Cow::Borrowed(line);
        };
        let level = i32::try_from(marker.len()).unwrap_or(i32::MAX);
        let shifted = usize::try_from(level.saturating_add(offset).max(1)).unwrap_or(1);

        Cow::Owned(format!(
            "{}{}",
            symbol.to_string().repeat(shifted),
            &captures[2]
        ))
    }
}

/// Returns the closing delimiter if `line` opens a block whose content is
/// not section structure.
fn block_delimiter(line: &str) -> Option<String> {
    if line.starts_with("```") {
        return Some("```".to_owned());
    }
    let first = line.chars().next()?;
    let verbatim = matches!(first, '-' | '.' | '+' | '/');
    (verbatim && line.len() >= 4 && line.chars().all(|c| c == first)).then(|| line.to_owned())
}
