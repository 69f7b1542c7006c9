//! Diagram block extraction.
//!
//! A diagram block is an attribute line naming the diagram kind, followed by
//! a delimited body:
//!
//! ```text
//! [plantuml, format=png]
//! ----
//! @startuml
//! A -> B
//! @enduml
//! ----
//! ```

use std::ops::Range;

use crate::language::DiagramFormat;

/// A diagram block found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// The block exactly as it appears in the document.
    pub raw: String,
    /// Byte range of `raw` in the document, from the attribute line to the
    /// end of the closing delimiter (newline excluded).
    pub span: Range<usize>,
    /// Diagram kind, as written.
    pub kind: String,
    pub format: DiagramFormat,
    /// Body lines joined by `\n`, carriage returns removed.
    pub source: String,
}

/// Finds diagram blocks in document text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagramBlockExtractor {
    default_format: DiagramFormat,
}

impl DiagramBlockExtractor {
    #[must_use]
    pub fn new(default_format: DiagramFormat) -> Self {
        Self { default_format }
    }

    /// Lazily iterate over the diagram blocks of `text` in document order.
    ///
    /// Blocks with an empty kind and blocks missing their closing delimiter
    /// are skipped.
    ///
    /// # Example
    ///
    /// ```
    /// use docweave_diagrams::{DiagramBlockExtractor, DiagramFormat};
    ///
    /// let text = "[mermaid]\n----\ngraph TD\n----\n";
    /// let blocks: Vec<_> = DiagramBlockExtractor::default().extract(text).collect();
    ///
    /// assert_eq!(blocks.len(), 1);
    /// assert_eq!(blocks[0].kind, "mermaid");
    /// assert_eq!(blocks[0].format, DiagramFormat::Svg);
    /// assert_eq!(blocks[0].source, "graph TD");
    /// ```
    #[must_use]
    pub fn extract<'t>(&self, text: &'t str) -> DiagramBlocks<'t> {
        DiagramBlocks {
            text,
            pos: 0,
            default_format: self.default_format,
        }
    }
}

/// Iterator returned by [`DiagramBlockExtractor::extract`].
#[derive(Debug)]
pub struct DiagramBlocks<'t> {
    text: &'t str,
    pos: usize,
    default_format: DiagramFormat,
}

/// One line of the document: content without `\n`, and where the next
/// line starts.
struct Line<'t> {
    content: &'t str,
    end: usize,
    next: usize,
}

fn line_at(text: &str, pos: usize) -> Line<'_> {
    let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
    Line {
        content: &text[pos..end],
        end,
        next: (end + 1).min(text.len()),
    }
}

impl Iterator for DiagramBlocks<'_> {
    type Item = DiagramBlock;

    fn next(&mut self) -> Option<DiagramBlock> {
        while self.pos < self.text.len() {
            let start = self.pos;
            let line = line_at(self.text, start);
            self.pos = line.next;

            let Some(attributes) = parse_attribute_line(line.content, self.default_format)
            else {
                continue;
            };
            let Some(block) = self.block_after(start, line.next, attributes) else {
                continue;
            };
            return Some(block);
        }
        None
    }
}

impl DiagramBlocks<'_> {
    /// Try to read the delimited body following an attribute line.
    ///
    /// On success the iterator resumes after the closing delimiter.
    fn block_after(
        &mut self,
        start: usize,
        mut pos: usize,
        (kind, format): (String, DiagramFormat),
    ) -> Option<DiagramBlock> {
        let text = self.text;

        // Optional blank lines before the opening delimiter
        while pos < text.len() {
            let line = line_at(text, pos);
            if !line.content.trim().is_empty() {
                break;
            }
            pos = line.next;
        }
        if pos >= text.len() {
            return None;
        }

        let opening = line_at(text, pos);
        let delimiter = opening.content.trim_end();
        if !is_delimiter(delimiter) {
            return None;
        }

        let body_start = opening.next;
        let mut cursor = body_start;
        while cursor < text.len() {
            let line = line_at(text, cursor);
            if line.content.trim_end() == delimiter {
                self.pos = line.next;
                if kind.is_empty() {
                    tracing::debug!(offset = start, "Skipping diagram block without kind");
                    return None;
                }
                let body = text[body_start..cursor]
                    .strip_suffix('\n')
                    .unwrap_or(&text[body_start..cursor]);
                return Some(DiagramBlock {
                    raw: text[start..line.end].to_owned(),
                    span: start..line.end,
                    kind,
                    format,
                    source: body
                        .split('\n')
                        .map(|l| l.strip_suffix('\r').unwrap_or(l))
                        .collect::<Vec<_>>()
                        .join("\n"),
                });
            }
            cursor = line.next;
        }

        tracing::debug!(kind = %kind, offset = start, "Unterminated diagram block");
        None
    }
}

/// A run of at least four `-` or `.` characters.
fn is_delimiter(line: &str) -> bool {
    let Some(first) = line.chars().next() else {
        return false;
    };
    matches!(first, '-' | '.') && line.len() >= 4 && line.chars().all(|c| c == first)
}

/// Parse `[kind, key=value, ...]` into kind and format.
fn parse_attribute_line(line: &str, default_format: DiagramFormat) -> Option<(String, DiagramFormat)> {
    let inner = line
        .trim()
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))?;
    // Anchors ([[id]]) are not attribute lists
    if inner.starts_with('[') {
        return None;
    }

    let mut tokens = inner.split(',').map(str::trim);
    let kind = tokens.next().unwrap_or_default().to_owned();
    let mut format = default_format;

    for (position, token) in tokens.enumerate() {
        if let Some((key, value)) = token.split_once('=') {
            if key.trim().eq_ignore_ascii_case("format")
                && let Some(parsed) = DiagramFormat::parse(value.trim().trim_matches(['"', '\'']))
            {
                format = parsed;
            }
        } else if position == 1
            // Positional form: [kind, target, format]
            && let Some(parsed) = DiagramFormat::parse(token)
        {
            format = parsed;
        }
    }

    Some((kind, format))
}
