//! Detection of render failures disguised as images.
//!
//! Some renderers answer a broken diagram with a successful response whose
//! SVG merely draws the error text. Such payloads must not be cached or shown
//! as diagrams.

use crate::language::DiagramFormat;

/// Diagnostic phrases renderers print into error images (lowercase).
const FAILURE_PHRASES: &[&str] = &[
    "parse error",
    "syntax error",
    "unexpected token",
    "lexical error",
    "cannot parse",
];

/// SVG elements that draw actual shapes.
const DRAWING_PRIMITIVES: &[&str] = &[
    "path", "rect", "circle", "ellipse", "polygon", "polyline", "line",
];

/// An error image draws at most this many shapes.
const MAX_FAILURE_PRIMITIVES: usize = 1;

/// Outcome of inspecting a rendered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Image,
    /// The payload is an error message rendered as an image.
    DisguisedFailure { phrase: &'static str },
}

impl Verdict {
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::DisguisedFailure { .. })
    }
}

/// Classify a successful render response.
///
/// Only SVG is inspected. A payload is a disguised failure when it mentions a
/// diagnostic phrase and draws almost nothing.
#[must_use]
pub fn classify(format: DiagramFormat, payload: &[u8]) -> Verdict {
    if format != DiagramFormat::Svg {
        return Verdict::Image;
    }

    let text = String::from_utf8_lossy(payload).to_ascii_lowercase();
    let Some(phrase) = FAILURE_PHRASES.iter().find(|p| text.contains(*p)) else {
        return Verdict::Image;
    };

    let shapes = count_primitives(&text);
    if shapes <= MAX_FAILURE_PRIMITIVES {
        tracing::debug!(phrase, shapes, "Rendered SVG looks like an error message");
        Verdict::DisguisedFailure { phrase }
    } else {
        Verdict::Image
    }
}

/// Count opening tags of drawing primitives.
///
/// `<line` must be followed by whitespace, `/` or `>` so that
/// `<linearGradient` is not counted.
fn count_primitives(svg: &str) -> usize {
    DRAWING_PRIMITIVES
        .iter()
        .map(|name| {
            let tag = format!("<{name}");
            svg.match_indices(&tag)
                .filter(|(i, _)| {
                    svg[i + tag.len()..]
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_whitespace() || c == '/' || c == '>')
                })
                .count()
        })
        .sum()
}
