//! Diagram kinds and output formats.

/// Kinds whose sources understand PlantUML preprocessor includes.
const PLANTUML_FAMILY: &[&str] = &["plantuml", "c4plantuml"];

/// Whether `kind` needs PlantUML `!include` expansion before rendering.
#[must_use]
pub fn is_plantuml_family(kind: &str) -> bool {
    PLANTUML_FAMILY
        .iter()
        .any(|k| k.eq_ignore_ascii_case(kind.trim()))
}

/// Output format for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramFormat {
    /// Inline SVG (default, supports links and interactivity).
    #[default]
    Svg,
    /// Inline PNG as base64 data URI.
    Png,
}

impl DiagramFormat {
    /// Parse format from attribute value (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("svg") {
            Some(Self::Svg)
        } else if s.eq_ignore_ascii_case("png") {
            Some(Self::Png)
        } else {
            None
        }
    }

    /// Return format as string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }

    /// MIME type of payloads in this format.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
        }
    }
}

impl std::fmt::Display for DiagramFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
