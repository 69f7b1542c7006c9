//! Markup substituted for rendered diagram blocks.
//!
//! Every replacement is an AsciiDoc passthrough block (`++++`) holding a
//! `<figure>`, so the surrounding document stays valid source.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;

use crate::language::DiagramFormat;

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

fn passthrough(content: &str) -> String {
    format!("++++\n{content}\n++++")
}

/// Drop the XML declaration and doctype so the SVG can be inlined.
fn strip_svg_prolog(svg: &str) -> &str {
    let mut svg = svg.trim();
    for prefix in ["<?xml", "<!DOCTYPE"] {
        if svg.starts_with(prefix)
            && let Some(end) = svg.find('>')
        {
            svg = svg[end + 1..].trim_start();
        }
    }
    svg
}

/// Replacement for a successfully rendered diagram.
#[must_use]
pub fn image_block(format: DiagramFormat, payload: &[u8]) -> String {
    match format {
        DiagramFormat::Svg => {
            let svg = String::from_utf8_lossy(payload);
            passthrough(&format!(
                r#"<figure class="diagram">{}</figure>"#,
                strip_svg_prolog(&svg)
            ))
        }
        DiagramFormat::Png => passthrough(&format!(
            r#"<figure class="diagram"><img src="data:{};base64,{}" alt="diagram"></figure>"#,
            format.mime(),
            BASE64_STANDARD.encode(payload)
        )),
    }
}

/// Replacement for a diagram that could not be rendered.
///
/// Shows the error message and the source that failed.
#[must_use]
pub fn error_block(message: &str, source: &str) -> String {
    passthrough(&format!(
        r#"<figure class="diagram diagram-error"><pre>Diagram rendering failed: {}</pre><pre class="diagram-source">{}</pre></figure>"#,
        escape_html(message),
        escape_html(source)
    ))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_svg_block_inlines_without_prolog() {
        let payload = br#"<?xml version="1.0"?>
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "x">
<svg><rect/></svg>"#;

        assert_eq!(
            image_block(DiagramFormat::Svg, payload),
            "++++\n<figure class=\"diagram\"><svg><rect/></svg></figure>\n++++"
        );
    }

    #[test]
    fn test_png_block_uses_data_uri() {
        assert_eq!(
            image_block(DiagramFormat::Png, b"PNG"),
            "++++\n<figure class=\"diagram\"><img src=\"data:image/png;base64,UE5H\" alt=\"diagram\"></figure>\n++++"
        );
    }

    #[test]
    fn test_error_block_escapes_message_and_source() {
        assert_eq!(
            error_block("HTTP 400: <bad>", "A -> B"),
            "++++\n<figure class=\"diagram diagram-error\"><pre>Diagram rendering failed: HTTP 400: &lt;bad&gt;</pre><pre class=\"diagram-source\">A -&gt; B</pre></figure>\n++++"
        );
    }
}
