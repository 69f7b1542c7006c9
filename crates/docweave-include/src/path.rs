//! Include target resolution.
//!
//! [`PathResolver`] turns the target of an include directive into a canonical
//! store path. It is pure string manipulation; whether the path exists is the
//! document store's business.

/// Resolves include targets against the including document's path.
#[derive(Debug, Clone)]
pub struct PathResolver {
    default_extension: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("adoc")
    }
}

impl PathResolver {
    /// Create a resolver that appends `default_extension` to targets
    /// without one. A leading dot is accepted and ignored.
    #[must_use]
    pub fn new(default_extension: impl Into<String>) -> Self {
        let ext: String = default_extension.into();
        Self {
            default_extension: ext.trim_start_matches('.').to_owned(),
        }
    }

    /// Resolve `target` relative to `current_path`.
    ///
    /// - `/`-prefixed targets are relative to the store root
    /// - other targets are relative to the directory of `current_path`
    /// - backslashes are treated as separators, `.` and `..` are collapsed
    ///
    /// Returns `None` for remote targets, empty targets, and paths that
    /// climb above the store root.
    ///
    /// # Example
    ///
    /// ```
    /// use docweave_include::PathResolver;
    ///
    /// let resolver = PathResolver::default();
    /// assert_eq!(
    ///     resolver.resolve("guide/index.adoc", "../shared/intro"),
    ///     Some("shared/intro.adoc".to_owned())
    /// );
    /// assert_eq!(resolver.resolve("index.adoc", "https://example.com/a.puml"), None);
    /// ```
    #[must_use]
    pub fn resolve(&self, current_path: &str, target: &str) -> Option<String> {
        let target = target.trim();
        if target.is_empty() || is_remote(target) {
            return None;
        }

        let target = target.replace('\\', "/");
        let current = current_path.replace('\\', "/");

        let mut segments: Vec<&str> = Vec::new();
        if !target.starts_with('/') {
            let mut dir: Vec<&str> = current.split('/').collect();
            // Drop the file name of the current document
            dir.pop();
            segments.extend(dir.into_iter().filter(|s| !s.is_empty() && *s != "."));
        }

        for segment in target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other),
            }
        }

        let last = segments.last()?;
        let mut resolved = segments.join("/");
        if !has_extension(last) {
            resolved.push('.');
            resolved.push_str(&self.default_extension);
        }
        Some(resolved)
    }
}

/// Whether a target points at a remote resource (`http://`, `https://`,
/// optionally wrapped in angle brackets).
///
/// Remote targets are never resolved locally; diagram renderers fetch them
/// themselves.
#[must_use]
pub fn is_remote(target: &str) -> bool {
    let target = target.trim();
    let unwrapped = target
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(target)
        .trim();
    let lower = unwrapped.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Extension of a store path (lowercased, without the dot).
#[must_use]
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    if !has_extension(name) {
        return None;
    }
    name.rsplit('.').next().map(str::to_ascii_lowercase)
}

fn has_extension(name: &str) -> bool {
    matches!(name.rfind('.'), Some(i) if i > 0 && i + 1 < name.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_current_directory() {
        let resolver = PathResolver::default();

        assert_eq!(
            resolver.resolve("guide/index.adoc", "part.adoc").as_deref(),
            Some("guide/part.adoc")
        );
        assert_eq!(
            resolver.resolve("index.adoc", "part.adoc").as_deref(),
            Some("part.adoc")
        );
    }

    #[test]
    fn test_root_absolute() {
        let resolver = PathResolver::default();

        assert_eq!(
            resolver.resolve("guide/deep/index.adoc", "/shared/part.adoc").as_deref(),
            Some("shared/part.adoc")
        );
    }

    #[test]
    fn test_normalizes_dots_and_backslashes() {
        let resolver = PathResolver::default();

        assert_eq!(
            resolver
                .resolve("guide/deep/index.adoc", "..\\..\\shared\\.\\part.adoc")
                .as_deref(),
            Some("shared/part.adoc")
        );
        assert_eq!(
            resolver.resolve("./guide/index.adoc", "./a//b.adoc").as_deref(),
            Some("guide/a/b.adoc")
        );
    }

    #[test]
    fn test_escaping_root_is_absent() {
        let resolver = PathResolver::default();

        assert_eq!(resolver.resolve("index.adoc", "../outside.adoc"), None);
        assert_eq!(resolver.resolve("a/index.adoc", "../../outside.adoc"), None);
    }

    #[test]
    fn test_appends_default_extension() {
        let resolver = PathResolver::default();

        assert_eq!(
            resolver.resolve("index.adoc", "chapters/one").as_deref(),
            Some("chapters/one.adoc")
        );
        // Dotfiles have no extension
        assert_eq!(
            resolver.resolve("index.adoc", ".hidden").as_deref(),
            Some(".hidden.adoc")
        );
        assert_eq!(
            resolver.resolve("index.adoc", "styles.iuml").as_deref(),
            Some("styles.iuml")
        );
    }

    #[test]
    fn test_custom_extension_strips_dot() {
        let resolver = PathResolver::new(".asciidoc");

        assert_eq!(
            resolver.resolve("index.adoc", "part").as_deref(),
            Some("part.asciidoc")
        );
    }

    #[test]
    fn test_remote_targets_are_absent() {
        let resolver = PathResolver::default();

        assert_eq!(resolver.resolve("index.adoc", "http://example.com/a.adoc"), None);
        assert_eq!(resolver.resolve("index.adoc", "HTTPS://example.com/a"), None);
        assert_eq!(
            resolver.resolve("index.adoc", "<https://example.com/c4.puml>"),
            None
        );
    }

    #[test]
    fn test_empty_targets_are_absent() {
        let resolver = PathResolver::default();

        assert_eq!(resolver.resolve("index.adoc", ""), None);
        assert_eq!(resolver.resolve("index.adoc", "  "), None);
        assert_eq!(resolver.resolve("index.adoc", "/"), None);
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://kroki.io/x.puml"));
        assert!(is_remote(" <http://example.com/x> "));
        assert!(!is_remote("<C4/C4_Container>"));
        assert!(!is_remote("local/http.puml"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a/b.ADOC").as_deref(), Some("adoc"));
        assert_eq!(extension("a.b/c").as_deref(), None);
        assert_eq!(extension("styles.iuml").as_deref(), Some("iuml"));
    }
}
