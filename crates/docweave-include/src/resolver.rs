//! Recursive include expansion.
//!
//! [`IncludeResolver`] replaces `include::` directives with the (selected,
//! re-indented, heading-shifted) content of the target, recursively. Problems
//! never abort expansion: they are reported inline as comments and logged.

use std::ops::Range;

use docweave_storage::DocumentStore;

use crate::deps::DependencySet;
use crate::directive::{IncludeDirective, join_broken_directives, parse_directive};
use crate::heading::HeadingShifter;
use crate::path::PathResolver;
use crate::select::select;

/// Default maximum include nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 30;

/// Mutable state threaded through one expansion.
#[derive(Debug)]
pub struct IncludeState {
    dependencies: DependencySet,
    /// Paths currently being expanded, outermost first.
    stack: Vec<String>,
}

impl IncludeState {
    /// Start expanding the document at `root_path`.
    ///
    /// The root is recorded as a dependency and placed on the cycle stack.
    #[must_use]
    pub fn new(root_path: &str) -> Self {
        Self::with_dependencies(root_path, DependencySet::new())
    }

    /// Start expanding with an existing dependency set.
    #[must_use]
    pub fn with_dependencies(root_path: &str, mut dependencies: DependencySet) -> Self {
        dependencies.insert(root_path);
        Self {
            dependencies,
            stack: vec![root_path.to_owned()],
        }
    }

    #[must_use]
    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    #[must_use]
    pub fn into_dependencies(self) -> DependencySet {
        self.dependencies
    }
}

/// Finds regions of a file that expansion must copy through untouched.
///
/// Regions are byte ranges into the text passed to
/// [`VerbatimRegions::regions`]. They must be sorted, disjoint, and start and
/// end on line boundaries. Directives and headings inside a region are left
/// as written.
pub trait VerbatimRegions {
    fn regions(&self, text: &str) -> Vec<Range<usize>>;
}

/// Expands include directives against a document store.
///
/// # Example
///
/// ```
/// use docweave_include::{DependencySet, IncludeResolver};
/// use docweave_storage::MockStore;
///
/// let store = MockStore::new().with_file("part.adoc", "== Part\n");
/// let resolver = IncludeResolver::new(&store);
///
/// let mut deps = DependencySet::new();
/// let text = resolver.expand_document("= Doc\ninclude::part.adoc[]", "index.adoc", &mut deps);
///
/// assert!(text.contains("== Part"));
/// assert!(deps.contains("part.adoc"));
/// ```
pub struct IncludeResolver<'a> {
    store: &'a dyn DocumentStore,
    paths: PathResolver,
    max_depth: usize,
    comment_prefix: &'static str,
    verbatim: Option<&'a dyn VerbatimRegions>,
}

impl<'a> IncludeResolver<'a> {
    /// Create a resolver with default path resolution and depth limit.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            paths: PathResolver::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            comment_prefix: "//",
            verbatim: None,
        }
    }

    #[must_use]
    pub fn with_path_resolver(mut self, paths: PathResolver) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Line comment marker used for provenance and diagnostic lines.
    ///
    /// Defaults to `//`. Diagram sources use `'`.
    #[must_use]
    pub fn with_comment_prefix(mut self, prefix: &'static str) -> Self {
        self.comment_prefix = prefix;
        self
    }

    /// Leave the regions found by `verbatim` untouched in every expanded
    /// file, the root and all included files alike.
    #[must_use]
    pub fn with_verbatim_regions(mut self, verbatim: &'a dyn VerbatimRegions) -> Self {
        self.verbatim = Some(verbatim);
        self
    }

    #[must_use]
    pub fn path_resolver(&self) -> &PathResolver {
        &self.paths
    }

    /// Expand a whole document, recording every file read into
    /// `dependencies` (the root path included).
    pub fn expand_document(
        &self,
        text: &str,
        path: &str,
        dependencies: &mut DependencySet,
    ) -> String {
        let mut state = IncludeState::with_dependencies(path, std::mem::take(dependencies));
        let expanded = self.expand(text, path, 0, 0, &mut state);
        *dependencies = state.into_dependencies();
        expanded
    }

    /// Expand directives in `text`, which lives at `current_path`.
    ///
    /// Lines belonging to `text` itself have their headings shifted by
    /// `inherited_offset`. Included content is expanded recursively with the
    /// offset accumulated so far and spliced in verbatim, so each heading is
    /// shifted exactly once.
    ///
    /// Text without directives and with a zero offset is returned unchanged.
    pub fn expand(
        &self,
        text: &str,
        current_path: &str,
        inherited_offset: i32,
        depth: usize,
        state: &mut IncludeState,
    ) -> String {
        let joined = join_broken_directives(text);
        let regions = self
            .verbatim
            .map(|verbatim| verbatim.regions(&joined))
            .unwrap_or_default();

        let mut shifter = HeadingShifter::default();
        let mut out = String::with_capacity(joined.len());
        let mut last = 0;

        for region in regions {
            if region.start < last || region.end > joined.len() {
                continue;
            }
            out.push_str(&self.expand_lines(
                &joined[last..region.start],
                current_path,
                inherited_offset,
                depth,
                state,
                &mut shifter,
            ));
            out.push_str(&joined[region.start..region.end]);
            last = region.end;
        }
        out.push_str(&self.expand_lines(
            &joined[last..],
            current_path,
            inherited_offset,
            depth,
            state,
            &mut shifter,
        ));

        out
    }

    /// Expand the directives and shift the headings of a run of whole lines.
    fn expand_lines(
        &self,
        segment: &str,
        current_path: &str,
        inherited_offset: i32,
        depth: usize,
        state: &mut IncludeState,
        shifter: &mut HeadingShifter,
    ) -> String {
        let mut out: Vec<String> = Vec::new();

        for line in segment.split('\n') {
            match parse_directive(line) {
                Some(directive) => {
                    if let Some(block) =
                        self.include(&directive, current_path, inherited_offset, depth, state)
                    {
                        out.push(block);
                    }
                }
                None => out.push(shifter.shift_line(line, inherited_offset).into_owned()),
            }
        }

        out.join("\n")
    }

    /// Produce the replacement for one directive, or `None` to drop it.
    fn include(
        &self,
        directive: &IncludeDirective,
        current_path: &str,
        inherited_offset: i32,
        depth: usize,
        state: &mut IncludeState,
    ) -> Option<String> {
        let resolved = self
            .paths
            .resolve(current_path, &directive.target)
            .filter(|path| self.store.exists(path));

        let Some(resolved) = resolved else {
            if directive.options.optional {
                tracing::debug!(include = %directive.target, from = current_path, "Optional include not found");
                return None;
            }
            tracing::warn!(include = %directive.target, from = current_path, "Include target not found");
            return Some(self.diagnostic(&format!(
                "include target not found: {}",
                directive.target
            )));
        };

        state.dependencies.insert(resolved.as_str());

        if state.stack.iter().any(|p| *p == resolved) {
            tracing::warn!(path = %resolved, from = current_path, "Include cycle detected");
            return Some(self.diagnostic(&format!(
                "include cycle detected: {} -> {resolved}",
                state.stack.join(" -> ")
            )));
        }

        if depth + 1 > self.max_depth {
            tracing::warn!(path = %resolved, max_depth = self.max_depth, "Include depth exceeded");
            return Some(self.diagnostic(&format!(
                "maximum include depth {} exceeded at {resolved}",
                self.max_depth
            )));
        }

        let raw = match self.store.read(&resolved) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %resolved, error = %e, "Failed to read include");
                return Some(self.diagnostic(&format!("failed to read {resolved}: {e}")));
            }
        };

        let selected = select(&raw, &directive.options);
        let offset = inherited_offset.saturating_add(directive.options.level_offset.unwrap_or(0));

        tracing::debug!(path = %resolved, depth = depth + 1, offset, "Expanding include");

        state.stack.push(resolved.clone());
        let expanded = self.expand(&selected, &resolved, offset, depth + 1, state);
        state.stack.pop();

        Some(self.wrap(&resolved, &expanded))
    }

    fn wrap(&self, path: &str, content: &str) -> String {
        let prefix = self.comment_prefix;
        if content.is_empty() {
            format!("{prefix} begin include::{path}\n{prefix} end include::{path}")
        } else {
            format!("{prefix} begin include::{path}\n{content}\n{prefix} end include::{path}")
        }
    }

    fn diagnostic(&self, message: &str) -> String {
        format!("{} docweave: {message}", self.comment_prefix)
    }
}

#[cfg(test)]
mod tests {
    use docweave_storage::MockStore;
    use pretty_assertions::assert_eq;

    use super::*;

    fn expand(store: &MockStore, text: &str) -> (String, DependencySet) {
        let resolver = IncludeResolver::new(store);
        let mut deps = DependencySet::new();
        let out = resolver.expand_document(text, "index.adoc", &mut deps);
        (out, deps)
    }

    #[test]
    fn test_no_directives_is_identity() {
        let store = MockStore::new();
        let text = "= Title\r\n\n== Section\n\ninclude text mid-line include::a.adoc[]\n";

        let (out, deps) = expand(&store, text);

        assert_eq!(out, text);
        assert_eq!(deps.iter().collect::<Vec<_>>(), vec!["index.adoc"]);
    }

    #[test]
    fn test_simple_include_with_provenance() {
        let store = MockStore::new().with_file("part.adoc", "Part text\n");

        let (out, deps) = expand(&store, "before\ninclude::part.adoc[]\nafter");

        assert_eq!(
            out,
            "before\n// begin include::part.adoc\nPart text\n// end include::part.adoc\nafter"
        );
        assert!(deps.contains("part.adoc"));
    }

    #[test]
    fn test_dependencies_recorded_once() {
        let store = MockStore::new()
            .with_file("a.adoc", "include::shared.adoc[]\n")
            .with_file("b.adoc", "include::shared.adoc[]\n")
            .with_file("shared.adoc", "Shared\n");

        let (_, deps) = expand(
            &store,
            "include::a.adoc[]\ninclude::b.adoc[]\ninclude::a.adoc[]",
        );

        assert_eq!(
            deps.iter().collect::<Vec<_>>(),
            vec!["a.adoc", "b.adoc", "index.adoc", "shared.adoc"]
        );
    }

    #[test]
    fn test_missing_target_emits_diagnostic() {
        let store = MockStore::new();

        let (out, deps) = expand(&store, "include::missing.adoc[]");

        assert_eq!(out, "// docweave: include target not found: missing.adoc");
        assert!(!deps.contains("missing.adoc"));
    }

    #[test]
    fn test_optional_missing_target_emits_nothing() {
        let store = MockStore::new();

        let (out, _) = expand(&store, "a\ninclude::missing.adoc[opts=optional]\nb");

        assert_eq!(out, "a\nb");
    }

    #[test]
    fn test_self_include_terminates() {
        let store = MockStore::new().with_file("index.adoc", "include::index.adoc[]");

        let (out, deps) = expand(&store, "Top\ninclude::index.adoc[]");

        assert!(out.starts_with("Top\n// docweave: include cycle detected"));
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_indirect_cycle_terminates() {
        let store = MockStore::new()
            .with_file("a.adoc", "A\ninclude::b.adoc[]")
            .with_file("b.adoc", "B\ninclude::a.adoc[]");

        let (out, deps) = expand(&store, "include::a.adoc[]");

        assert!(out.contains("B\n// docweave: include cycle detected: index.adoc -> a.adoc -> b.adoc -> a.adoc"));
        assert!(deps.contains("a.adoc"));
        assert!(deps.contains("b.adoc"));
    }

    #[test]
    fn test_depth_limit() {
        let mut store = MockStore::new();
        for i in 0..40 {
            store = store.with_file(format!("d{i}.adoc"), format!("include::d{}.adoc[]", i + 1));
        }
        let resolver = IncludeResolver::new(&store).with_max_depth(5);
        let mut deps = DependencySet::new();

        let out = resolver.expand_document("include::d0.adoc[]", "index.adoc", &mut deps);

        assert!(out.contains("// docweave: maximum include depth 5 exceeded at d5.adoc"));
        assert!(out.contains("// begin include::d4.adoc"));
        assert!(!out.contains("// begin include::d5.adoc"));
    }

    #[test]
    fn test_nested_level_offsets_accumulate() {
        let store = MockStore::new()
            .with_file("outer.adoc", "= Outer\ninclude::inner.adoc[leveloffset=+1]\n")
            .with_file("inner.adoc", "= Inner\n== Inner Section\n");

        let (out, _) = expand(&store, "= Doc\ninclude::outer.adoc[leveloffset=+1]");

        assert_eq!(
            out,
            "= Doc\n\
             // begin include::outer.adoc\n\
             == Outer\n\
             // begin include::inner.adoc\n\
             === Inner\n\
             ==== Inner Section\n\
             // end include::inner.adoc\n\
             // end include::outer.adoc"
        );
    }

    #[test]
    fn test_huge_nested_offsets_saturate() {
        let store = MockStore::new()
            .with_file("a.adoc", "= A\ninclude::b.adoc[leveloffset=+2147483647]\n")
            .with_file("b.adoc", "Body\n");

        let (out, deps) = expand(&store, "include::a.adoc[leveloffset=+2147483647]");

        assert!(out.contains("\nBody\n"));
        assert!(deps.contains("b.adoc"));
    }

    #[test]
    fn test_extreme_negative_offsets_floor_at_one() {
        let store = MockStore::new()
            .with_file("a.adoc", "include::b.adoc[leveloffset=-2147483648]\n")
            .with_file("b.adoc", "=== Deep\n");

        let (out, _) = expand(&store, "include::a.adoc[leveloffset=-2147483648]");

        assert!(out.contains("\n= Deep\n"));
    }

    #[test]
    fn test_negative_offset_floors_at_one() {
        let store = MockStore::new().with_file("part.adoc", "=== Deep\n");

        let (out, _) = expand(&store, "include::part.adoc[leveloffset=-5]");

        assert!(out.contains("\n= Deep\n"));
    }

    #[test]
    fn test_lines_selection_applied() {
        let store = MockStore::new().with_file(
            "code.adoc",
            "L1\nL2\nL3\nL4\nL5\nL6\nL7\nL8\nL9\nL10\n",
        );

        let (out, _) = expand(&store, "include::code.adoc[lines=\"2;5..6\"]");

        assert_eq!(
            out,
            "// begin include::code.adoc\nL2\n\nL5\nL6\n// end include::code.adoc"
        );
    }

    #[test]
    fn test_tags_and_indent_applied() {
        let store = MockStore::new().with_file(
            "src/main.rs",
            "fn main() {\n    // tag::body[]\n    run();\n    // end::body[]\n}\n",
        );

        let (out, _) = expand(&store, "include::src/main.rs[tag=body,indent=2]");

        assert_eq!(
            out,
            "// begin include::src/main.rs\n  run();\n// end include::src/main.rs"
        );
    }

    #[test]
    fn test_relative_paths_follow_including_file() {
        let store = MockStore::new()
            .with_file("guide/chapter.adoc", "include::fragments/note.adoc[]")
            .with_file("guide/fragments/note.adoc", "Note");

        let (out, deps) = expand(&store, "include::guide/chapter.adoc[]");

        assert!(out.contains("\nNote\n"));
        assert!(deps.contains("guide/fragments/note.adoc"));
    }

    #[test]
    fn test_broken_directive_is_joined() {
        let store = MockStore::new().with_file("part.adoc", "A\nB\nC\n");

        let (out, _) = expand(&store, "include::part.adoc[lines=1,\n   indent=0]");

        assert_eq!(out, "// begin include::part.adoc\nA\n// end include::part.adoc");
    }

    #[test]
    fn test_empty_included_file() {
        let store = MockStore::new().with_file("empty.adoc", "");

        let (out, _) = expand(&store, "include::empty.adoc[]");

        assert_eq!(
            out,
            "// begin include::empty.adoc\n// end include::empty.adoc"
        );
    }

    #[test]
    fn test_custom_comment_prefix() {
        let store = MockStore::new();
        let resolver = IncludeResolver::new(&store).with_comment_prefix("'");
        let mut state = IncludeState::new("d.puml");

        let out = resolver.expand("include::nope.adoc[]", "d.puml", 0, 0, &mut state);

        assert_eq!(out, "' docweave: include target not found: nope.adoc");
    }

    #[test]
    fn test_directives_inside_listing_blocks_are_expanded() {
        let store = MockStore::new().with_file("snippet.adoc", "= not shifted\n");

        let (out, _) = expand(&store, "----\ninclude::snippet.adoc[]\n----");

        assert_eq!(
            out,
            "----\n// begin include::snippet.adoc\n= not shifted\n// end include::snippet.adoc\n----"
        );
    }

    /// Treats `----` delimited blocks as verbatim.
    struct ListingBlocks;

    impl VerbatimRegions for ListingBlocks {
        fn regions(&self, text: &str) -> Vec<Range<usize>> {
            let mut regions = Vec::new();
            let mut open = None;
            let mut pos = 0;
            for line in text.split_inclusive('\n') {
                if line.trim_end() == "----" {
                    match open.take() {
                        Some(start) => regions.push(start..pos + line.trim_end().len()),
                        None => open = Some(pos),
                    }
                }
                pos += line.len();
            }
            regions
        }
    }

    #[test]
    fn test_verbatim_regions_untouched_at_every_level() {
        let store = MockStore::new()
            .with_file(
                "part.adoc",
                "= Part\n----\ninclude::inner.puml[]\n----\ninclude::note.adoc[]",
            )
            .with_file("note.adoc", "Note");
        let resolver = IncludeResolver::new(&store).with_verbatim_regions(&ListingBlocks);
        let mut deps = DependencySet::new();

        let out = resolver.expand_document(
            "----\ninclude::root.puml[]\n----\ninclude::part.adoc[leveloffset=+1]",
            "index.adoc",
            &mut deps,
        );

        assert_eq!(
            out,
            "----\n\
             include::root.puml[]\n\
             ----\n\
             // begin include::part.adoc\n\
             == Part\n\
             ----\n\
             include::inner.puml[]\n\
             ----\n\
             // begin include::note.adoc\n\
             Note\n\
             // end include::note.adoc\n\
             // end include::part.adoc"
        );
        assert!(!deps.contains("inner.puml"));
        assert!(!deps.contains("root.puml"));
    }
}
