//! `PlantUML` include expansion.
//!
//! Resolves includes inside diagram sources before rendering:
//! - `PlantUML` `!include`, `!include_once` and `!include_many`
//! - generic `include::target[...]` lines (attributes ignored)
//!
//! Targets are read through the document store. Included AsciiDoc files are
//! first passed through [`IncludeResolver`] so they can themselves use
//! `include::` directives.

use std::collections::HashSet;
use std::sync::LazyLock;

use docweave_include::{
    DependencySet, IncludeResolver, IncludeState, PathResolver, is_remote, parse_directive,
};
use docweave_storage::{DocumentStore, StoreError};
use regex::Regex;

static INCLUDE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)!(include|include_once|include_many)[ \t]+(.+?)[ \t]*$").unwrap()
});

/// Extensions of generic documents that get `include::` expansion first.
const DOCUMENT_EXTENSIONS: &[&str] = &["adoc", "asciidoc", "asc", "ad"];

/// Error that makes a diagram block unrenderable.
#[derive(Debug, thiserror::Error)]
pub enum DiagramIncludeError {
    #[error("include file not found: '{target}' (from {from})")]
    Missing { target: String, from: String },
    #[error("include depth exceeded maximum of {max_depth} at {path}")]
    DepthExceeded { path: String, max_depth: usize },
    #[error("failed to read include {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: StoreError,
    },
}

/// State shared by every diagram of one pipeline run.
#[derive(Debug, Default)]
pub struct DiagramIncludeState {
    /// Paths already pulled in by `!include_once`.
    once: HashSet<String>,
    dependencies: DependencySet,
}

impl DiagramIncludeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

/// A recognized include line.
struct IncludeLine<'a> {
    indent: &'a str,
    target: String,
    once: bool,
}

/// Parse a `PlantUML` `!include` family line or a generic `include::` line.
///
/// Generic targets are cleaned the same way as in documents: quotes and
/// `#fragment` suffixes are dropped. Their attributes are ignored.
fn parse_include_line(line: &str) -> Option<IncludeLine<'_>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];

    if let Some(directive) = parse_directive(line) {
        return Some(IncludeLine {
            indent,
            target: directive.target,
            once: false,
        });
    }

    let caps = INCLUDE_PATTERN.captures(line)?;
    let once = caps.get(2).is_some_and(|m| m.as_str() == "include_once");
    let target = caps.get(3)?.as_str().trim().trim_matches('"');
    Some(IncludeLine {
        indent,
        target: target.to_owned(),
        once,
    })
}

/// Standard library includes such as `<C4/C4_Container>` are resolved by the
/// renderer.
fn is_stdlib(target: &str) -> bool {
    target.starts_with('<') && target.ends_with('>')
}

/// Indent content with the given whitespace prefix, preserving empty lines.
fn indent_content(content: &str, indent: &str) -> String {
    if indent.is_empty() {
        return content.to_owned();
    }
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `@startuml` / `@enduml` markers of included files are dropped.
fn is_diagram_marker(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("@start") || line.starts_with("@end")
}

fn is_document(path: &str) -> bool {
    docweave_include::extension(path).is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Expands includes in diagram sources.
pub struct DiagramIncludeExpander<'a> {
    store: &'a dyn DocumentStore,
    paths: PathResolver,
}

impl<'a> DiagramIncludeExpander<'a> {
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            paths: PathResolver::default(),
        }
    }

    #[must_use]
    pub fn with_path_resolver(mut self, paths: PathResolver) -> Self {
        self.paths = paths;
        self
    }

    /// Expand every include in `source`, found in the document at
    /// `current_path`.
    ///
    /// Remote and standard library targets are kept verbatim. Every resolved
    /// target is recorded in the state's dependency set.
    pub fn expand(
        &self,
        source: &str,
        current_path: &str,
        max_depth: usize,
        state: &mut DiagramIncludeState,
    ) -> Result<String, DiagramIncludeError> {
        self.expand_at(source, current_path, 0, max_depth, state)
    }

    fn expand_at(
        &self,
        source: &str,
        current_path: &str,
        depth: usize,
        max_depth: usize,
        state: &mut DiagramIncludeState,
    ) -> Result<String, DiagramIncludeError> {
        let mut out: Vec<String> = Vec::new();

        for line in source.split('\n') {
            let Some(include) = parse_include_line(line) else {
                out.push(line.to_owned());
                continue;
            };
            if is_remote(&include.target) || is_stdlib(&include.target) {
                out.push(line.to_owned());
                continue;
            }

            let resolved = self
                .paths
                .resolve(current_path, &include.target)
                .filter(|path| self.store.exists(path))
                .ok_or_else(|| DiagramIncludeError::Missing {
                    target: include.target.clone(),
                    from: current_path.to_owned(),
                })?;
            state.dependencies.insert(resolved.as_str());

            if include.once && !state.once.insert(resolved.clone()) {
                tracing::debug!(path = %resolved, "Skipping repeated !include_once");
                continue;
            }

            if depth + 1 > max_depth {
                return Err(DiagramIncludeError::DepthExceeded {
                    path: resolved,
                    max_depth,
                });
            }

            let content = self
                .store
                .read(&resolved)
                .map_err(|source| DiagramIncludeError::Read {
                    path: resolved.clone(),
                    source,
                })?;
            let content = if is_document(&resolved) {
                self.expand_document(&content, &resolved, max_depth, state)
            } else {
                content
            };
            let content: String = content
                .lines()
                .filter(|l| !is_diagram_marker(l))
                .collect::<Vec<_>>()
                .join("\n");

            tracing::debug!(path = %resolved, depth = depth + 1, "Expanding diagram include");
            let expanded = self.expand_at(&content, &resolved, depth + 1, max_depth, state)?;
            out.push(indent_content(&expanded, include.indent));
        }

        Ok(out.join("\n"))
    }

    /// Run generic `include::` expansion over an included AsciiDoc file.
    fn expand_document(
        &self,
        content: &str,
        path: &str,
        max_depth: usize,
        state: &mut DiagramIncludeState,
    ) -> String {
        let resolver = IncludeResolver::new(self.store)
            .with_path_resolver(self.paths.clone())
            .with_max_depth(max_depth)
            .with_comment_prefix("'");
        let mut include_state =
            IncludeState::with_dependencies(path, std::mem::take(&mut state.dependencies));
        let expanded = resolver.expand(content, path, 0, 0, &mut include_state);
        state.dependencies = include_state.into_dependencies();
        expanded
    }
}
