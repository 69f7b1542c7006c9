//! Document rendering pipeline.
//!
//! [`DiagramPipeline::render`] composes a document and replaces its diagram
//! blocks with rendered images:
//!
//! 1. Expand `include::` directives, leaving diagram blocks untouched in
//!    every file
//! 2. Extract diagram blocks of the enabled kinds
//! 3. Expand `PlantUML` includes in PlantUML-family sources
//! 4. Serve each diagram from the cache or render it via the [`RenderClient`]
//! 5. Substitute an image or error block at each diagram's span
//!
//! A failing diagram never fails the document.

use std::ops::Range;

use docweave_include::{
    DEFAULT_MAX_DEPTH, DependencySet, IncludeResolver, PathResolver, VerbatimRegions,
};
use docweave_storage::DocumentStore;

use crate::cache::{CacheRecord, DiagramKey, RenderCache};
use crate::classify::{Verdict, classify};
use crate::extract::{DiagramBlock, DiagramBlockExtractor};
use crate::kroki::RenderClient;
use crate::language::{DiagramFormat, is_plantuml_family};
use crate::output::{error_block, image_block};
use crate::plantuml::{DiagramIncludeExpander, DiagramIncludeState};

/// Diagram kinds rendered when none are configured.
const DEFAULT_KINDS: &[&str] = &["plantuml", "c4plantuml", "mermaid", "graphviz"];

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Diagram kinds to render (case-insensitive). Other blocks are left as is.
    pub kinds: Vec<String>,
    pub default_format: DiagramFormat,
    /// Maximum nesting depth for both include dialects.
    pub max_include_depth: usize,
    /// Extension appended to include targets without one.
    pub default_extension: String,
    pub use_cache: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_KINDS.iter().map(|k| (*k).to_owned()).collect(),
            default_format: DiagramFormat::default(),
            max_include_depth: DEFAULT_MAX_DEPTH,
            default_extension: "adoc".to_owned(),
            use_cache: true,
        }
    }
}

/// Per-run diagram counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Rendered by the service.
    pub rendered: usize,
    /// Served from the cache.
    pub cached: usize,
    /// Replaced by an error block.
    pub failed: usize,
    /// Blocks of kinds that are not enabled.
    pub skipped: usize,
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub document: String,
    /// Every file read while producing `document`, the root included.
    pub dependencies: DependencySet,
    pub stats: RenderStats,
}

/// Composes documents and renders their diagrams.
pub struct DiagramPipeline<'a> {
    store: &'a dyn DocumentStore,
    client: &'a dyn RenderClient,
    cache: RenderCache,
    options: PipelineOptions,
}

impl<'a> DiagramPipeline<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn DocumentStore,
        client: &'a dyn RenderClient,
        cache: RenderCache,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            client,
            cache,
            options,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    #[must_use]
    pub fn into_cache(self) -> RenderCache {
        self.cache
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Render the document `text` stored at `path`.
    pub fn render(&mut self, text: &str, path: &str) -> RenderedDocument {
        let extractor = DiagramBlockExtractor::new(self.options.default_format);
        let paths = PathResolver::new(self.options.default_extension.clone());

        let mut dependencies = DependencySet::new();
        let composed = {
            let diagrams = EnabledDiagrams {
                extractor,
                kinds: &self.options.kinds,
            };
            IncludeResolver::new(self.store)
                .with_path_resolver(paths.clone())
                .with_max_depth(self.options.max_include_depth)
                .with_verbatim_regions(&diagrams)
                .expand_document(text, path, &mut dependencies)
        };

        let expander = DiagramIncludeExpander::new(self.store).with_path_resolver(paths);
        let mut include_state = DiagramIncludeState::new();
        let mut origins = Provenance::new(path);
        let mut stats = RenderStats::default();
        let mut replacements: Vec<(Range<usize>, String)> = Vec::new();

        for block in extractor.extract(&composed) {
            if !kind_enabled(&self.options.kinds, &block.kind) {
                tracing::debug!(kind = %block.kind, "Skipping block of disabled kind");
                stats.skipped += 1;
                continue;
            }
            let origin = origins.origin_at(&composed, block.span.start).to_owned();
            let replacement =
                self.render_block(&block, &origin, &expander, &mut include_state, &mut stats);
            replacements.push((block.span, replacement));
        }

        dependencies.extend(include_state.into_dependencies());

        tracing::info!(
            path,
            rendered = stats.rendered,
            cached = stats.cached,
            failed = stats.failed,
            skipped = stats.skipped,
            "Rendered document"
        );

        RenderedDocument {
            document: substitute(&composed, replacements),
            dependencies,
            stats,
        }
    }

    fn render_block(
        &mut self,
        block: &DiagramBlock,
        origin: &str,
        expander: &DiagramIncludeExpander<'_>,
        include_state: &mut DiagramIncludeState,
        stats: &mut RenderStats,
    ) -> String {
        let kind = block.kind.trim().to_ascii_lowercase();

        let source = if is_plantuml_family(&kind) {
            match expander.expand(&block.source, origin, self.options.max_include_depth, include_state) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(kind = %kind, from = origin, error = %e, "Diagram include failed");
                    stats.failed += 1;
                    return error_block(&e.to_string(), &block.source);
                }
            }
        } else {
            block.source.clone()
        };

        let fingerprint = DiagramKey {
            kind: &kind,
            format: block.format.as_str(),
            source: &source,
        }
        .fingerprint();

        if self.options.use_cache {
            if let Some(record) = self.cache.get(&fingerprint) {
                match record.payload() {
                    Ok(bytes) => {
                        tracing::debug!(kind = %kind, fingerprint = %fingerprint, "Diagram cache hit");
                        stats.cached += 1;
                        return image_block(block.format, &bytes);
                    }
                    Err(e) => {
                        tracing::warn!(fingerprint = %fingerprint, error = %e, "Ignoring corrupt cache record");
                    }
                }
            }
            tracing::debug!(kind = %kind, fingerprint = %fingerprint, "Diagram cache miss");
        }

        let payload = match self.client.render(&kind, block.format, &source) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(kind = %kind, from = origin, error = %e, "Diagram rendering failed");
                stats.failed += 1;
                return error_block(&e.to_string(), &source);
            }
        };

        if let Verdict::DisguisedFailure { phrase } = classify(block.format, &payload.bytes) {
            tracing::warn!(kind = %kind, from = origin, phrase, "Renderer returned an error image");
            stats.failed += 1;
            return error_block(&format!("renderer reported \"{phrase}\""), &source);
        }

        stats.rendered += 1;
        if self.options.use_cache {
            self.cache
                .insert(fingerprint, CacheRecord::new(payload.mime.as_str(), &payload.bytes));
            if self.cache.len() > self.cache.max_items() {
                self.cache.trim();
            }
        }
        image_block(block.format, &payload.bytes)
    }
}

fn kind_enabled(kinds: &[String], kind: &str) -> bool {
    let kind = kind.trim();
    kinds.iter().any(|k| k.eq_ignore_ascii_case(kind))
}

/// Diagram blocks of enabled kinds, kept away from generic include
/// expansion so `include::` lines in their bodies reach the diagram
/// expander.
struct EnabledDiagrams<'p> {
    extractor: DiagramBlockExtractor,
    kinds: &'p [String],
}

impl VerbatimRegions for EnabledDiagrams<'_> {
    fn regions(&self, text: &str) -> Vec<Range<usize>> {
        self.extractor
            .extract(text)
            .filter(|block| kind_enabled(self.kinds, &block.kind))
            .map(|block| block.span)
            .collect()
    }
}

/// Replace each span with its replacement. Spans must be sorted and
/// disjoint.
fn substitute(text: &str, replacements: Vec<(Range<usize>, String)>) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for (span, replacement) in replacements {
        result.push_str(&text[last..span.start]);
        result.push_str(&replacement);
        last = span.end;
    }
    result.push_str(&text[last..]);
    result
}

/// Tracks which included file a position of the composed document came
/// from, using the `// begin include::` and `// end include::` markers.
struct Provenance<'d> {
    root: &'d str,
    stack: Vec<&'d str>,
    scanned: usize,
}

impl<'d> Provenance<'d> {
    fn new(root: &'d str) -> Self {
        Self {
            root,
            stack: Vec::new(),
            scanned: 0,
        }
    }

    /// Origin of `offset`. Offsets must be non-decreasing across calls.
    fn origin_at(&mut self, document: &'d str, offset: usize) -> &'d str {
        if offset > self.scanned {
            for line in document[self.scanned..offset].lines() {
                if let Some(path) = line.strip_prefix("// begin include::") {
                    self.stack.push(path);
                } else if line.starts_with("// end include::") {
                    self.stack.pop();
                }
            }
            self.scanned = offset;
        }
        self.stack.last().copied().unwrap_or(self.root)
    }
}
