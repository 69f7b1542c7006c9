//! Diagram rendering via Kroki for docweave.
//!
//! This crate turns diagram blocks embedded in a composed document into
//! images:
//! - [`DiagramBlockExtractor`] finds `[kind]` + `----` diagram blocks
//! - [`DiagramIncludeExpander`] resolves `PlantUML` `!include` family and
//!   `include::` lines inside diagram sources
//! - [`RenderCache`] keeps rendered payloads by content fingerprint and
//!   persists them as JSON
//! - [`KrokiClient`] renders sources via HTTP; [`classify`] spots error
//!   messages disguised as images
//! - [`DiagramPipeline`] ties it all together for one document
//! - [`RenderGenerations`] and [`needs_rerender`] drive re-rendering on change
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use docweave_diagrams::{DiagramPipeline, KrokiClient, PipelineOptions, RenderCache};
//! use docweave_storage::{DocumentStore, FsStore};
//!
//! let store = FsStore::new("docs".into());
//! let client = KrokiClient::new("https://kroki.io", Duration::from_secs(30));
//! let mut pipeline =
//!     DiagramPipeline::new(&store, &client, RenderCache::new(500), PipelineOptions::default());
//!
//! let text = store.read("index.adoc")?;
//! let rendered = pipeline.render(&text, "index.adoc");
//! ```

mod cache;
mod classify;
mod consts;
mod extract;
mod generation;
mod kroki;
mod language;
mod output;
mod pipeline;
mod plantuml;

pub use cache::{CacheError, CacheRecord, DiagramCache, DiagramKey, RenderCache};
pub use classify::{Verdict, classify};
pub use consts::{DEFAULT_CACHE_MAX_ITEMS, DEFAULT_TIMEOUT};
pub use extract::{DiagramBlock, DiagramBlockExtractor, DiagramBlocks};
pub use generation::{Generation, RenderGenerations, needs_rerender};
pub use kroki::{KrokiClient, RenderClient, RenderedPayload, TransportError, create_agent};
pub use language::{DiagramFormat, is_plantuml_family};
pub use output::{error_block, escape_html, image_block};
pub use pipeline::{DiagramPipeline, PipelineOptions, RenderStats, RenderedDocument};
pub use plantuml::{DiagramIncludeError, DiagramIncludeExpander, DiagramIncludeState};
