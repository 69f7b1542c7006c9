//! Include resolution for docweave.
//!
//! Expands AsciiDoc `include::target[attrs]` directives recursively against a
//! [`DocumentStore`](docweave_storage::DocumentStore):
//!
//! - [`PathResolver`] maps targets to canonical store paths
//! - [`IncludeResolver`] expands directives, applying `lines`, `tag(s)`,
//!   `indent` and `leveloffset`
//! - [`DependencySet`] records every file read, for change-driven re-rendering
//!
//! Missing targets, cycles and depth overruns never fail the expansion. They
//! leave a `// docweave: ...` comment in the output and a warning in the log.

mod deps;
mod directive;
mod heading;
mod path;
mod resolver;
mod select;

pub use deps::DependencySet;
pub use directive::{
    IncludeDirective, IncludeOptions, LineRange, LineSelection, join_broken_directives,
    parse_directive, parse_options,
};
pub use heading::shift_headings;
pub use path::{PathResolver, extension, is_remote};
pub use resolver::{DEFAULT_MAX_DEPTH, IncludeResolver, IncludeState, VerbatimRegions};
