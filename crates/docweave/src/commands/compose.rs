//! `docweave compose` command implementation.

use std::path::PathBuf;

use clap::Args;
use docweave_config::{CliSettings, Config};
use docweave_include::{DependencySet, IncludeResolver, PathResolver};
use docweave_storage::{DocumentStore, FsStore};

use super::{store_path_for, write_stdout};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the compose command.
#[derive(Args)]
pub(crate) struct ComposeArgs {
    /// Document to compose.
    file: PathBuf,

    /// List every file the composed document was built from.
    #[arg(long)]
    deps: bool,

    /// Document source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover docweave.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ComposeArgs {
    /// Execute the compose command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the document can't be read.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let source_dir = &config.docs_resolved.source_dir;
        let path = store_path_for(source_dir, &self.file)?;
        let store = FsStore::new(source_dir.clone());

        let text = store.read(&path)?;
        let resolver = IncludeResolver::new(&store)
            .with_path_resolver(PathResolver::new(config.include.default_extension.clone()))
            .with_max_depth(config.include.max_depth);

        let mut dependencies = DependencySet::new();
        let composed = resolver.expand_document(&text, &path, &mut dependencies);

        write_stdout(&composed)?;

        if self.deps {
            output.info(&format!("Dependencies of {path}:"));
            for dependency in &dependencies {
                output.detail(&format!("  {dependency}"));
            }
        }

        Ok(())
    }
}
