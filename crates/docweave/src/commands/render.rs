//! `docweave render` command implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, mpsc};
use std::thread;

use clap::Args;
use docweave_config::{CliSettings, Config};
use docweave_diagrams::{
    DiagramFormat, DiagramPipeline, Generation, KrokiClient, PipelineOptions, RenderCache,
    RenderGenerations, RenderedDocument, needs_rerender,
};
use docweave_storage::{DocumentStore, FsStore};

use super::{store_path_for, write_stdout};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Document to render.
    file: PathBuf,

    /// Write the rendered document here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Re-render whenever the document or one of its includes changes.
    #[arg(short, long, requires = "output")]
    watch: bool,

    /// Kroki server URL for diagram rendering (overrides config).
    #[arg(long)]
    kroki_url: Option<String>,

    /// Output format for diagrams: svg or png (overrides config).
    #[arg(long)]
    format: Option<String>,

    /// Disable the diagram cache.
    #[arg(long)]
    no_cache: bool,

    /// Document source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover docweave.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output (show include and diagram logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the document can't be read,
    /// or the output can't be written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir.clone(),
            kroki_url: self.kroki_url.clone(),
            cache_enabled: self.no_cache.then_some(false),
            default_format: self.format.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let diagrams = &config.diagrams_resolved;
        diagrams.check_scheme()?;

        let default_format = DiagramFormat::parse(&diagrams.default_format).ok_or_else(|| {
            CliError::Validation(format!(
                "Unsupported diagram format: {}",
                diagrams.default_format
            ))
        })?;

        let source_dir = &config.docs_resolved.source_dir;
        let path = store_path_for(source_dir, &self.file)?;
        let store = FsStore::new(source_dir.clone());
        let client = KrokiClient::new(diagrams.kroki_url.clone(), diagrams.timeout);

        let cache = if diagrams.cache_enabled {
            RenderCache::load(&diagrams.cache_file, diagrams.cache_max_items)
        } else {
            RenderCache::new(diagrams.cache_max_items)
        };
        let options = PipelineOptions {
            kinds: diagrams.kinds.clone(),
            default_format,
            max_include_depth: config.include.max_depth,
            default_extension: config.include.default_extension.clone(),
            use_cache: diagrams.cache_enabled,
        };
        let mut pipeline = DiagramPipeline::new(&store, &client, cache, options);

        output.info(&format!("Source: {}", source_dir.display()));
        output.info(&format!("Kroki URL: {}", diagrams.kroki_url));

        if diagrams.cache_enabled {
            ensure_project_dir(&config.docs_resolved.project_dir)?;
        }

        let text = store.read(&path)?;
        let rendered = pipeline.render(&text, &path);
        self.emit(&output, &rendered)?;
        if diagrams.cache_enabled {
            pipeline.cache().save(&diagrams.cache_file)?;
        }

        if self.watch {
            let cache_file = diagrams.cache_enabled.then_some(diagrams.cache_file.as_path());
            self.watch_loop(&output, &store, pipeline, &path, rendered, cache_file)?;
        }

        Ok(())
    }

    /// Re-render on every batch of changes touching the document's
    /// dependencies, until the watcher stops.
    ///
    /// Renders run on a worker thread while this thread keeps receiving
    /// events. Each accepted batch starts a new generation; a render whose
    /// generation was superseded meanwhile is dropped instead of written.
    fn watch_loop(
        &self,
        output: &Output,
        store: &FsStore,
        pipeline: DiagramPipeline<'_>,
        path: &str,
        last: RenderedDocument,
        cache_file: Option<&Path>,
    ) -> Result<(), CliError> {
        let (events, _handle) = store.watch()?;
        let generations = RenderGenerations::new();
        let dependencies = Mutex::new(last.dependencies);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Generation>();

        output.info(&format!(
            "Watching {} files for changes (Ctrl+C to stop)",
            dependencies.lock().unwrap().len()
        ));

        thread::scope(|scope| {
            let worker = scope.spawn(|| {
                let jobs = jobs_rx;
                let mut pipeline = pipeline;
                let output = Output::new();

                let render = || {
                    let text = match store.read(path) {
                        Ok(text) => text,
                        Err(e) => {
                            output.warning(&format!("Cannot read {path}: {e}"));
                            return None;
                        }
                    };
                    let rendered = pipeline.render(&text, path);
                    if let Some(cache_file) = cache_file
                        && let Err(e) = pipeline.cache().save(cache_file)
                    {
                        output.warning(&format!("Failed to save diagram cache: {e}"));
                    }
                    Some(rendered)
                };
                let apply = |rendered: RenderedDocument| {
                    if let Err(e) = self.emit(&output, &rendered) {
                        output.error(&format!("Failed to write output: {e}"));
                    }
                    *dependencies.lock().unwrap() = rendered.dependencies;
                };

                run_jobs(&jobs, &generations, render, apply)
            });

            while let Some(first) = events.recv() {
                let mut changed = vec![first];
                changed.extend(events.drain());

                if !needs_rerender(&dependencies.lock().unwrap(), &changed) {
                    tracing::debug!(events = changed.len(), "Ignoring unrelated changes");
                    continue;
                }

                let generation = generations.begin();
                if jobs_tx.send(generation).is_err() {
                    break;
                }
            }
            drop(jobs_tx);

            let applied = worker
                .join()
                .map_err(|_| CliError::Watch("render worker panicked".to_owned()))?;
            tracing::debug!(applied, "Watch stopped");
            Ok(())
        })
    }

    /// Write the rendered document and report its diagram counts.
    fn emit(&self, output: &Output, rendered: &RenderedDocument) -> Result<(), CliError> {
        match &self.output {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(out, &rendered.document)?;
            }
            None => write_stdout(&rendered.document)?,
        }

        let stats = rendered.stats;
        let summary = format!(
            "Diagrams: {} rendered, {} cached, {} failed, {} skipped",
            stats.rendered, stats.cached, stats.failed, stats.skipped
        );
        if stats.failed > 0 {
            output.warning(&summary);
        } else {
            output.success(&summary);
        }
        if let Some(out) = &self.output {
            output.detail(&format!("Wrote {}", out.display()));
        }
        Ok(())
    }
}

/// Serve render requests until the sender hangs up.
///
/// A request that is no longer current when taken off the queue is skipped.
/// A render whose generation was superseded while it ran is discarded.
/// Returns how many renders were applied.
fn run_jobs(
    jobs: &mpsc::Receiver<Generation>,
    generations: &RenderGenerations,
    mut render: impl FnMut() -> Option<RenderedDocument>,
    mut apply: impl FnMut(RenderedDocument),
) -> usize {
    let mut applied = 0;
    for generation in jobs {
        if !generations.is_current(generation) {
            tracing::debug!(?generation, "Skipping superseded render request");
            continue;
        }
        let Some(rendered) = render() else {
            continue;
        };
        if !generations.is_current(generation) {
            tracing::debug!(?generation, "Discarding stale render");
            continue;
        }
        apply(rendered);
        applied += 1;
    }
    applied
}

/// Ensure the `.docweave/` project directory exists with a `.gitignore`.
fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = fs::write(&gitignore_path, "# Automatically created by docweave\n*\n");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use docweave_diagrams::{RenderGenerations, RenderStats, RenderedDocument};
    use docweave_include::DependencySet;
    use pretty_assertions::assert_eq;

    use super::*;

    fn document(text: &str) -> RenderedDocument {
        RenderedDocument {
            document: text.to_owned(),
            dependencies: DependencySet::new(),
            stats: RenderStats::default(),
        }
    }

    #[test]
    fn test_render_superseded_while_running_is_dropped() {
        let generations = RenderGenerations::new();
        let (tx, rx) = mpsc::channel();
        tx.send(generations.begin()).unwrap();
        drop(tx);

        let mut written = Vec::new();
        let applied = run_jobs(
            &rx,
            &generations,
            || {
                // A newer change arrives while this render is in flight.
                generations.begin();
                Some(document("stale"))
            },
            |rendered| written.push(rendered.document),
        );

        assert_eq!(applied, 0);
        assert!(written.is_empty());
    }

    #[test]
    fn test_queued_superseded_request_is_skipped() {
        let generations = RenderGenerations::new();
        let (tx, rx) = mpsc::channel();
        tx.send(generations.begin()).unwrap();
        tx.send(generations.begin()).unwrap();
        drop(tx);

        let mut renders = 0;
        let mut written = Vec::new();
        let applied = run_jobs(
            &rx,
            &generations,
            || {
                renders += 1;
                Some(document(&format!("render {renders}")))
            },
            |rendered| written.push(rendered.document),
        );

        assert_eq!(renders, 1);
        assert_eq!(applied, 1);
        assert_eq!(written, vec!["render 1".to_owned()]);
    }

    #[test]
    fn test_failed_read_applies_nothing() {
        let generations = RenderGenerations::new();
        let (tx, rx) = mpsc::channel();
        tx.send(generations.begin()).unwrap();
        drop(tx);

        let applied = run_jobs(&rx, &generations, || None, |_| panic!("nothing to apply"));

        assert_eq!(applied, 0);
    }

    #[test]
    fn test_newer_generation_during_render_wins() {
        let generations = RenderGenerations::new();
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (started_tx, started_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();

        let written = thread::scope(|scope| {
            let generations = &generations;
            let worker = scope.spawn(move || {
                let mut renders = 0;
                let mut written = Vec::new();
                run_jobs(
                    &jobs_rx,
                    generations,
                    || {
                        renders += 1;
                        started_tx.send(()).unwrap();
                        resume_rx.recv().unwrap();
                        Some(document(&format!("render {renders}")))
                    },
                    |rendered| written.push(rendered.document),
                );
                written
            });

            jobs_tx.send(generations.begin()).unwrap();
            started_rx.recv().unwrap();

            // The first render is still running when the next change lands.
            jobs_tx.send(generations.begin()).unwrap();
            resume_tx.send(()).unwrap();

            started_rx.recv().unwrap();
            resume_tx.send(()).unwrap();
            drop(jobs_tx);

            worker.join().unwrap()
        });

        assert_eq!(written, vec!["render 2".to_owned()]);
    }

    #[test]
    fn test_ensure_project_dir_writes_gitignore_once() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join(".docweave");

        ensure_project_dir(&project_dir).unwrap();
        let gitignore = project_dir.join(".gitignore");
        assert_eq!(
            fs::read_to_string(&gitignore).unwrap(),
            "# Automatically created by docweave\n*\n"
        );

        fs::write(&gitignore, "custom\n").unwrap();
        ensure_project_dir(&project_dir).unwrap();
        assert_eq!(fs::read_to_string(&gitignore).unwrap(), "custom\n");
    }
}
