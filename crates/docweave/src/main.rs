//! docweave CLI - Document composition and diagram rendering.
//!
//! Provides commands for:
//! - `compose`: Expand `include::` directives and print the result
//! - `render`: Compose a document and render its diagrams via Kroki

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ComposeArgs, RenderArgs};
use output::Output;

/// docweave - Document composition and diagram rendering.
#[derive(Parser)]
#[command(name = "docweave", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand include directives and print the composed document.
    Compose(ComposeArgs),
    /// Compose a document and replace its diagrams with rendered images.
    Render(RenderArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Render(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Compose(args) => args.execute(),
        Commands::Render(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
