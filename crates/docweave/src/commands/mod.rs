//! CLI command implementations.

pub(crate) mod compose;
pub(crate) mod render;

use std::io::{self, Write};
use std::path::{Component, Path};

pub(crate) use compose::ComposeArgs;
pub(crate) use render::RenderArgs;

use crate::error::CliError;

/// Convert a file given on the command line into a store path.
///
/// The file may be relative to the current directory or absolute, but it
/// must live below `source_dir`.
pub(crate) fn store_path_for(source_dir: &Path, file: &Path) -> Result<String, CliError> {
    let source_dir = source_dir.canonicalize()?;
    let file = file.canonicalize()?;

    let relative = file.strip_prefix(&source_dir).map_err(|_| {
        CliError::Validation(format!(
            "{} is outside the source directory {}",
            file.display(),
            source_dir.display()
        ))
    })?;

    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(CliError::Validation(format!(
            "{} is not a document",
            file.display()
        )));
    }
    Ok(parts.join("/"))
}

/// Write a document to stdout.
pub(crate) fn write_stdout(text: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
