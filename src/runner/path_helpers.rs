//! Path resolution helpers for the runner module.
//!
//! Centralises manifest and output path logic so the main runner module stays
//! focused on command dispatch.

use crate::cli::Cli;
use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::path::Path;

use super::RunnerError;

fn to_utf8(path: &Path) -> Result<Utf8PathBuf, RunnerError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| RunnerError::NonUtf8Path {
        path: p.display().to_string(),
    })
}

/// Determine the manifest path respecting the CLI's directory option.
///
/// # Errors
///
/// Returns an error when the CLI `file` or `directory` paths are not valid
/// UTF-8, or when the resolved path has no file name.
pub(super) fn resolve_manifest_path(cli: &Cli) -> Result<Utf8PathBuf> {
    let file = to_utf8(&cli.file)?;
    let resolved = match &cli.directory {
        Some(dir) => to_utf8(dir)?.join(&file),
        None => file,
    };
    if resolved.file_name().is_none() {
        return Err(anyhow!("manifest path {resolved} has no file name"));
    }
    Ok(resolved)
}

/// Resolve an output path relative to the CLI working directory.
///
/// The `-C/--directory` option behaves like a working directory change for
/// any filesystem path supplied on the command line. When `path` is relative
/// and a directory has been configured, the returned path is
/// `directory/path`.
///
/// # Errors
///
/// Returns an error when a path is not valid UTF-8.
pub(super) fn resolve_output_path(cli: &Cli, path: Option<&Path>) -> Result<Utf8PathBuf> {
    let base = cli
        .directory
        .as_deref()
        .map(to_utf8)
        .transpose()?
        .unwrap_or_default();
    let Some(raw) = path else {
        return Ok(base);
    };
    let requested = to_utf8(raw)?;
    Ok(if requested.is_relative() {
        base.join(requested)
    } else {
        requested
    })
}

pub(super) fn ensure_manifest_exists_or_error(
    cli: &Cli,
    manifest_path: &Utf8Path,
) -> Result<(), RunnerError> {
    if manifest_path.as_std_path().exists() {
        return Ok(());
    }
    let manifest_name = manifest_path
        .file_name()
        .unwrap_or(manifest_path.as_str())
        .to_owned();
    let directory = if cli.directory.is_some() {
        let parent = manifest_path.parent().map_or(manifest_path.as_str(), Utf8Path::as_str);
        format!("directory {parent}")
    } else {
        "the current directory".to_owned()
    };
    Err(RunnerError::ManifestNotFound {
        manifest_name,
        directory,
        path: manifest_path.to_owned(),
    })
}
