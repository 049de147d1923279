//! Error types for the runner module.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The manifest file does not exist at the expected path.
    #[error("no {manifest_name} found in {directory}")]
    #[diagnostic(
        code(bffgen::runner::manifest_not_found),
        help("pass the manifest with `-f <FILE>` or change directory with `-C <DIR>`")
    )]
    ManifestNotFound {
        /// Name of the expected manifest file, such as `bffgen.yml`.
        manifest_name: String,
        /// Directory description, such as "the current directory".
        directory: String,
        /// The path that was attempted.
        path: Utf8PathBuf,
    },
    /// A path given on the command line is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    #[diagnostic(code(bffgen::runner::non_utf8_path))]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
}
