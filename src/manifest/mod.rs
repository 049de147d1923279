//! Manifest loading helpers.
//!
//! This module reads a `bffgen.yml` project manifest and parses it into a
//! [`ProjectManifest`]. Parse failures are mapped to [`miette`] diagnostics
//! pointing at the offending location; the format version is checked before
//! the manifest is handed on.

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use semver::Version;
use serde::de::IgnoredAny;
use std::fs;
use thiserror::Error;
use tracing::debug;

use crate::ast::ProjectManifest;

mod diagnostics;

pub use diagnostics::{ManifestName, map_yaml_error};

/// Manifest format major version understood by this generator.
pub const SUPPORTED_MAJOR: u64 = 1;

/// Errors raised while loading a manifest.
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}")]
    #[diagnostic(code(bffgen::manifest::read))]
    Read {
        /// Path that was attempted.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The manifest is not valid YAML or does not match the schema.
    #[error("failed to parse manifest {name}")]
    #[diagnostic(code(bffgen::manifest::parse))]
    Parse {
        /// Manifest label.
        name: ManifestName,
        /// Underlying diagnostic reported by the parser.
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync + 'static>,
    },
    /// The manifest declares a format version this generator cannot read.
    #[error("unsupported bffgen_version {found}")]
    #[diagnostic(
        code(bffgen::manifest::version),
        help("this generator reads manifests with bffgen_version 1.x")
    )]
    UnsupportedVersion {
        /// Declared version.
        found: Version,
    },
}

fn from_str_named(yaml: &str, name: &ManifestName) -> Result<ProjectManifest, ManifestError> {
    let parse_error = |e| ManifestError::Parse {
        name: name.clone(),
        source: map_yaml_error(e, yaml, name),
    };
    // Syntax errors first, so they are not masked by schema errors raised
    // part way through the document.
    serde_saphyr::from_str::<IgnoredAny>(yaml).map_err(parse_error)?;
    let manifest: ProjectManifest = serde_saphyr::from_str(yaml).map_err(parse_error)?;
    if manifest.bffgen_version.major != SUPPORTED_MAJOR {
        return Err(ManifestError::UnsupportedVersion {
            found: manifest.bffgen_version,
        });
    }
    debug!(
        manifest = %name,
        targets = manifest.targets.len(),
        commands = manifest.commands.len(),
        "parsed manifest",
    );
    Ok(manifest)
}

/// Parse a manifest from a string.
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] if the YAML is malformed or does not
/// match the schema, and [`ManifestError::UnsupportedVersion`] for a
/// manifest written for another major version.
///
/// ```
/// let manifest = bffgen::manifest::from_str("bffgen_version: \"1.2.0\"\n")?;
/// assert!(manifest.targets.is_empty());
/// # Ok::<(), bffgen::manifest::ManifestError>(())
/// ```
pub fn from_str(yaml: &str) -> Result<ProjectManifest, ManifestError> {
    from_str_named(yaml, &ManifestName::new("bffgen.yml"))
}

/// Load a [`ProjectManifest`] from the given file path.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] if the file cannot be read, otherwise the
/// errors of [`from_str`].
pub fn from_path(path: &Utf8Path) -> Result<ProjectManifest, ManifestError> {
    let data = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_owned(),
        source,
    })?;
    from_str_named(&data, &ManifestName::new(path.as_str()))
}
