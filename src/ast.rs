//! bffgen manifest Abstract Syntax Tree structures.
//!
//! This module defines the data structures used to represent a parsed
//! project manifest (`bffgen.yml`). They mirror the YAML schema one to one
//! and are deserialised with `serde_saphyr`; validation and conversion into
//! graph nodes happen in [`crate::project`].
//!
//! ```rust
//! use bffgen::ast::ProjectManifest;
//!
//! let yaml = "bffgen_version: \"1.0.0\"\ncommands:\n  - name: gen\n    command: gen a.h\n    outputs: a.h\n";
//! let manifest: ProjectManifest = serde_saphyr::from_str(yaml).expect("parse");
//! assert_eq!(manifest.commands.len(), 1);
//! assert_eq!(manifest.configurations, ["Debug", "Release", "MinSizeRel", "RelWithDebInfo"]);
//! ```

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Cache directory used when the manifest does not set one.
pub const DEFAULT_CACHE_PATH: &str = ".fbuild.cache";
/// Shell used to run multi-line commands when the manifest does not set one.
pub const DEFAULT_SHELL: &str = "/bin/sh";

fn default_configurations() -> Vec<String> {
    ["Debug", "Release", "MinSizeRel", "RelWithDebInfo"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_path() -> String {
    DEFAULT_CACHE_PATH.to_owned()
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_owned()
}

/// Top-level manifest structure parsed from `bffgen.yml`.
///
/// ```yaml
/// bffgen_version: "1.0.0"
/// configurations: [Debug, Release]
/// targets:
///   - name: app
///     commands: gen
/// commands:
///   - name: gen
///     command: gen -o include/version.h
///     outputs: include/version.h
/// ```
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectManifest {
    /// Semantic version of the manifest format.
    pub bffgen_version: Version,

    /// Build configurations, in emission order.
    #[serde(default = "default_configurations")]
    pub configurations: Vec<String>,

    /// Global generator settings.
    #[serde(default)]
    pub settings: SettingsDecl,

    /// Declared targets.
    #[serde(default)]
    pub targets: Vec<TargetDecl>,

    /// Declared custom commands.
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
}

/// Settings that apply to the whole generated build.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SettingsDecl {
    /// Directory FASTBuild uses for its object cache.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    /// Shell that runs commands made of several lines.
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for SettingsDecl {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            shell: default_shell(),
        }
    }
}

/// A target grouping commands and other targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDecl {
    /// Unique target name.
    pub name: String,
    /// Targets that must be built first.
    #[serde(default)]
    pub depends: StringOrList,
    /// Names of the commands this target runs.
    #[serde(default)]
    pub commands: StringOrList,
    /// Prebuilt artefact; never emitted and never configuration dependent.
    #[serde(default)]
    pub imported: bool,
    /// Leave the target out of the per-configuration aliases.
    #[serde(default)]
    pub exclude_from_all: bool,
}

/// A custom command.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommandDecl {
    /// Unique command name.
    pub name: String,
    /// One command line, or several run in sequence.
    pub command: StringOrList,
    /// Directory the command runs in.
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Files or outputs consumed by the command.
    #[serde(default)]
    pub inputs: StringOrList,
    /// Primary files produced by the command.
    #[serde(default)]
    pub outputs: StringOrList,
    /// Secondary files produced by the command.
    #[serde(default)]
    pub byproducts: StringOrList,
    /// Outputs that never exist on disk.
    #[serde(default)]
    pub symbolic_outputs: StringOrList,
    /// Targets that must be built before the command runs.
    #[serde(default)]
    pub depends: StringOrList,
    /// Per-configuration overrides keyed by configuration name.
    #[serde(default)]
    pub configs: IndexMap<String, ConfigOverrideDecl>,
}

/// Replacement values for one configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrideDecl {
    /// Replacement command lines.
    #[serde(default)]
    pub command: Option<StringOrList>,
    /// Replacement working directory.
    #[serde(default)]
    pub working_directory: Option<String>,
}

/// A helper for fields that accept either a single string or a list of
/// strings.
///
/// It mirrors YAML syntax where a scalar or sequence is allowed. Empty values
/// deserialize to `StringOrList::Empty`.
///
/// ```yaml
/// # Scalar
/// outputs: a.h
/// # Sequence
/// outputs:
///   - a.h
///   - b.h
/// ```
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum StringOrList {
    /// No value provided.
    #[default]
    Empty,
    /// A single string item.
    String(String),
    /// A list of string items.
    List(Vec<String>),
}

impl StringOrList {
    /// Flatten into a list.
    ///
    /// ```
    /// use bffgen::ast::StringOrList;
    ///
    /// assert_eq!(StringOrList::String("a".into()).to_vec(), ["a"]);
    /// assert!(StringOrList::Empty.to_vec().is_empty());
    /// ```
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Empty => Vec::new(),
            Self::String(s) => vec![s.clone()],
            Self::List(list) => list.clone(),
        }
    }
}
