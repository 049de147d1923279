//! Configuration variance classification for command nodes.
//!
//! A command is [`ClassificationResult::Common`] when it behaves identically
//! in every configuration and can therefore be emitted once for all of them.
//! Anything else is [`ClassificationResult::ConfigDependent`] and gets one
//! definition per configuration. The rules are checked in order and the
//! first match wins:
//!
//! 1. a raw input, output or working directory contains [`CONFIG_PLACEHOLDER`];
//! 2. the command references a non-imported target, either by naming it as a
//!    word of a command line or through `depends`, or it consumes an output
//!    of a command already classified as configuration dependent;
//! 3. the materializations differ between configurations;
//! 4. otherwise the command is common.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::debug;

use crate::graph::{CommandNode, GraphNode};

/// Token replaced by the configuration name during materialization.
pub const CONFIG_PLACEHOLDER: &str = "$<CONFIG>";

/// A command declaration expanded for one configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    /// Command lines to run, in order.
    pub command_lines: Vec<String>,
    /// Directory the commands run in.
    pub working_directory: Option<String>,
    /// Consumed files and outputs.
    pub inputs: Vec<String>,
    /// Primary file outputs.
    pub file_outputs: Vec<String>,
    /// Secondary file outputs.
    pub byproducts: Vec<String>,
    /// Outputs with no backing file.
    pub symbolic_outputs: Vec<String>,
}

impl Materialized {
    /// Every file the command writes: outputs followed by byproducts.
    pub fn files(&self) -> impl Iterator<Item = &String> + Clone {
        self.file_outputs.iter().chain(&self.byproducts)
    }

    /// Every output the command produces: files, then symbolic outputs.
    pub fn outputs(&self) -> impl Iterator<Item = &String> + Clone {
        self.files().chain(&self.symbolic_outputs)
    }
}

/// Expand `command` for `configuration`.
///
/// Per-configuration overrides replace the base command lines and working
/// directory first; every occurrence of [`CONFIG_PLACEHOLDER`] is then
/// replaced with the configuration name.
///
/// ```
/// use bffgen::graph::CommandNode;
/// use bffgen::variance::materialize;
///
/// let cmd = CommandNode::new("gen", vec!["gen -o out/$<CONFIG>/a.h".into()]);
/// let release = materialize(&cmd, "Release");
/// assert_eq!(release.command_lines, ["gen -o out/Release/a.h"]);
/// ```
#[must_use]
pub fn materialize(command: &CommandNode, configuration: &str) -> Materialized {
    let expand = |value: &str| value.replace(CONFIG_PLACEHOLDER, configuration);
    let expand_all = |values: &[String]| values.iter().map(|v| expand(v.as_str())).collect::<Vec<_>>();
    let over = command.override_for(configuration);
    let lines = over
        .and_then(|o| o.command_lines.as_deref())
        .unwrap_or_else(|| command.command_lines());
    let working_directory = over
        .and_then(|o| o.working_directory.as_deref())
        .or_else(|| command.working_directory());
    Materialized {
        command_lines: expand_all(lines),
        working_directory: working_directory.map(expand),
        inputs: expand_all(command.raw_inputs()),
        file_outputs: expand_all(command.file_outputs()),
        byproducts: expand_all(command.byproducts()),
        symbolic_outputs: expand_all(command.symbolic_outputs()),
    }
}

/// Per-pass cache of materializations keyed by `(command, configuration)`.
#[derive(Debug, Default)]
pub struct MaterializationCache {
    entries: HashMap<(String, String), Materialized>,
}

impl MaterializationCache {
    /// Return the cached materialization, computing it on first use.
    pub fn get_or_materialize(&mut self, command: &CommandNode, configuration: &str) -> &Materialized {
        self.entries
            .entry((command.name().to_owned(), configuration.to_owned()))
            .or_insert_with(|| materialize(command, configuration))
    }

    /// Number of cached materializations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been materialized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a command varies across configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationResult {
    /// Identical in every configuration.
    Common,
    /// Needs one definition per configuration.
    ConfigDependent,
}

impl ClassificationResult {
    /// Whether the command needs one definition per configuration.
    #[must_use]
    pub const fn is_dependent(self) -> bool {
        matches!(self, Self::ConfigDependent)
    }
}

impl Display for ClassificationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Common => "common",
            Self::ConfigDependent => "config-dependent",
        })
    }
}

/// Materialized field compared across configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Command lines.
    CommandLines,
    /// Working directory.
    WorkingDirectory,
    /// Inputs.
    Inputs,
    /// File outputs.
    FileOutputs,
    /// Symbolic outputs.
    SymbolicOutputs,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CommandLines => "command lines",
            Self::WorkingDirectory => "working directory",
            Self::Inputs => "inputs",
            Self::FileOutputs => "file outputs",
            Self::SymbolicOutputs => "symbolic outputs",
        })
    }
}

/// The rule that decided a classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// No rule fired; the command is the same everywhere.
    Invariant,
    /// A raw field contains the configuration placeholder.
    PlaceholderToken,
    /// The command references a non-imported target.
    TargetReference {
        /// The referenced target.
        target: String,
    },
    /// The command consumes an output of a configuration dependent command.
    DependentInput {
        /// The consumed output.
        input: String,
    },
    /// A materialized field differs from the first configuration.
    MaterializedMismatch {
        /// First configuration that differs.
        configuration: String,
        /// First field that differs.
        field: Field,
    },
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invariant => f.write_str("identical in every configuration"),
            Self::PlaceholderToken => write!(f, "uses {CONFIG_PLACEHOLDER}"),
            Self::TargetReference { target } => write!(f, "references target '{target}'"),
            Self::DependentInput { input } => {
                write!(f, "consumes configuration dependent output '{input}'")
            }
            Self::MaterializedMismatch {
                configuration,
                field,
            } => write!(f, "{configuration} changes the {field}"),
        }
    }
}

/// Outcome of classifying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The classification.
    pub result: ClassificationResult,
    /// The rule that produced it.
    pub reason: Reason,
    /// Materializations per configuration, in configuration order.
    pub materializations: IndexMap<String, Materialized>,
}

/// Classifies commands against a fixed configuration list.
///
/// One classifier lives for one generation pass. Classifications are
/// attached once; classifying the same command again returns the recorded
/// result.
#[derive(Debug)]
pub struct ConfigVarianceClassifier {
    configurations: Vec<String>,
    targets: HashSet<String>,
    dependent_outputs: HashSet<String>,
    cache: MaterializationCache,
    results: IndexMap<String, Classification>,
}

impl ConfigVarianceClassifier {
    /// Create a classifier for `configurations`. `targets` lists the names of
    /// non-imported targets that command lines may reference.
    #[must_use]
    pub fn new<I, S>(configurations: Vec<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            configurations,
            targets: targets.into_iter().map(Into::into).collect(),
            dependent_outputs: HashSet::new(),
            cache: MaterializationCache::default(),
            results: IndexMap::new(),
        }
    }

    /// Classify `command`, reusing a previous result for the same name.
    pub fn classify(&mut self, command: &CommandNode) -> ClassificationResult {
        self.classify_detailed(command).result
    }

    /// Classify `command` and return the full record, including the
    /// materialization of every configuration.
    pub fn classify_detailed(&mut self, command: &CommandNode) -> &Classification {
        match self.results.entry(command.name().to_owned()) {
            Entry::Occupied(done) => done.into_mut(),
            Entry::Vacant(slot) => {
                let mut materializations = IndexMap::new();
                for configuration in &self.configurations {
                    let m = self.cache.get_or_materialize(command, configuration);
                    materializations.insert(configuration.clone(), m.clone());
                }
                let rules = Rules {
                    configurations: &self.configurations,
                    targets: &self.targets,
                    dependent_outputs: &self.dependent_outputs,
                };
                let (result, reason) = match rules.first_match(command, &materializations) {
                    Some(reason) => (ClassificationResult::ConfigDependent, reason),
                    None => (ClassificationResult::Common, Reason::Invariant),
                };
                debug!(
                    command = command.name(),
                    result = %result,
                    reason = %reason,
                    "classified command",
                );
                if result.is_dependent() {
                    record_dependent_outputs(&mut self.dependent_outputs, command, &materializations);
                }
                slot.insert(Classification {
                    result,
                    reason,
                    materializations,
                })
            }
        }
    }

    /// The recorded classification of `command`, if it has been classified.
    #[must_use]
    pub fn classification(&self, command: &str) -> Option<&Classification> {
        self.results.get(command)
    }

    /// The materialization cache shared by this pass.
    #[must_use]
    pub const fn cache(&self) -> &MaterializationCache {
        &self.cache
    }

    /// Consume the classifier, returning every classification in the order
    /// the commands were classified.
    #[must_use]
    pub fn into_classifications(self) -> IndexMap<String, Classification> {
        self.results
    }
}

struct Rules<'a> {
    configurations: &'a [String],
    targets: &'a HashSet<String>,
    dependent_outputs: &'a HashSet<String>,
}

impl Rules<'_> {
    fn first_match(
        &self,
        command: &CommandNode,
        materializations: &IndexMap<String, Materialized>,
    ) -> Option<Reason> {
        if self.configurations.is_empty() {
            return None;
        }
        if has_placeholder(command) {
            return Some(Reason::PlaceholderToken);
        }
        if let Some(target) = self.referenced_target(command) {
            return Some(Reason::TargetReference {
                target: target.to_owned(),
            });
        }
        if let Some(input) = self.dependent_input(command, materializations) {
            return Some(Reason::DependentInput {
                input: input.to_owned(),
            });
        }
        first_mismatch(materializations)
    }

    fn referenced_target<'c>(&self, command: &'c CommandNode) -> Option<&'c str> {
        let overridden = command
            .overrides()
            .values()
            .filter_map(|o| o.command_lines.as_deref())
            .flatten();
        let word = command
            .command_lines()
            .iter()
            .chain(overridden)
            .flat_map(|line| line.split_whitespace())
            .find(|word| self.targets.contains(*word));
        word.or_else(|| {
            command
                .depends()
                .iter()
                .map(String::as_str)
                .find(|dep| self.targets.contains(*dep))
        })
    }

    fn dependent_input<'m>(
        &self,
        command: &'m CommandNode,
        materializations: &'m IndexMap<String, Materialized>,
    ) -> Option<&'m str> {
        command
            .raw_inputs()
            .iter()
            .chain(materializations.values().flat_map(|m| &m.inputs))
            .map(String::as_str)
            .find(|input| self.dependent_outputs.contains(*input))
    }
}

fn record_dependent_outputs(
    outputs: &mut HashSet<String>,
    command: &CommandNode,
    materializations: &IndexMap<String, Materialized>,
) {
    let raw = command.outputs().iter().map(|out| out.path.clone());
    let materialized = materializations
        .values()
        .flat_map(|m| m.files().chain(&m.symbolic_outputs).cloned());
    outputs.extend(raw.chain(materialized));
}

fn has_placeholder(command: &CommandNode) -> bool {
    let contains = |value: &String| value.contains(CONFIG_PLACEHOLDER);
    command.raw_inputs().iter().any(contains)
        || command.file_outputs().iter().any(contains)
        || command.byproducts().iter().any(contains)
        || command.symbolic_outputs().iter().any(contains)
        || command
            .working_directory()
            .is_some_and(|dir| dir.contains(CONFIG_PLACEHOLDER))
        || command
            .overrides()
            .values()
            .filter_map(|o| o.working_directory.as_ref())
            .any(contains)
}

fn first_mismatch(materializations: &IndexMap<String, Materialized>) -> Option<Reason> {
    let mut iter = materializations.iter();
    let (_, first) = iter.next()?;
    iter.find_map(|(configuration, other)| {
        let field = if other.command_lines != first.command_lines {
            Field::CommandLines
        } else if other.working_directory != first.working_directory {
            Field::WorkingDirectory
        } else if other.inputs != first.inputs {
            Field::Inputs
        } else if other.file_outputs != first.file_outputs {
            Field::FileOutputs
        } else if other.symbolic_outputs != first.symbolic_outputs {
            Field::SymbolicOutputs
        } else {
            return None;
        };
        Some(Reason::MaterializedMismatch {
            configuration: configuration.clone(),
            field,
        })
    })
}
