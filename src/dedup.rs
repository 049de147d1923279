//! Define-versus-alias decisions for emitted command nodes.
//!
//! Every materialized command passes through [`AliasRegistry::register`]
//! before it is written. The registry remembers the first name emitted for
//! each `(command identity, primary output)` pair and hands that name back to
//! later registrations, so the build description never defines the same work
//! twice. It also keeps a per-configuration ledger of claimed outputs, keyed
//! by the command identity that produces them: two distinct commands writing
//! the same output in one configuration is a hard error. Every node name
//! written to the file set is reserved here too, since FASTBuild rejects a
//! second `Exec` or `Alias` under a name already in use.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::variance::{ClassificationResult, Materialized};

/// Two different definitions produce the same file in one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("output '{output}' is produced by both '{existing}' and '{candidate}' in {configuration}")]
#[diagnostic(
    code(bffgen::dedup::duplicate_output),
    help("give each command its own output, or make the commands identical so one aliases the other")
)]
pub struct DuplicateOutputError {
    /// The contested output path.
    pub output: String,
    /// Configuration in which both definitions are active.
    pub configuration: String,
    /// Name that claimed the output first.
    pub existing: String,
    /// Name that tried to claim it again.
    pub candidate: String,
}

/// Two nodes of the file set were given the same name.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("node name '{name}' is used by both {existing} and {candidate}")]
#[diagnostic(
    code(bffgen::dedup::duplicate_name),
    help("rename one of the targets or commands; names are joined with '-'")
)]
pub struct DuplicateNameError {
    /// The contested node name.
    pub name: String,
    /// What reserved the name first.
    pub existing: String,
    /// What tried to reserve it again.
    pub candidate: String,
}

/// Outcome of registering a materialized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First occurrence: emit a definition under this name.
    DefineNew(String),
    /// Already defined under this name; refer to it instead.
    AliasTo(String),
    /// Already defined by this origin under this very name.
    Skip,
}

impl Registration {
    /// The name the registration resolves to, given the candidate submitted.
    #[must_use]
    pub fn resolved<'a>(&'a self, candidate: &'a str) -> &'a str {
        match self {
            Self::DefineNew(name) | Self::AliasTo(name) => name,
            Self::Skip => candidate,
        }
    }
}

impl Display for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefineNew(name) => write!(f, "define {name}"),
            Self::AliasTo(name) => write!(f, "alias {name}"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// The output that distinguishes one materialization of a command from
/// another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryOutputKey(String);

impl PrimaryOutputKey {
    /// Pick the key for `materialized`: the first file output when there is
    /// one, otherwise the first symbolic output. Symbolic keys of
    /// configuration dependent commands carry the configuration name, since
    /// nothing else would tell them apart.
    ///
    /// Returns `None` when the command has no output at all.
    #[must_use]
    pub fn resolve(
        materialized: &Materialized,
        classification: ClassificationResult,
        configuration: &str,
    ) -> Option<Self> {
        if let Some(file) = materialized.file_outputs.first() {
            return Some(Self(file.clone()));
        }
        let symbolic = materialized.symbolic_outputs.first()?;
        Some(Self(match classification {
            ClassificationResult::Common => symbolic.clone(),
            ClassificationResult::ConfigDependent => format!("{symbolic}-{configuration}"),
        }))
    }

    /// The key as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
struct Canonical {
    name: String,
    origin: String,
}

#[derive(Debug, PartialEq, Eq)]
struct Claim {
    identity: String,
    owner: String,
}

/// Registry of emitted definitions, claimed outputs and reserved node names
/// for one pass.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: HashMap<(String, PrimaryOutputKey), Canonical>,
    ledger: HashMap<(String, String), Claim>,
    names: HashMap<String, String>,
}

impl AliasRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `candidate` must be defined or can refer to an
    /// existing definition.
    ///
    /// ```
    /// use bffgen::dedup::{AliasRegistry, PrimaryOutputKey, Registration};
    /// use bffgen::variance::{ClassificationResult, Materialized};
    ///
    /// let m = Materialized { file_outputs: vec!["gen.h".into()], ..Materialized::default() };
    /// let key = PrimaryOutputKey::resolve(&m, ClassificationResult::Common, "Debug").expect("key");
    /// let mut registry = AliasRegistry::new();
    /// assert_eq!(registry.register("id", &key, "app-gen", "app"), Registration::DefineNew("app-gen".into()));
    /// assert_eq!(registry.register("id", &key, "lib-gen", "lib"), Registration::AliasTo("app-gen".into()));
    /// assert_eq!(registry.register("id", &key, "app-gen", "app"), Registration::Skip);
    /// ```
    pub fn register(
        &mut self,
        identity: &str,
        key: &PrimaryOutputKey,
        candidate: &str,
        origin: &str,
    ) -> Registration {
        let slot = (identity.to_owned(), key.clone());
        let decision = match self.aliases.get(&slot) {
            None => {
                self.aliases.insert(
                    slot,
                    Canonical {
                        name: candidate.to_owned(),
                        origin: origin.to_owned(),
                    },
                );
                Registration::DefineNew(candidate.to_owned())
            }
            Some(existing) if existing.origin == origin && existing.name == candidate => {
                Registration::Skip
            }
            Some(existing) => Registration::AliasTo(existing.name.clone()),
        };
        debug!(
            candidate,
            origin,
            key = key.as_str(),
            decision = %decision,
            "registered command",
        );
        decision
    }

    /// Record the command `identity`, emitted as `owner`, as the producer of
    /// `outputs` in every configuration of `configurations`.
    ///
    /// Claiming an output again with the same identity and owner is a no-op,
    /// which lets a configuration that aliases an existing definition claim
    /// that definition's outputs for itself.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateOutputError`] when another command, or the same
    /// command under another name, has already claimed one of the outputs in
    /// one of the configurations.
    pub fn claim_outputs<'a, C, O>(
        &mut self,
        configurations: C,
        outputs: O,
        identity: &str,
        owner: &str,
    ) -> Result<(), DuplicateOutputError>
    where
        C: IntoIterator<Item = &'a String>,
        O: IntoIterator<Item = &'a String> + Clone,
    {
        for configuration in configurations {
            for output in outputs.clone() {
                let slot = (configuration.clone(), output.clone());
                match self.ledger.get(&slot) {
                    Some(existing) if existing.identity != identity || existing.owner != owner => {
                        return Err(DuplicateOutputError {
                            output: output.clone(),
                            configuration: configuration.clone(),
                            existing: existing.owner.clone(),
                            candidate: owner.to_owned(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        self.ledger.insert(
                            slot,
                            Claim {
                                identity: identity.to_owned(),
                                owner: owner.to_owned(),
                            },
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// The name that claimed `output` in `configuration`, if any.
    #[must_use]
    pub fn owner(&self, configuration: &str, output: &str) -> Option<&str> {
        self.ledger
            .get(&(configuration.to_owned(), output.to_owned()))
            .map(|claim| claim.owner.as_str())
    }

    /// Reserve `name` for the node described by `what`.
    ///
    /// ```
    /// use bffgen::dedup::AliasRegistry;
    ///
    /// let mut registry = AliasRegistry::new();
    /// registry.reserve_name("a-b-c", "command 'c' of target 'a-b'")?;
    /// let err = registry
    ///     .reserve_name("a-b-c", "command 'b-c' of target 'a'")
    ///     .expect_err("taken");
    /// assert_eq!(err.existing, "command 'c' of target 'a-b'");
    /// # Ok::<(), bffgen::dedup::DuplicateNameError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateNameError`] when the name is already reserved.
    pub fn reserve_name(&mut self, name: &str, what: &str) -> Result<(), DuplicateNameError> {
        if let Some(existing) = self.names.get(name) {
            return Err(DuplicateNameError {
                name: name.to_owned(),
                existing: existing.clone(),
                candidate: what.to_owned(),
            });
        }
        self.names.insert(name.to_owned(), what.to_owned());
        Ok(())
    }

    /// Number of distinct definitions registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
