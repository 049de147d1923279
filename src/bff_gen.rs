//! FASTBuild file set generator.
//!
//! One call to [`generate`] is one generation pass: the project's nodes are
//! sorted, every command is classified and deduplicated, and the result is
//! written as a set of `.bff` files.
//!
//! - `base.bff` holds the settings, the `ConfigBase` struct and every command
//!   that behaves the same in all configurations;
//! - `<Config>.bff` holds the configuration dependent commands and the
//!   per-target aliases of that configuration;
//! - `fbuild.bff` includes every configuration file and defines the
//!   cross-configuration aliases.
//!
//! All state of a pass lives in a private `GenerationContext` that is dropped
//! when the pass ends.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};

use camino::Utf8Path;
use indexmap::IndexMap;
use itertools::Itertools;
use miette::Diagnostic;
use shell_quote::{QuoteRefExt, Sh};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bff::escape::{quote, wrap};
use crate::bff::{BffWriter, EmitError, Op};
use crate::dedup::{
    AliasRegistry, DuplicateNameError, DuplicateOutputError, PrimaryOutputKey, Registration,
};
use crate::graph::{CommandNode, CycleError, GraphNode, Node, TargetNode, UnresolvedReference, sort};
use crate::hasher::CommandHasher;
use crate::project::Project;
use crate::variance::{Classification, ClassificationResult, ConfigVarianceClassifier, Materialized};

/// Root file handed to FASTBuild.
pub const MAIN_FILE: &str = "fbuild.bff";
/// File holding everything shared by all configurations.
pub const BASE_FILE: &str = "base.bff";
/// Name of the generated rule that re-runs the generator.
pub const REGENERATE_TARGET: &str = "rebuild-bff";

/// File name of the description for `configuration`.
///
/// ```
/// assert_eq!(bffgen::bff_gen::config_file_name("Debug"), "Debug.bff");
/// ```
#[must_use]
pub fn config_file_name(configuration: &str) -> String {
    format!("{configuration}.bff")
}

/// Errors raised by a generation pass.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerateError {
    /// The node graph contains a cycle.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cycle(#[from] CycleError),
    /// Two definitions write the same file in one configuration.
    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateOutput(#[from] DuplicateOutputError),
    /// Two nodes of the file set share a name.
    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateName(#[from] DuplicateNameError),
    /// Writing a file failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Emit(#[from] EmitError),
    /// A command line could not be split into words.
    #[error("command '{command}' has a malformed command line: {line}")]
    #[diagnostic(
        code(bffgen::generate::invalid_command),
        help("check the line for unbalanced quotes")
    )]
    InvalidCommand {
        /// The command.
        command: String,
        /// The offending line.
        line: String,
    },
    /// No writer exists for a configuration.
    #[error("no output file for configuration '{configuration}'")]
    #[diagnostic(code(bffgen::generate::missing_config_file))]
    MissingConfigFile {
        /// The configuration.
        configuration: String,
    },
}

/// The writers of one generated file set.
pub struct BffFiles<W: Write> {
    base: BffWriter<W>,
    configs: IndexMap<String, BffWriter<W>>,
    main: BffWriter<W>,
}

impl BffFiles<BufWriter<File>> {
    /// Writers creating their files under `dir` on first write.
    #[must_use]
    pub fn in_dir(dir: &Utf8Path, configurations: &[String]) -> Self {
        let open = |name: &str| {
            let path = dir.join(name);
            BffWriter::lazy(move || File::create(&path).map(BufWriter::new))
        };
        Self {
            base: open(BASE_FILE),
            configs: configurations
                .iter()
                .map(|c| (c.clone(), open(&config_file_name(c))))
                .collect(),
            main: open(MAIN_FILE),
        }
    }
}

impl BffFiles<Vec<u8>> {
    /// Writers collecting every file in memory.
    #[must_use]
    pub fn in_memory(configurations: &[String]) -> Self {
        Self {
            base: BffWriter::in_memory(),
            configs: configurations
                .iter()
                .map(|c| (c.clone(), BffWriter::in_memory()))
                .collect(),
            main: BffWriter::in_memory(),
        }
    }
}

impl<W: Write> BffFiles<W> {
    fn config_mut(&mut self, configuration: &str) -> Result<&mut BffWriter<W>, GenerateError> {
        self.configs
            .get_mut(configuration)
            .ok_or_else(|| GenerateError::MissingConfigFile {
                configuration: configuration.to_owned(),
            })
    }

    /// Close every writer and return the written sinks keyed by file name:
    /// `base.bff`, then one file per configuration, then `fbuild.bff`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] when a writer still has open scopes or fails to
    /// flush.
    pub fn finish(self) -> Result<IndexMap<String, W>, EmitError> {
        let mut written = IndexMap::new();
        if let Some(sink) = self.base.finish()? {
            written.insert(BASE_FILE.to_owned(), sink);
        }
        for (configuration, writer) in self.configs {
            if let Some(sink) = writer.finish()? {
                written.insert(config_file_name(&configuration), sink);
            }
        }
        if let Some(sink) = self.main.finish()? {
            written.insert(MAIN_FILE.to_owned(), sink);
        }
        Ok(written)
    }
}

/// A rule in `fbuild.bff` that re-runs the generator when its inputs change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerateRule {
    /// Files whose change triggers regeneration, usually the manifest.
    pub inputs: Vec<String>,
    /// Generator executable.
    pub executable: String,
    /// Arguments passed to the generator.
    pub arguments: String,
}

/// Options for one generation pass.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Emit a regeneration rule into `fbuild.bff`.
    pub regenerate: Option<RegenerateRule>,
}

/// One define, alias or skip decision taken during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Command that was registered.
    pub command: String,
    /// Target hosting the command.
    pub host: String,
    /// Configuration being materialized.
    pub configuration: String,
    /// Outcome.
    pub registration: Registration,
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}: {}",
            self.configuration, self.host, self.command, self.registration
        )
    }
}

/// What one pass decided, for inspection.
#[derive(Debug)]
pub struct GenerationReport {
    /// Node names in emission order.
    pub order: Vec<String>,
    /// Inputs that no node produces.
    pub unresolved: Vec<UnresolvedReference>,
    /// Classification of every emitted command.
    pub classifications: IndexMap<String, Classification>,
    /// Registration outcomes in the order they were taken.
    pub decisions: Vec<Decision>,
}

struct Exec<'a> {
    name: &'a str,
    executable: String,
    arguments: String,
    materialized: &'a Materialized,
    prebuild: Vec<String>,
}

/// One command being registered for one host in one configuration.
#[derive(Clone, Copy)]
struct Registering<'a> {
    command: &'a CommandNode,
    identity: &'a str,
    host: &'a str,
    result: ClassificationResult,
    configuration: &'a str,
    materialized: &'a Materialized,
}

struct GenerationContext<'p> {
    project: &'p Project,
    classifier: ConfigVarianceClassifier,
    registry: AliasRegistry,
    resolved: HashMap<(String, String, String), String>,
    defined_in: HashMap<String, Option<String>>,
    emitted_targets: IndexMap<String, bool>,
    decisions: Vec<Decision>,
}

fn candidate_name(host: &str, command: &str, result: ClassificationResult, configuration: &str) -> String {
    match result {
        ClassificationResult::Common => format!("{host}-{command}"),
        ClassificationResult::ConfigDependent => format!("{host}-{command}-{configuration}"),
    }
}

fn quoted<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|v| quote(v.as_ref())).collect()
}

fn shell_quote(script: &str) -> String {
    let bytes: Vec<u8> = script.quoted(Sh);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Turn materialized command lines into an executable and its arguments.
///
/// A single line is split with POSIX shell rules. Several lines are chained
/// with `&&` and handed to `shell -c`.
fn exec_invocation(
    command: &str,
    lines: &[String],
    shell: &str,
) -> Result<(String, String), GenerateError> {
    let invalid = |line: &str| GenerateError::InvalidCommand {
        command: command.to_owned(),
        line: line.to_owned(),
    };
    if let [line] = lines {
        let words = shlex::split(line).ok_or_else(|| invalid(line))?;
        let (executable, args) = words.split_first().ok_or_else(|| invalid(line))?;
        let arguments =
            shlex::try_join(args.iter().map(String::as_str)).map_err(|_| invalid(line))?;
        return Ok((executable.clone(), arguments));
    }
    let script = lines.join(" && ");
    Ok((shell.to_owned(), format!("-c {}", shell_quote(&script))))
}

fn write_exec<W: Write>(out: &mut BffWriter<W>, exec: &Exec<'_>) -> Result<(), EmitError> {
    let m = exec.materialized;
    out.write_blank_line()?;
    out.write_command("Exec", &quote(exec.name))?;
    out.push_block()?;
    out.write_variable("ExecExecutable", &quote(&exec.executable))?;
    if !exec.arguments.is_empty() {
        out.write_variable("ExecArguments", &quote(&exec.arguments))?;
    }
    if let Some(dir) = &m.working_directory {
        out.write_variable("ExecWorkingDir", &quote(dir))?;
    }
    if !m.inputs.is_empty() {
        out.write_array("ExecInput", &quoted(&m.inputs))?;
    }
    if let Some(output) = m.file_outputs.first().or_else(|| m.symbolic_outputs.first()) {
        out.write_variable("ExecOutput", &quote(output))?;
    }
    if m.file_outputs.is_empty() {
        out.write_bool("ExecAlways", true)?;
    }
    if !exec.prebuild.is_empty() {
        out.write_array("PreBuildDependencies", &quoted(&exec.prebuild))?;
    }
    out.pop_scope()
}

fn write_alias<W: Write, S: AsRef<str>>(
    out: &mut BffWriter<W>,
    name: &str,
    targets: &[S],
) -> Result<(), EmitError> {
    out.write_blank_line()?;
    out.write_command("Alias", &quote(name))?;
    out.push_block()?;
    out.write_array("Targets", &quoted(targets))?;
    out.pop_scope()
}

fn write_base_preamble<W: Write>(out: &mut BffWriter<W>, project: &Project) -> Result<(), EmitError> {
    out.write_section_header("Fastbuild makefile - Generated using bffgen")?;
    out.write_directive("once")?;
    out.write_section_header("Settings")?;
    out.write_command("Settings", "")?;
    out.push_block()?;
    out.write_variable("CachePath", &quote(&project.settings().cache_path))?;
    out.pop_scope()?;
    out.write_section_header("Configurations")?;
    out.write_declaration("ConfigBase", Op::Assign)?;
    out.push_struct()?;
    out.pop_scope()
}

fn write_config_preamble<W: Write>(out: &mut BffWriter<W>, configuration: &str) -> Result<(), EmitError> {
    out.write_section_header(&format!("Fastbuild config for :{configuration}"))?;
    out.write_directive(&format!("include \"{BASE_FILE}\""))?;
    out.write_blank_line()?;
    out.write_declaration(&format!("config_{configuration}"), Op::Assign)?;
    out.push_struct()?;
    out.write_command("Using", ".ConfigBase")?;
    out.pop_scope()
}

fn write_regenerate<W: Write>(out: &mut BffWriter<W>, rule: &RegenerateRule) -> Result<(), EmitError> {
    out.write_section_header("re-run bffgen to update fastbuild configs")?;
    out.write_command("Exec", &quote(REGENERATE_TARGET))?;
    out.push_block()?;
    out.write_array("ExecInput", &quoted(&rule.inputs))?;
    out.write_variable("ExecExecutable", &quote(&rule.executable))?;
    out.write_variable("ExecArguments", &quote(&rule.arguments))?;
    out.write_bool("ExecIsGenerator", true)?;
    out.write_variable("ExecOutput", &quote(MAIN_FILE))?;
    out.pop_scope()
}

impl<'p> GenerationContext<'p> {
    fn new(project: &'p Project) -> Self {
        Self {
            project,
            classifier: ConfigVarianceClassifier::new(
                project.configurations().to_vec(),
                project.live_targets(),
            ),
            registry: AliasRegistry::new(),
            resolved: HashMap::new(),
            defined_in: HashMap::new(),
            emitted_targets: IndexMap::new(),
            decisions: Vec::new(),
        }
    }

    fn live_hosts(&self, command: &str) -> Vec<&'p str> {
        self.project
            .hosts_of(command)
            .into_iter()
            .filter(|h| self.project.target(h).is_some_and(|t| !t.is_imported()))
            .collect()
    }

    fn visit_command<W: Write>(
        &mut self,
        command: &CommandNode,
        files: &mut BffFiles<W>,
    ) -> Result<(), GenerateError> {
        let hosts = self.live_hosts(command.name());
        if hosts.is_empty() {
            warn!(command = command.name(), "command is not hosted by any target; skipping");
            return Ok(());
        }
        let identity = CommandHasher::hash(command);
        let classification = self.classifier.classify_detailed(command).clone();
        let result = classification.result;
        for (configuration, materialized) in &classification.materializations {
            let Some(key) = PrimaryOutputKey::resolve(materialized, result, configuration) else {
                warn!(command = command.name(), "command has no outputs; skipping");
                continue;
            };
            for &host in &hosts {
                let visit = Registering {
                    command,
                    identity: &identity,
                    host,
                    result,
                    configuration,
                    materialized,
                };
                self.register(&visit, &key, files)?;
            }
        }
        Ok(())
    }

    fn register<W: Write>(
        &mut self,
        visit: &Registering<'_>,
        key: &PrimaryOutputKey,
        files: &mut BffFiles<W>,
    ) -> Result<(), GenerateError> {
        let Registering {
            command,
            identity,
            host,
            result,
            configuration,
            ..
        } = *visit;
        let candidate = candidate_name(host, command.name(), result, configuration);
        let registration = self.registry.register(identity, key, &candidate, host);
        match &registration {
            Registration::DefineNew(name) => self.define(visit, name, files)?,
            Registration::AliasTo(existing) => {
                if let Some(Some(other)) = self.defined_in.get(existing)
                    && other != configuration
                {
                    warn!(
                        command = command.name(),
                        configuration,
                        existing = existing.as_str(),
                        defined_in = other.as_str(),
                        "duplicate outputs in different config; aliasing",
                    );
                }
                self.claim(visit, existing)?;
            }
            Registration::Skip => {}
        }
        self.resolved.insert(
            (host.to_owned(), command.name().to_owned(), configuration.to_owned()),
            registration.resolved(&candidate).to_owned(),
        );
        self.decisions.push(Decision {
            command: command.name().to_owned(),
            host: host.to_owned(),
            configuration: configuration.to_owned(),
            registration,
        });
        Ok(())
    }

    /// Claim every output of the registration, in each configuration it
    /// serves, for the definition named `owner`.
    fn claim(&mut self, visit: &Registering<'_>, owner: &str) -> Result<(), GenerateError> {
        let served = self
            .project
            .configurations()
            .iter()
            .filter(|c| !visit.result.is_dependent() || c.as_str() == visit.configuration);
        self.registry
            .claim_outputs(served, visit.materialized.outputs(), visit.identity, owner)?;
        Ok(())
    }

    fn define<W: Write>(
        &mut self,
        visit: &Registering<'_>,
        name: &str,
        files: &mut BffFiles<W>,
    ) -> Result<(), GenerateError> {
        let Registering {
            command,
            host,
            result,
            configuration,
            materialized,
            ..
        } = *visit;
        let what = if result.is_dependent() {
            format!("command '{}' of target '{host}' in {configuration}", command.name())
        } else {
            format!("command '{}' of target '{host}'", command.name())
        };
        self.registry.reserve_name(name, &what)?;
        self.claim(visit, name)?;
        let (executable, arguments) = exec_invocation(
            command.name(),
            &materialized.command_lines,
            &self.project.settings().shell,
        )?;
        let prebuild = if result.is_dependent() {
            command
                .depends()
                .iter()
                .filter(|d| self.emitted_targets.contains_key(d.as_str()))
                .map(|d| format!("{d}-{configuration}"))
                .collect()
        } else {
            Vec::new()
        };
        let exec = Exec {
            name,
            executable,
            arguments,
            materialized,
            prebuild,
        };
        let out = if result.is_dependent() {
            files.config_mut(configuration)?
        } else {
            &mut files.base
        };
        write_exec(out, &exec)?;
        self.defined_in.insert(
            name.to_owned(),
            result.is_dependent().then(|| configuration.to_owned()),
        );
        Ok(())
    }

    fn visit_target<W: Write>(
        &mut self,
        target: &TargetNode,
        files: &mut BffFiles<W>,
    ) -> Result<(), GenerateError> {
        if target.is_imported() {
            debug!(target = target.name(), "imported target; nothing to emit");
            return Ok(());
        }
        let project = self.project;
        let mut emitted = false;
        for configuration in project.configurations() {
            let depends = target
                .depends()
                .iter()
                .filter(|d| self.emitted_targets.contains_key(d.as_str()))
                .map(|d| format!("{d}-{configuration}"));
            let commands = target.commands().iter().filter_map(|c| {
                self.resolved
                    .get(&(target.name().to_owned(), c.clone(), configuration.clone()))
                    .cloned()
            });
            let members: Vec<String> = depends.chain(commands).unique().collect();
            if members.is_empty() {
                continue;
            }
            let alias = format!("{}-{configuration}", target.name());
            self.registry.reserve_name(
                &alias,
                &format!("alias of target '{}' in {configuration}", target.name()),
            )?;
            write_alias(files.config_mut(configuration)?, &alias, &members)?;
            emitted = true;
        }
        if emitted {
            self.emitted_targets
                .insert(target.name().to_owned(), target.is_excluded_from_all());
        } else {
            debug!(target = target.name(), "target has nothing to build; eliding");
        }
        Ok(())
    }

    fn write_config_aliases<W: Write>(
        &mut self,
        files: &mut BffFiles<W>,
    ) -> Result<Vec<String>, GenerateError> {
        let project = self.project;
        let mut aliased = Vec::new();
        for configuration in project.configurations() {
            let targets: Vec<String> = self
                .emitted_targets
                .iter()
                .filter(|(_, excluded)| !**excluded)
                .map(|(name, _)| format!("{name}-{configuration}"))
                .sorted()
                .collect();
            if targets.is_empty() {
                continue;
            }
            let all_build = format!("ALL_BUILD-{configuration}");
            self.registry
                .reserve_name(configuration, &format!("alias of configuration {configuration}"))?;
            self.registry
                .reserve_name(&all_build, &format!("build-all alias of configuration {configuration}"))?;
            let out = files.config_mut(configuration)?;
            write_alias(out, configuration, &targets)?;
            write_alias(out, &all_build, &[configuration])?;
            aliased.push(configuration.clone());
        }
        Ok(aliased)
    }

    fn write_main<W: Write>(
        &mut self,
        out: &mut BffWriter<W>,
        aliased: &[String],
        options: &GenerateOptions,
    ) -> Result<(), GenerateError> {
        let project = self.project;
        let configurations = project.configurations();
        for configuration in configurations {
            out.write_directive(&format!("include \"{}\"", config_file_name(configuration)))?;
        }
        out.write_blank_line()?;
        out.write_array("all_configs", &wrap(configurations, ".config_", ""))?;
        out.write_section_header("Aliases")?;
        out.write_comment("Per targets")?;
        for target in self.emitted_targets.keys().sorted() {
            self.registry
                .reserve_name(target, &format!("alias of target '{target}'"))?;
            let per_config = wrap(configurations, &format!("{target}-"), "");
            write_alias(out, target, &per_config)?;
        }
        if !aliased.is_empty() {
            self.registry.reserve_name("All", "alias of every configuration")?;
            out.write_blank_line()?;
            out.write_comment("All")?;
            write_alias(out, "All", aliased)?;
        }
        if let Some(rule) = &options.regenerate {
            self.registry.reserve_name(REGENERATE_TARGET, "regeneration rule")?;
            write_regenerate(out, rule)?;
        }
        Ok(())
    }
}

/// Run one generation pass over `project`, writing into `files`.
///
/// # Errors
///
/// Returns [`GenerateError::Cycle`] when the node graph is cyclic,
/// [`GenerateError::DuplicateOutput`] when two commands write the same
/// output in one configuration, [`GenerateError::DuplicateName`] when two
/// nodes would be written under one name, and [`GenerateError::Emit`] when
/// writing fails. The caller still owns `files` and should call
/// [`BffFiles::finish`] on success.
pub fn generate<W: Write>(
    project: &Project,
    files: &mut BffFiles<W>,
    options: &GenerateOptions,
) -> Result<GenerationReport, GenerateError> {
    let sorted = sort(project.nodes())?;
    info!(
        nodes = sorted.order.len(),
        unresolved = sorted.unresolved.len(),
        "sorted project nodes",
    );
    write_base_preamble(&mut files.base, project)?;
    for configuration in project.configurations() {
        write_config_preamble(files.config_mut(configuration)?, configuration)?;
    }
    let mut ctx = GenerationContext::new(project);
    for node in &sorted.order {
        match node {
            Node::Command(command) => ctx.visit_command(command, files)?,
            Node::Target(target) => ctx.visit_target(target, files)?,
        }
    }
    let aliased = ctx.write_config_aliases(files)?;
    ctx.write_main(&mut files.main, &aliased, options)?;
    info!(
        definitions = ctx.registry.len(),
        targets = ctx.emitted_targets.len(),
        "generation pass complete",
    );
    Ok(GenerationReport {
        order: sorted.order.iter().map(|n| n.name().to_owned()).collect(),
        unresolved: sorted.unresolved,
        classifications: ctx.classifier.into_classifications(),
        decisions: ctx.decisions,
    })
}

/// Run a pass in memory and return only its report.
///
/// # Errors
///
/// Returns the same errors as [`generate`].
pub fn plan(project: &Project) -> Result<GenerationReport, GenerateError> {
    let mut files = BffFiles::in_memory(project.configurations());
    let report = generate(project, &mut files, &GenerateOptions::default())?;
    files.finish()?;
    Ok(report)
}
