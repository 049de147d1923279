//! The validated project: configurations, settings, targets and commands.
//!
//! A [`Project`] is what one generation pass consumes. Building one checks
//! every cross reference up front, so the generator can assume names resolve.

use std::collections::HashSet;

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::{DEFAULT_CACHE_PATH, DEFAULT_SHELL};
use crate::graph::{CommandNode, GraphNode, Node, TargetNode};

mod from_manifest;

/// Errors raised while assembling a [`Project`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ProjectError {
    /// No configuration was declared.
    #[error("at least one configuration is required")]
    #[diagnostic(code(bffgen::project::no_configurations))]
    NoConfigurations,
    /// A configuration name is empty or contains characters that cannot
    /// appear in a file name.
    #[error("invalid configuration name '{name}'")]
    #[diagnostic(
        code(bffgen::project::invalid_configuration),
        help("configuration names become file names; use letters, digits, '_' or '-'")
    )]
    InvalidConfiguration {
        /// The rejected name.
        name: String,
    },
    /// A configuration was declared twice.
    #[error("configuration '{name}' is declared more than once")]
    #[diagnostic(code(bffgen::project::duplicate_configuration))]
    DuplicateConfiguration {
        /// The repeated name.
        name: String,
    },
    /// Two nodes share a name.
    #[error("'{name}' is declared more than once")]
    #[diagnostic(
        code(bffgen::project::duplicate_name),
        help("targets and commands share one namespace")
    )]
    DuplicateName {
        /// The repeated name.
        name: String,
    },
    /// A target lists a command that does not exist.
    #[error("target '{target}' uses unknown command '{command}'")]
    #[diagnostic(code(bffgen::project::unknown_command))]
    UnknownCommand {
        /// The target.
        target: String,
        /// The missing command.
        command: String,
    },
    /// A node depends on a target that does not exist.
    #[error("'{node}' depends on unknown target '{target}'")]
    #[diagnostic(code(bffgen::project::unknown_target))]
    UnknownTarget {
        /// The dependent node.
        node: String,
        /// The missing target.
        target: String,
    },
    /// A command has no command line.
    #[error("command '{command}' has no command line")]
    #[diagnostic(code(bffgen::project::empty_command))]
    EmptyCommand {
        /// The command.
        command: String,
    },
    /// A command produces nothing.
    #[error("command '{command}' declares no outputs")]
    #[diagnostic(
        code(bffgen::project::missing_outputs),
        help("declare at least one entry in `outputs` or `symbolic_outputs`")
    )]
    MissingOutputs {
        /// The command.
        command: String,
    },
    /// A command overrides a configuration that is not declared.
    #[error("command '{command}' overrides unknown configuration '{configuration}'")]
    #[diagnostic(code(bffgen::project::unknown_configuration))]
    UnknownConfiguration {
        /// The command.
        command: String,
        /// The undeclared configuration.
        configuration: String,
    },
}

/// Generator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// FASTBuild cache directory.
    pub cache_path: String,
    /// Shell for commands made of several lines.
    pub shell: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_path: DEFAULT_CACHE_PATH.to_owned(),
            shell: DEFAULT_SHELL.to_owned(),
        }
    }
}

/// A validated set of build entities.
#[derive(Debug, Clone)]
pub struct Project {
    configurations: Vec<String>,
    settings: Settings,
    targets: Vec<TargetNode>,
    commands: Vec<CommandNode>,
}

fn valid_configuration_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Project {
    /// Assemble a project, checking every cross reference.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProjectError`] found.
    pub fn new(
        configurations: Vec<String>,
        settings: Settings,
        targets: Vec<TargetNode>,
        commands: Vec<CommandNode>,
    ) -> Result<Self, ProjectError> {
        validate_configurations(&configurations)?;
        let mut names = HashSet::new();
        for name in targets
            .iter()
            .map(GraphNode::name)
            .chain(commands.iter().map(GraphNode::name))
        {
            if !names.insert(name) {
                return Err(ProjectError::DuplicateName {
                    name: name.to_owned(),
                });
            }
        }
        let target_names: HashSet<&str> = targets.iter().map(GraphNode::name).collect();
        let command_names: HashSet<&str> = commands.iter().map(GraphNode::name).collect();
        for target in &targets {
            if let Some(command) = target
                .commands()
                .iter()
                .find(|c| !command_names.contains(c.as_str()))
            {
                return Err(ProjectError::UnknownCommand {
                    target: target.name().to_owned(),
                    command: command.clone(),
                });
            }
            check_depends(target.name(), target.depends(), &target_names)?;
        }
        for command in &commands {
            validate_command(command, &configurations, &target_names)?;
        }
        Ok(Self {
            configurations,
            settings,
            targets,
            commands,
        })
    }

    /// Configuration names in declaration order.
    #[must_use]
    pub fn configurations(&self) -> &[String] {
        &self.configurations
    }

    /// Generator settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Declared targets.
    #[must_use]
    pub fn targets(&self) -> &[TargetNode] {
        &self.targets
    }

    /// Declared commands.
    #[must_use]
    pub fn commands(&self) -> &[CommandNode] {
        &self.commands
    }

    /// Look up a target by name.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&TargetNode> {
        self.targets.iter().find(|t| t.name() == name)
    }

    /// Names of the targets that host `command`, sorted.
    #[must_use]
    pub fn hosts_of(&self, command: &str) -> Vec<&str> {
        let mut hosts: Vec<&str> = self
            .targets
            .iter()
            .filter(|t| t.commands().iter().any(|c| c == command))
            .map(GraphNode::name)
            .collect();
        hosts.sort_unstable();
        hosts
    }

    /// Names of targets that are not imported.
    pub fn live_targets(&self) -> impl Iterator<Item = &str> {
        self.targets
            .iter()
            .filter(|t| !t.is_imported())
            .map(GraphNode::name)
    }

    /// Every target and command as a graph node.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.targets
            .iter()
            .cloned()
            .map(Node::Target)
            .chain(self.commands.iter().cloned().map(Node::Command))
            .collect()
    }
}

fn validate_configurations(configurations: &[String]) -> Result<(), ProjectError> {
    if configurations.is_empty() {
        return Err(ProjectError::NoConfigurations);
    }
    let mut seen = HashSet::new();
    for name in configurations {
        if !valid_configuration_name(name) {
            return Err(ProjectError::InvalidConfiguration { name: name.clone() });
        }
        if !seen.insert(name.as_str()) {
            return Err(ProjectError::DuplicateConfiguration { name: name.clone() });
        }
    }
    Ok(())
}

fn check_depends(
    node: &str,
    depends: &[String],
    targets: &HashSet<&str>,
) -> Result<(), ProjectError> {
    match depends.iter().find(|d| !targets.contains(d.as_str())) {
        Some(missing) => Err(ProjectError::UnknownTarget {
            node: node.to_owned(),
            target: missing.clone(),
        }),
        None => Ok(()),
    }
}

fn validate_command(
    command: &CommandNode,
    configurations: &[String],
    targets: &HashSet<&str>,
) -> Result<(), ProjectError> {
    let name = command.name();
    let blank = |lines: &[String]| lines.iter().all(|l| l.trim().is_empty());
    let blank_override = command
        .overrides()
        .values()
        .filter_map(|o| o.command_lines.as_deref())
        .any(blank);
    if blank(command.command_lines()) || blank_override {
        return Err(ProjectError::EmptyCommand {
            command: name.to_owned(),
        });
    }
    if command.file_outputs().is_empty() && command.symbolic_outputs().is_empty() {
        return Err(ProjectError::MissingOutputs {
            command: name.to_owned(),
        });
    }
    if let Some(configuration) = command
        .overrides()
        .keys()
        .find(|c| !configurations.contains(c))
    {
        return Err(ProjectError::UnknownConfiguration {
            command: name.to_owned(),
            configuration: configuration.clone(),
        });
    }
    check_depends(name, command.depends(), targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConfigOverride;
    use rstest::rstest;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn gen_command() -> CommandNode {
        CommandNode::new("gen", strings(&["gen"])).with_outputs(strings(&["a.h"]))
    }

    fn build(
        configurations: &[&str],
        targets: Vec<TargetNode>,
        commands: Vec<CommandNode>,
    ) -> Result<Project, ProjectError> {
        Project::new(strings(configurations), Settings::default(), targets, commands)
    }

    #[rstest]
    fn hosts_are_sorted() {
        let cmd = gen_command();
        let project = build(
            &["Debug"],
            vec![
                TargetNode::new("zeta").with_commands([&cmd]),
                TargetNode::new("alpha").with_commands([&cmd]),
            ],
            vec![cmd.clone()],
        )
        .expect("valid");
        assert_eq!(project.hosts_of("gen"), ["alpha", "zeta"]);
        assert_eq!(project.nodes().len(), 3);
    }

    #[rstest]
    #[case(&[], ProjectError::NoConfigurations)]
    #[case(&["Debug", "Debug"], ProjectError::DuplicateConfiguration { name: "Debug".into() })]
    #[case(&["Deb ug"], ProjectError::InvalidConfiguration { name: "Deb ug".into() })]
    fn configuration_lists_are_checked(#[case] configs: &[&str], #[case] expected: ProjectError) {
        let err = build(configs, Vec::new(), Vec::new()).expect_err("invalid");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn targets_and_commands_share_a_namespace() {
        let err = build(&["Debug"], vec![TargetNode::new("gen")], vec![gen_command()])
            .expect_err("clash");
        assert_eq!(err, ProjectError::DuplicateName { name: "gen".into() });
    }

    #[rstest]
    fn unknown_dependency_is_rejected() {
        let err = build(
            &["Debug"],
            vec![TargetNode::new("app").with_depends(strings(&["lib"]))],
            Vec::new(),
        )
        .expect_err("unknown");
        assert_eq!(
            err,
            ProjectError::UnknownTarget {
                node: "app".into(),
                target: "lib".into(),
            }
        );
    }

    #[rstest]
    #[case(
        CommandNode::new("c", strings(&["  "])).with_outputs(strings(&["o"])),
        ProjectError::EmptyCommand { command: "c".into() }
    )]
    #[case(
        CommandNode::new("c", strings(&["x"])).with_byproducts(strings(&["log"])),
        ProjectError::MissingOutputs { command: "c".into() }
    )]
    #[case(
        CommandNode::new("c", strings(&["x"]))
            .with_outputs(strings(&["o"]))
            .with_override("Profile", ConfigOverride::default()),
        ProjectError::UnknownConfiguration { command: "c".into(), configuration: "Profile".into() }
    )]
    fn malformed_commands_are_rejected(#[case] command: CommandNode, #[case] expected: ProjectError) {
        let err = build(&["Debug"], Vec::new(), vec![command]).expect_err("invalid");
        assert_eq!(err, expected);
    }
}
