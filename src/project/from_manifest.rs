//! Manifest-to-project conversion helpers.

use std::collections::HashMap;

use crate::ast::{CommandDecl, ConfigOverrideDecl, ProjectManifest, StringOrList, TargetDecl};
use crate::graph::{CommandNode, ConfigOverride, GraphNode, TargetNode};

use super::{Project, ProjectError, Settings};

impl Project {
    /// Transform a manifest into a validated [`Project`].
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError`] when a target lists a command that is not
    /// declared or when the assembled project fails validation.
    ///
    /// ```
    /// use bffgen::project::Project;
    ///
    /// let manifest = bffgen::manifest::from_str(
    ///     "bffgen_version: \"1.0.0\"\nconfigurations: [Debug]\n",
    /// )?;
    /// let project = Project::from_manifest(&manifest)?;
    /// assert_eq!(project.configurations(), ["Debug"]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_manifest(manifest: &ProjectManifest) -> Result<Self, ProjectError> {
        let commands: Vec<CommandNode> = manifest.commands.iter().map(process_command).collect();
        let by_name: HashMap<&str, &CommandNode> = commands
            .iter()
            .map(|c| (c.name(), c))
            .collect();
        let targets = manifest
            .targets
            .iter()
            .map(|t| process_target(t, &by_name))
            .collect::<Result<Vec<_>, _>>()?;
        let settings = Settings {
            cache_path: manifest.settings.cache_path.clone(),
            shell: manifest.settings.shell.clone(),
        };
        Self::new(
            manifest.configurations.clone(),
            settings,
            targets,
            commands,
        )
    }
}

fn process_command(decl: &CommandDecl) -> CommandNode {
    decl.configs.iter().fold(
        CommandNode::new(decl.name.clone(), decl.command.to_vec())
            .with_working_directory(decl.working_directory.clone())
            .with_inputs(decl.inputs.to_vec())
            .with_outputs(decl.outputs.to_vec())
            .with_byproducts(decl.byproducts.to_vec())
            .with_symbolic_outputs(decl.symbolic_outputs.to_vec())
            .with_depends(decl.depends.to_vec()),
        |node, (configuration, o)| node.with_override(configuration.clone(), to_override(o)),
    )
}

fn to_override(decl: &ConfigOverrideDecl) -> ConfigOverride {
    ConfigOverride {
        command_lines: decl.command.as_ref().map(StringOrList::to_vec),
        working_directory: decl.working_directory.clone(),
    }
}

fn process_target(
    decl: &TargetDecl,
    commands: &HashMap<&str, &CommandNode>,
) -> Result<TargetNode, ProjectError> {
    let hosted = decl
        .commands
        .to_vec()
        .into_iter()
        .map(|name| {
            commands
                .get(name.as_str())
                .copied()
                .ok_or_else(|| ProjectError::UnknownCommand {
                    target: decl.name.clone(),
                    command: name,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TargetNode::new(decl.name.clone())
        .with_depends(decl.depends.to_vec())
        .with_commands(hosted)
        .imported(decl.imported)
        .exclude_from_all(decl.exclude_from_all))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MANIFEST: &str = r#"
bffgen_version: "1.0.0"
configurations: [Debug, Release]
settings:
  cache_path: /tmp/cache
targets:
  - name: app
    commands: [gen]
    depends: lib
  - name: lib
    imported: true
commands:
  - name: gen
    command: gen -o a.h
    outputs: a.h
    configs:
      Release:
        command: [gen -O2 -o a.h]
"#;

    #[rstest]
    fn manifest_becomes_project() {
        let manifest = crate::manifest::from_str(MANIFEST).expect("parse");
        let project = Project::from_manifest(&manifest).expect("project");
        assert_eq!(project.settings().cache_path, "/tmp/cache");
        assert_eq!(project.settings().shell, "/bin/sh");
        let app = project.target("app").expect("app");
        assert_eq!(app.commands(), ["gen"]);
        assert_eq!(app.inputs(), ["lib", "a.h"]);
        assert!(project.target("lib").is_some_and(TargetNode::is_imported));
        let gen_cmd = project.commands().first().expect("gen");
        assert_eq!(
            gen_cmd
                .override_for("Release")
                .and_then(|o| o.command_lines.clone()),
            Some(vec!["gen -O2 -o a.h".to_owned()])
        );
    }

    #[rstest]
    fn unknown_hosted_command_is_reported() {
        let yaml = "bffgen_version: \"1.0.0\"\ntargets:\n  - name: app\n    commands: missing\n";
        let manifest = crate::manifest::from_str(yaml).expect("parse");
        let err = Project::from_manifest(&manifest).expect_err("unknown command");
        assert_eq!(
            err,
            ProjectError::UnknownCommand {
                target: "app".into(),
                command: "missing".into(),
            }
        );
    }
}
