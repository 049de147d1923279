//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! handles command execution: loading the manifest, building the project and
//! running the requested subcommand.

mod error;
mod path_helpers;

pub use error::RunnerError;

use crate::bff_gen::{self, BffFiles, GenerateOptions, RegenerateRule};
use crate::cli::{Cli, Commands, GenerateArgs};
use crate::graph::{self, GraphNode};
use crate::manifest;
use crate::project::Project;
use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, Write};
use tracing::{debug, info};

use path_helpers::{ensure_manifest_exists_or_error, resolve_manifest_path, resolve_output_path};

/// Execute the parsed [`Cli`] commands.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, the project is invalid,
/// or generation fails.
pub fn run(cli: &Cli) -> Result<()> {
    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| Commands::Generate(GenerateArgs::default()));
    let manifest_path = resolve_manifest_path(cli)?;
    ensure_manifest_exists_or_error(cli, &manifest_path)?;
    let project = load_project(&manifest_path)?;
    match command {
        Commands::Generate(args) => handle_generate(cli, &args, &project, &manifest_path),
        Commands::Order => print_order(&project),
        Commands::Plan => print_plan(&project),
    }
}

/// Load and validate the project described by the manifest at `path`.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or parsed, or if the
/// declared entities do not form a valid project.
pub fn load_project(path: &Utf8Path) -> Result<Project> {
    let manifest =
        manifest::from_path(path).with_context(|| format!("loading manifest at {path}"))?;
    let project = Project::from_manifest(&manifest).context("building project")?;
    debug!(
        configurations = project.configurations().len(),
        targets = project.targets().len(),
        commands = project.commands().len(),
        "loaded project",
    );
    Ok(project)
}

fn handle_generate(
    cli: &Cli,
    args: &GenerateArgs,
    project: &Project,
    manifest_path: &Utf8Path,
) -> Result<()> {
    let out_dir = resolve_output_path(cli, args.output_dir.as_deref())?;
    if !out_dir.as_str().is_empty() {
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {out_dir}"))?;
    }
    let regenerate = if args.no_regenerate {
        None
    } else {
        Some(regenerate_rule(manifest_path, &out_dir)?)
    };
    let options = GenerateOptions { regenerate };
    let mut files = BffFiles::in_dir(&out_dir, project.configurations());
    bff_gen::generate(project, &mut files, &options).context("generating FASTBuild files")?;
    let written = files.finish().context("closing generated files")?;
    for name in written.keys() {
        info!(file = %out_dir.join(name), "generated FASTBuild file");
    }
    Ok(())
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let target = if path.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        path
    };
    target
        .canonicalize_utf8()
        .with_context(|| format!("resolving {target}"))
}

/// The rule that re-runs this executable when the manifest changes.
fn regenerate_rule(manifest_path: &Utf8Path, out_dir: &Utf8Path) -> Result<RegenerateRule> {
    let manifest = absolute(manifest_path)?;
    let output = absolute(out_dir)?;
    let exe = std::env::current_exe().context("locating the bffgen executable")?;
    let executable = Utf8PathBuf::from_path_buf(exe)
        .map_err(|p| anyhow!("executable path is not valid UTF-8: {}", p.display()))?;
    let words = [
        "-f",
        manifest.as_str(),
        "generate",
        "--output-dir",
        output.as_str(),
    ];
    let arguments = shlex::try_join(words).context("quoting regeneration arguments")?;
    Ok(RegenerateRule {
        inputs: vec![manifest.into_string()],
        executable: executable.into_string(),
        arguments,
    })
}

fn print_order(project: &Project) -> Result<()> {
    let sorted = graph::sort(project.nodes()).context("sorting project nodes")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for node in &sorted.order {
        writeln!(out, "{} {}", node.kind(), node.name()).context("writing order")?;
    }
    Ok(())
}

fn print_plan(project: &Project) -> Result<()> {
    let report = bff_gen::plan(project).context("planning generation")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (command, classification) in &report.classifications {
        writeln!(
            out,
            "{command}: {} ({})",
            classification.result, classification.reason
        )
        .context("writing plan")?;
    }
    for decision in &report.decisions {
        writeln!(out, "{decision}").context("writing plan")?;
    }
    for reference in &report.unresolved {
        writeln!(out, "external {}: {}", reference.node, reference.input)
            .context("writing plan")?;
    }
    Ok(())
}
