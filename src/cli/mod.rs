//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands.

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Generates multi-configuration FASTBuild files from a YAML project manifest.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the project manifest.
    #[arg(short, long, value_name = "FILE", default_value = "bffgen.yml")]
    pub file: PathBuf,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute; defaults to `generate` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Parse the provided arguments, applying the default command when needed.
    ///
    /// # Errors
    ///
    /// Returns the clap error when the arguments are invalid.
    pub fn try_parse_with_default<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map(Self::with_default_command)
    }

    /// Apply the default command if none was specified.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Generate(GenerateArgs::default()));
        }
        self
    }
}

/// Arguments accepted by the `generate` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct GenerateArgs {
    /// Directory receiving the generated `.bff` files.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Leave the `rebuild-bff` rule out of `fbuild.bff`.
    #[arg(long)]
    pub no_regenerate: bool,
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Write `fbuild.bff`, `base.bff` and one file per configuration (default).
    Generate(GenerateArgs),

    /// Print the nodes in emission order.
    Order,

    /// Print command classifications and define/alias/skip decisions.
    Plan,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn generate_is_the_default_command() {
        let cli = Cli::try_parse_with_default(["bffgen"]).expect("parse");
        assert_eq!(cli.file, PathBuf::from("bffgen.yml"));
        assert_eq!(
            cli.command,
            Some(Commands::Generate(GenerateArgs::default()))
        );
    }

    #[rstest]
    #[case(&["bffgen", "order"], Commands::Order)]
    #[case(&["bffgen", "-v", "plan"], Commands::Plan)]
    #[case(
        &["bffgen", "generate", "--output-dir", "out", "--no-regenerate"],
        Commands::Generate(GenerateArgs { output_dir: Some("out".into()), no_regenerate: true })
    )]
    fn subcommands_parse(#[case] args: &[&str], #[case] expected: Commands) {
        let cli = Cli::try_parse_with_default(args).expect("parse");
        assert_eq!(cli.command, Some(expected));
    }

    #[rstest]
    fn directory_and_file_are_captured() {
        let cli = Cli::try_parse_with_default(["bffgen", "-C", "proj", "-f", "x.yml"]).expect("parse");
        assert_eq!(cli.directory, Some(PathBuf::from("proj")));
        assert_eq!(cli.file, PathBuf::from("x.yml"));
    }
}
