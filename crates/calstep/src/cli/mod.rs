//! CLI definition and command handling

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use calstep_core::inputs;

use commands::{RunCommand, RunLocalCommand};

/// calstep - Calabash Android UI test step
#[derive(Debug, Parser)]
#[command(name = "calstep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose tool output; accepts Bitrise-style boolean literals
    /// ("yes", "1", ...) via the `verbose` input env
    #[arg(
        short,
        long,
        global = true,
        env = "verbose",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub verbose: Option<String>,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Full CI step: install calabash-android, provision the debug
    /// keystore, resign and run the APK, and export the result
    Run(RunCommand),

    /// Resign and run Calabash features from a local features directory
    RunLocal(RunLocalCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::RunLocal(ref cmd) => cmd.execute(&self),
        }
    }

    /// The coerced verbose input.
    pub fn verbose(&self) -> anyhow::Result<bool> {
        Ok(inputs::parse_bool_opt(self.verbose.as_deref())?)
    }

    /// Whether progress lines (config blocks, `$ cmd ...` echoes, info
    /// messages) go to stdout. Quiet runs and JSON output suppress them so
    /// machine-readable output stays clean.
    pub fn progress_echo(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }
}
