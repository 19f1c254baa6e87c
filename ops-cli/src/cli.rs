use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "rustcare-claims", version, about = "Quote and check insurance claims from scenario files")]
pub struct Cli {
    /// Engine settings file (YAML, TOML or JSON)
    #[arg(long, short, env = "RUSTCARE_CLAIMS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the claim described by a scenario and print it
    Quote {
        scenario: PathBuf,
        /// Print the per-section summary instead of the full claim
        #[arg(long)]
        summary: bool,
    },
    /// Submit the scenario claim for vetting and list what blocks approval
    CheckApproval { scenario: PathBuf },
    /// Print the effective engine settings
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}
