//! Command-line interface definition.
use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the provisioning engine.
#[derive(Parser, Debug)]
#[command(
    name = "provision",
    about = "Declarative environment-provisioning engine",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared across all subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override the catalog file path
    #[arg(long, global = true)]
    pub catalog: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install every applicable package from the catalog
    Install(InstallOpts),
    /// List applicable packages with their install method and status
    List(ListOpts),
    /// Print version information
    Version,
}

/// Options for the `install` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct InstallOpts {
    /// Install only the named packages
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

/// Options for the `list` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ListOpts {}
