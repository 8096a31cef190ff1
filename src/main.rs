//! Binary entry point: parse the CLI, initialise logging, dispatch.
use anyhow::Result;
use clap::Parser;

use provision_cli::cli::{self, Cli};
use provision_cli::commands;
use provision_cli::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    let command_name = match args.command {
        cli::Command::Install(_) => "install",
        cli::Command::List(_) => "list",
        cli::Command::Version => "version",
    };
    logging::init_subscriber(args.verbose, command_name);
    let log = Logger::new(command_name);

    match args.command {
        cli::Command::Install(ref opts) => commands::install::run(&args.global, opts, &log),
        cli::Command::List(ref opts) => commands::list::run(&args.global, opts, &log),
        cli::Command::Version => {
            let version = option_env!("PROVISION_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            println!("provision {version}");
            Ok(())
        }
    }
}
