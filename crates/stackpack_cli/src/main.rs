//! stackpack CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 5: IaC error

use std::process::ExitCode;

use clap::Parser;
use stackpack_iac::IacError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const IAC_ERROR: u8 = 5;
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "stackpack=debug,stackpack_iac=debug,stackpack_model=debug,warn"
    } else if cli.quiet {
        "error"
    } else {
        "stackpack=info,stackpack_iac=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Already initialized in tests; keep going.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Detect(args) => commands::detect::execute(args),
        Commands::List(args) => commands::list::execute(args),
        Commands::Package(args) => commands::package::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(iac) = e.chain().find_map(|cause| cause.downcast_ref::<IacError>()) {
        return match iac {
            IacError::InvalidContext(_) | IacError::StackSelection(_) | IacError::UnknownProjectType(_) => {
                ExitCodes::INVALID_ARGS
            }
            _ => ExitCodes::IAC_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("option") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_error() {
        let invalid = anyhow::Error::new(IacError::StackSelection("More than one stack found.".into()));
        assert_eq!(categorize_error(&invalid), ExitCodes::INVALID_ARGS);

        let parse = anyhow::Error::new(IacError::ProjectParse {
            path: "template.yaml".into(),
            message: "bad".into(),
        })
        .context("Failed to read project");
        assert_eq!(categorize_error(&parse), ExitCodes::IAC_ERROR);

        assert_eq!(categorize_error(&anyhow::anyhow!("disk full")), ExitCodes::GENERAL_ERROR);
    }
}
