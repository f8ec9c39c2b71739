//! Command-line interface for bulk-loading COPY text files.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use clap::{Parser, Subcommand};

mod error;
mod fs;
mod load;

pub use error::CliError;
pub use load::LoadReport;

use load::{LoadArgs, LoadConfig};

const ARG_DATABASE: &str = "database";
const ARG_TABLE: &str = "table";
const ARG_ID_COLUMN: &str = "id-column";
const ARG_INPUT: &str = "input";
const ARG_DELETE_IDS: &str = "delete-ids";
const ENV_DATABASE: &str = "FEATURELOAD_CMDS_LOAD_DATABASE";
const ENV_TABLE: &str = "FEATURELOAD_CMDS_LOAD_TABLE";
const ENV_ID_COLUMN: &str = "FEATURELOAD_CMDS_LOAD_ID_COLUMN";
const ENV_INPUT: &str = "FEATURELOAD_CMDS_LOAD_INPUT";

/// Run the featureload CLI with the current process arguments and
/// environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the load fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Load(args) => {
            let report = run_load(args)?;
            let mut stdout = io::stdout().lock();
            writeln!(
                stdout,
                "loaded {} rows ({} bytes in {} buffers), deleted {} ids",
                report.rows, report.bytes, report.buffers, report.deleted_ids
            )
            .map_err(CliError::WriteReport)?;
        }
    }
    Ok(())
}

fn run_load(args: LoadArgs) -> Result<LoadReport, CliError> {
    let config = resolve_load_config(args)?;
    load::execute(&config)
}

fn resolve_load_config(args: LoadArgs) -> Result<LoadConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

#[derive(Debug, Parser)]
#[command(
    name = "featureload",
    about = "Bulk-load feature rows through a single-writer pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream COPY text rows into a table.
    Load(LoadArgs),
}

#[cfg(test)]
mod tests;
