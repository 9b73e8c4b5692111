mod commands;
mod helpers;

use clap::Parser;
use diskfit_core::domain::DiskfitError;

pub fn run_from_env() -> i32 {
    helpers::init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diskfit_error = error.as_diskfit_error();
            eprintln!("{}", diskfit_error.diagnostic_line());
            if let Some(summary_line) = diskfit_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diskfit_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("diskfit".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "diskfit", version, about = "Protoplanetary disk radiative-transfer driver")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Assemble a model and write the engine input files into a directory
    Stage(commands::StageArgs),
    /// Print the tier a parameter set selects
    Tier(commands::TierArgs),
    /// Assemble a model and run the thermal stage of the engine
    Thermal(commands::ThermalArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Stage(args) => commands::run_stage_command(args),
        CliCommand::Tier(args) => commands::run_tier_command(args),
        CliCommand::Thermal(args) => commands::run_thermal_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(DiskfitError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DiskfitError> for CliError {
    fn from(error: DiskfitError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_diskfit_error(&self) -> DiskfitError {
        match self {
            Self::Usage(message) => {
                DiskfitError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DiskfitError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
