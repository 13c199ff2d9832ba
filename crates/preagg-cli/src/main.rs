use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    base::{self, BaseResourcesArgs},
    lci::{self, LciArgs, LciWorkerArgs},
    lcia::{self, LciaArgs},
    progress::{self, ProgressArgs},
    relocate::{self, RelocateArgs},
};
use config::{PreaggConfig, ProjectArgs};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "preagg", about = "Pre-aggregated inventory and impact sample generation")]
struct Cli {
    #[command(flatten)]
    project: ProjectArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample the parameter tables of a batch and register them.
    BaseResources(BaseResourcesArgs),
    /// Compute missing inventory arrays for a batch.
    Lci(LciArgs),
    /// Run one worker assignment.
    #[command(hide = true)]
    LciWorker(LciWorkerArgs),
    /// Score stored inventories against a characterization method.
    Lcia(LciaArgs),
    /// Report remaining entities per slice.
    Progress(ProgressArgs),
    /// Point every registered resource at a new parent directory.
    RelocateResources(RelocateArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let Cli { project, command } = cli;
    let config = || PreaggConfig::resolve(&project);
    match command {
        Command::BaseResources(args) => base::run(&config()?, &args),
        Command::Lci(args) => lci::run(&config()?, &args),
        Command::LciWorker(args) => lci::run_worker(&args),
        Command::Lcia(args) => lcia::run(&config()?, &args),
        Command::Progress(args) => progress::run(&config()?, &args),
        Command::RelocateResources(args) => relocate::run(&config()?, &args),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    run(Cli::parse()).map_err(|err| {
        error!(error = %err, "preagg failed");
        err
    })
}
