use std::env;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use preagg_core::seed::BatchKey;
use preagg_lci::{
    dispatch, run_assignment_file, CommandEvaluator, DispatchRequest, ProcessLauncher, Slicing,
    ThreadLauncher, WorkerLauncher,
};
use tracing::{info, warn};

use crate::commands::result_type;
use crate::config::{PreaggConfig, PrecisionArg};

#[derive(Args, Debug)]
pub struct LciArgs {
    /// Batch number in `0..=14`.
    #[arg(long)]
    pub batch: u32,
    /// Compute deterministic results instead of sampled ones.
    #[arg(long)]
    pub deterministic: bool,
    /// Upper bound on concurrent workers; defaults to the configured value.
    #[arg(long)]
    pub parallel_jobs: Option<usize>,
    /// Slice of the manifest processed by this run.
    #[arg(long, requires = "number_of_slices")]
    pub slice_id: Option<usize>,
    /// Number of slices the manifest is cut into.
    #[arg(long, requires = "slice_id")]
    pub number_of_slices: Option<usize>,
    /// Storage precision of inventory arrays.
    #[arg(long, value_enum)]
    pub precision: Option<PrecisionArg>,
    /// Run workers as threads of this process.
    #[arg(long)]
    pub in_process: bool,
}

#[derive(Args, Debug)]
pub struct LciWorkerArgs {
    /// Assignment file written by the dispatcher.
    #[arg(long)]
    pub assignment: PathBuf,
    /// Evaluator program.
    #[arg(long)]
    pub evaluator: PathBuf,
    /// Evaluator argument, repeatable.
    #[arg(long = "evaluator-arg", allow_hyphen_values = true)]
    pub evaluator_args: Vec<String>,
}

pub fn run(config: &PreaggConfig, args: &LciArgs) -> Result<(), Box<dyn Error>> {
    let ctx = config.context()?;
    let evaluator = config.evaluator()?;
    let slicing = match (args.slice_id, args.number_of_slices) {
        (Some(slice_id), Some(number_of_slices)) => Some(Slicing::new(slice_id, number_of_slices)?),
        _ => None,
    };
    let request = DispatchRequest {
        batch: BatchKey::new(args.batch)?,
        result_type: result_type(args.deterministic),
        parallel_jobs: args.parallel_jobs.unwrap_or(config.parallel_jobs),
        slicing,
        precision: args.precision.map(Into::into).unwrap_or(config.precision),
    };

    let thread_launcher;
    let process_launcher;
    let launcher: &dyn WorkerLauncher = if args.in_process {
        thread_launcher = ThreadLauncher::new(&evaluator);
        &thread_launcher
    } else {
        process_launcher = ProcessLauncher::new(env::current_exe()?, worker_args(&evaluator));
        &process_launcher
    };

    let summary = dispatch(&ctx, &request, launcher)?;
    if summary.unfinished() > 0 {
        warn!(
            unfinished = summary.unfinished(),
            "some entities have no result; rerun the same command to resume"
        );
    }
    info!(
        completed = summary.completed(),
        already_complete = summary.already_complete,
        "lci run finished"
    );
    Ok(())
}

fn worker_args(evaluator: &CommandEvaluator) -> Vec<String> {
    let mut args = vec![
        "lci-worker".to_string(),
        "--evaluator".to_string(),
        evaluator.program.display().to_string(),
    ];
    for arg in &evaluator.args {
        args.push(format!("--evaluator-arg={arg}"));
    }
    args
}

pub fn run_worker(args: &LciWorkerArgs) -> Result<(), Box<dyn Error>> {
    let evaluator = CommandEvaluator::new(args.evaluator.clone(), args.evaluator_args.clone());
    let report = run_assignment_file(&args.assignment, &evaluator)?;
    info!(
        worker_id = report.worker_id,
        completed = report.completed.len(),
        failed = report.failed.len(),
        "worker finished"
    );
    Ok(())
}
