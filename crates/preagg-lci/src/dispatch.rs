//! Resumable dispatch of per-entity calculations across workers.
//!
//! A run validates the project, selects its slice of the manifest, skips
//! entities whose result is already complete, splits the rest across at most
//! `parallel_jobs` workers and waits for all of them. Runs are stateless:
//! rerunning the same request only recomputes what is still missing.

use std::fs;
use std::path::Path;

use preagg_core::array::{array_file_name, file_has_zero_column, Precision};
use preagg_core::context::{ProjectContext, ResultType};
use preagg_core::errors::{io_error, ErrorInfo, PreaggError};
use preagg_core::seed::BatchKey;
use preagg_samples::{load_ordered_codes, ResourceRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::launcher::{WorkerLauncher, WorkerOutcome};
use crate::partition::{select_slice, worker_sublists, Slicing};
use crate::worker::WorkerAssignment;

fn default_parallel_jobs() -> usize {
    1
}

/// Parameters of one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Batch whose samples are evaluated.
    pub batch: BatchKey,
    /// Result tree written.
    #[serde(default)]
    pub result_type: ResultType,
    /// Upper bound on concurrent workers.
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,
    /// Restricts the run to one slice of the manifest.
    #[serde(default)]
    pub slicing: Option<Slicing>,
    /// Precision of the stored arrays.
    #[serde(default)]
    pub precision: Precision,
}

impl DispatchRequest {
    /// Single-worker, unsliced probabilistic run.
    pub fn new(batch: BatchKey) -> Self {
        Self {
            batch,
            result_type: ResultType::default(),
            parallel_jobs: default_parallel_jobs(),
            slicing: None,
            precision: Precision::default(),
        }
    }
}

/// What a dispatch run did.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSummary {
    /// Entities in the manifest.
    pub manifest_len: usize,
    /// Entities in the selected slice.
    pub slice_len: usize,
    /// Entities of the slice found complete before the run.
    pub already_complete: usize,
    /// Sizes of the worker sublists.
    pub chunk_sizes: Vec<usize>,
    /// Outcome of each worker, by worker id.
    pub outcomes: Vec<WorkerOutcome>,
}

impl DispatchSummary {
    /// Entities promoted during this run.
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                WorkerOutcome::Finished(report) => report.completed.len(),
                WorkerOutcome::Crashed { .. } => 0,
            })
            .sum()
    }

    /// Entities left without a result, including those of crashed workers.
    pub fn unfinished(&self) -> usize {
        self.chunk_sizes.iter().sum::<usize>() - self.completed()
    }
}

/// Checks every prerequisite of a dispatch run.
pub fn validate(ctx: &ProjectContext, request: &DispatchRequest) -> Result<(), PreaggError> {
    ctx.check_database()?;
    ctx.check_result_dir()?;
    ctx.check_common_files()?;
    if request.parallel_jobs == 0 {
        return Err(PreaggError::Config(ErrorInfo::new(
            "parallel-jobs-zero",
            "parallel jobs must be at least 1",
        )));
    }
    if let Some(slicing) = request.slicing {
        Slicing::new(slicing.slice_id, slicing.number_of_slices)?;
    }
    if request.result_type == ResultType::Probabilistic {
        ResourceRegistry::open_in(ctx)?.get_or_create_campaign(request.batch, true)?;
    }
    Ok(())
}

/// True when the final result of `entity` exists and no column sums to zero.
///
/// An all-zero column marks an iteration that was never written; an
/// unreadable file counts as incomplete.
pub fn entity_complete(lci_dir: &Path, entity: &str) -> bool {
    let path = lci_dir.join(array_file_name(entity));
    if !path.is_file() {
        return false;
    }
    match file_has_zero_column(&path) {
        Ok(has_zero) => !has_zero,
        Err(err) => {
            warn!(entity, error = %err, "unreadable result, requeueing");
            false
        }
    }
}

/// Entities of `entities` still lacking a complete result.
pub fn pending_entities(lci_dir: &Path, entities: &[String]) -> Vec<String> {
    entities
        .iter()
        .filter(|entity| !entity_complete(lci_dir, entity))
        .cloned()
        .collect()
}

/// Runs the request with `launcher` and summarizes the outcome.
pub fn dispatch(
    ctx: &ProjectContext,
    request: &DispatchRequest,
    launcher: &dyn WorkerLauncher,
) -> Result<DispatchSummary, PreaggError> {
    validate(ctx, request)?;
    let lci_dir = ctx.lci_dir(request.result_type, request.batch);
    fs::create_dir_all(&lci_dir).map_err(|err| io_error("lci-dir", &lci_dir, err))?;

    let codes = load_ordered_codes(ctx)?;
    info!(total = codes.len(), "entities in manifest");
    let selected = select_slice(&codes, request.slicing)?;
    match request.slicing {
        Some(slicing) => info!(
            slice_id = slicing.slice_id,
            number_of_slices = slicing.number_of_slices,
            entities = selected.len(),
            "entities in slice"
        ),
        None => info!(entities = selected.len(), "entities in single slice"),
    }

    let remaining = pending_entities(&lci_dir, &selected);
    let mut summary = DispatchSummary {
        manifest_len: codes.len(),
        slice_len: selected.len(),
        already_complete: selected.len() - remaining.len(),
        chunk_sizes: Vec::new(),
        outcomes: Vec::new(),
    };
    if remaining.is_empty() {
        info!("no result arrays to generate");
        return Ok(summary);
    }
    info!(pending = remaining.len(), "result arrays to generate");

    let assignments: Vec<WorkerAssignment> = worker_sublists(&remaining, request.parallel_jobs)
        .into_iter()
        .enumerate()
        .map(|(worker_id, entities)| WorkerAssignment {
            worker_id,
            project_dir: ctx.project_dir().to_path_buf(),
            database: ctx.database().to_string(),
            result_dir: ctx.result_dir().to_path_buf(),
            result_type: request.result_type,
            batch: request.batch,
            precision: request.precision,
            entities,
        })
        .collect();
    summary.chunk_sizes = assignments.iter().map(|a| a.entities.len()).collect();
    info!(chunks = assignments.len(), sizes = ?summary.chunk_sizes, "dispatching workers");

    summary.outcomes = launcher.launch(&assignments, &lci_dir.join("workers"))?;
    for outcome in &summary.outcomes {
        match outcome {
            WorkerOutcome::Finished(report) => debug!(
                worker_id = report.worker_id,
                completed = report.completed.len(),
                failed = report.failed.len(),
                nan_columns = report.nan_columns,
                seconds = report.total_seconds,
                "worker report"
            ),
            WorkerOutcome::Crashed { worker_id, entities, error } => warn!(
                worker_id,
                entities,
                error = %error,
                "worker crashed, entities left for the next run"
            ),
        }
    }
    info!(
        completed = summary.completed(),
        unfinished = summary.unfinished(),
        "dispatch finished"
    );
    Ok(summary)
}
