//! Per-entity computation and the worker loop run by each dispatch worker.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use preagg_core::array::{array_file_name, Precision, StagedArray};
use preagg_core::context::{ProjectContext, ResultType};
use preagg_core::errors::{io_error, ErrorInfo, PreaggError};
use preagg_core::seed::BatchKey;
use preagg_core::serde::{read_json, write_json};
use preagg_samples::{load_flow_index, load_package, ResourceRegistry};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::evaluator::{EvaluationResources, Evaluator, SESSION_CLOSED};

/// Work handed to one worker. Serialized as the worker's assignment file when
/// workers run as separate processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    /// Worker index within the dispatch, used in logs.
    pub worker_id: usize,
    /// Project directory.
    pub project_dir: PathBuf,
    /// Evaluated database.
    pub database: String,
    /// Result directory.
    pub result_dir: PathBuf,
    /// Result tree written.
    #[serde(default)]
    pub result_type: ResultType,
    /// Batch whose campaign supplies the samples.
    pub batch: BatchKey,
    /// Precision of the stored arrays.
    #[serde(default)]
    pub precision: Precision,
    /// Entity codes, processed in order.
    pub entities: Vec<String>,
}

impl WorkerAssignment {
    /// Rebuilds the project context.
    pub fn context(&self) -> ProjectContext {
        ProjectContext::new(&self.project_dir, &self.database, &self.result_dir)
    }

    /// Reads an assignment file.
    pub fn load(path: &Path) -> Result<Self, PreaggError> {
        read_json(path)
    }

    /// Writes the assignment file.
    pub fn store(&self, path: &Path) -> Result<(), PreaggError> {
        write_json(path, self)
    }
}

/// Entity skipped by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    /// Entity code.
    pub entity: String,
    /// Rendered error.
    pub error: String,
}

/// Outcome of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Worker index.
    pub worker_id: usize,
    /// Iterations per entity.
    pub iterations: usize,
    /// Entities whose result was promoted.
    pub completed: Vec<String>,
    /// Entities skipped after an error.
    pub failed: Vec<EntityFailure>,
    /// Iterations stored as NaN columns across all completed entities.
    pub nan_columns: usize,
    /// Wall time spent on completed entities.
    pub total_seconds: f64,
}

impl WorkerReport {
    /// Mean seconds per completed entity.
    pub fn average_seconds(&self) -> Option<f64> {
        (!self.completed.is_empty()).then(|| self.total_seconds / self.completed.len() as f64)
    }
}

/// Result of computing one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityOutcome {
    /// Iterations that failed and were stored as NaN.
    pub nan_columns: usize,
}

/// Path of the report written next to an assignment file.
pub fn report_path(assignment_path: &Path) -> PathBuf {
    assignment_path.with_extension("report.json")
}

/// Resolves the sample packages, iteration count and row count shared by
/// every entity of the batch.
///
/// Probabilistic runs require the batch campaign with at least one resource,
/// all agreeing on the iteration count. Deterministic runs use a single
/// iteration and no packages.
pub fn resolve_resources(
    ctx: &ProjectContext,
    result_type: ResultType,
    batch: BatchKey,
) -> Result<EvaluationResources, PreaggError> {
    let rows = load_flow_index(ctx)?.len();
    if result_type == ResultType::Deterministic {
        return Ok(EvaluationResources {
            result_type,
            package_paths: Vec::new(),
            iterations: 1,
            rows,
        });
    }

    let mut registry = ResourceRegistry::open_in(ctx)?;
    let campaign = registry.get_or_create_campaign(batch, true)?;
    let resources = registry.campaign_resources(&campaign)?;
    if resources.is_empty() {
        return Err(PreaggError::Config(
            ErrorInfo::new("campaign-empty", "campaign has no sample resources")
                .with_context("campaign", campaign.name.clone())
                .with_hint("run base-resources first"),
        ));
    }
    let mut ncols = BTreeSet::new();
    for resource in &resources {
        ncols.insert(load_package(&resource.path)?.ncols);
    }
    let iterations = match ncols.len() {
        1 => ncols.into_iter().next().unwrap_or_default(),
        _ => {
            return Err(PreaggError::Config(
                ErrorInfo::new("iterations-inconsistent", "campaign resources disagree on iterations")
                    .with_context("campaign", campaign.name.clone())
                    .with_context(
                        "ncols",
                        ncols.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                    ),
            ))
        }
    };
    Ok(EvaluationResources {
        result_type,
        package_paths: resources.into_iter().map(|resource| resource.path).collect(),
        iterations,
        rows,
    })
}

/// Computes and stores the result array of one entity.
///
/// The array is staged under `<lci_dir>/temp` and written one column per
/// iteration. A failed or malformed draw becomes a NaN column; the shape is
/// verified before the file is moved to `<lci_dir>/<code>.bin`. A session
/// that closes before the first draw or fails to finish leaves no result.
pub fn compute_entity(
    ctx: &ProjectContext,
    evaluator: &dyn Evaluator,
    entity: &str,
    resources: &EvaluationResources,
    lci_dir: &Path,
    precision: Precision,
) -> Result<EntityOutcome, PreaggError> {
    let file_name = array_file_name(entity);
    let staging_path = lci_dir.join("temp").join(&file_name);
    let mut session = evaluator.open(ctx, entity, resources)?;
    let mut staged = StagedArray::create(&staging_path, resources.rows, resources.iterations, precision)?;

    let mut nan_columns = 0;
    for iteration in 0..resources.iterations {
        let column = session.next_draw().and_then(|inventory| {
            let sums = inventory.row_sums();
            if sums.len() == resources.rows {
                Ok(sums)
            } else {
                Err(PreaggError::Evaluation(
                    ErrorInfo::new("draw-shape", "draw has the wrong number of rows")
                        .with_context("expected", resources.rows.to_string())
                        .with_context("actual", sums.len().to_string()),
                ))
            }
        });
        match column {
            Ok(values) => staged.write_column(iteration, &values)?,
            Err(err) if iteration == 0 && err.code() == SESSION_CLOSED => {
                return discard_entity(staged, err);
            }
            Err(err) => {
                warn!(entity, iteration, error = %err, "iteration failed, storing NaN column");
                staged.fill_column(iteration, f64::NAN)?;
                nan_columns += 1;
            }
        }
    }
    if let Err(err) = session.finish() {
        return discard_entity(staged, err);
    }
    drop(session);

    staged.promote(&lci_dir.join(&file_name), (resources.rows, resources.iterations))?;
    Ok(EntityOutcome { nan_columns })
}

fn discard_entity(staged: StagedArray, err: PreaggError) -> Result<EntityOutcome, PreaggError> {
    if let Err(discard_err) = staged.discard() {
        warn!(error = %discard_err, "failed to remove staged array");
    }
    Err(err)
}

/// Processes every entity of an assignment in order.
///
/// Setup failures (context, campaign, resources) abort the worker. Entity
/// failures are logged and recorded, and the worker moves on.
pub fn run_worker(
    assignment: &WorkerAssignment,
    evaluator: &dyn Evaluator,
) -> Result<WorkerReport, PreaggError> {
    let ctx = assignment.context();
    let resources = resolve_resources(&ctx, assignment.result_type, assignment.batch)?;
    let lci_dir = ctx.lci_dir(assignment.result_type, assignment.batch);
    let temp_dir = lci_dir.join("temp");
    fs::create_dir_all(&temp_dir).map_err(|err| io_error("lci-dir", &temp_dir, err))?;
    info!(
        worker_id = assignment.worker_id,
        iterations = resources.iterations,
        entities = assignment.entities.len(),
        "worker started"
    );

    let mut report = WorkerReport {
        worker_id: assignment.worker_id,
        iterations: resources.iterations,
        completed: Vec::new(),
        failed: Vec::new(),
        nan_columns: 0,
        total_seconds: 0.0,
    };
    for entity in &assignment.entities {
        let started = Instant::now();
        match compute_entity(&ctx, evaluator, entity, &resources, &lci_dir, assignment.precision) {
            Ok(outcome) => {
                report.total_seconds += started.elapsed().as_secs_f64();
                report.nan_columns += outcome.nan_columns;
                report.completed.push(entity.clone());
            }
            Err(err) => {
                error!(entity = %entity, worker_id = assignment.worker_id, error = %err, "entity failed");
                report.failed.push(EntityFailure {
                    entity: entity.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        worker_id = report.worker_id,
        completed = report.completed.len(),
        failed = report.failed.len(),
        iterations = report.iterations,
        total_minutes = report.total_seconds / 60.0,
        average_minutes = report.average_seconds().unwrap_or_default() / 60.0,
        "worker finished"
    );
    Ok(report)
}

/// Worker process entry point: runs the assignment stored at `path` and
/// writes the report next to it.
pub fn run_assignment_file(path: &Path, evaluator: &dyn Evaluator) -> Result<WorkerReport, PreaggError> {
    let assignment = WorkerAssignment::load(path)?;
    let report = run_worker(&assignment, evaluator)?;
    write_json(&report_path(path), &report)?;
    Ok(report)
}
