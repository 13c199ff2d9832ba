//! Worker launchers: separate OS processes, or a rayon pool in-process.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use preagg_core::errors::{io_error, ErrorInfo, PreaggError};
use preagg_core::serde::read_json;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::evaluator::Evaluator;
use crate::worker::{report_path, run_worker, WorkerAssignment, WorkerReport};

/// How one worker ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// The worker ran to completion, possibly skipping entities.
    Finished(WorkerReport),
    /// The worker died or failed during setup; its entities are left for the
    /// next run.
    Crashed {
        /// Worker index.
        worker_id: usize,
        /// Entities assigned to the worker.
        entities: usize,
        /// Failure description.
        error: String,
    },
}

impl WorkerOutcome {
    /// Worker index.
    pub fn worker_id(&self) -> usize {
        match self {
            WorkerOutcome::Finished(report) => report.worker_id,
            WorkerOutcome::Crashed { worker_id, .. } => *worker_id,
        }
    }
}

/// Starts one worker per assignment and blocks until all of them exit.
pub trait WorkerLauncher {
    /// Runs every assignment; `work_dir` may hold per-worker files.
    fn launch(&self, assignments: &[WorkerAssignment], work_dir: &Path) -> Result<Vec<WorkerOutcome>, PreaggError>;
}

/// Runs workers on a rayon pool sized to the number of assignments.
pub struct ThreadLauncher<'a> {
    evaluator: &'a dyn Evaluator,
}

impl<'a> ThreadLauncher<'a> {
    /// Launcher sharing `evaluator` across worker threads.
    pub fn new(evaluator: &'a dyn Evaluator) -> Self {
        Self { evaluator }
    }
}

impl WorkerLauncher for ThreadLauncher<'_> {
    fn launch(&self, assignments: &[WorkerAssignment], _work_dir: &Path) -> Result<Vec<WorkerOutcome>, PreaggError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(assignments.len().max(1))
            .build()
            .map_err(|err| {
                PreaggError::Config(ErrorInfo::new("thread-pool", err.to_string()))
            })?;
        let outcomes = pool.install(|| {
            assignments
                .par_iter()
                .map(|assignment| match run_worker(assignment, self.evaluator) {
                    Ok(report) => WorkerOutcome::Finished(report),
                    Err(err) => {
                        error!(worker_id = assignment.worker_id, error = %err, "worker failed");
                        WorkerOutcome::Crashed {
                            worker_id: assignment.worker_id,
                            entities: assignment.entities.len(),
                            error: err.to_string(),
                        }
                    }
                })
                .collect()
        });
        Ok(outcomes)
    }
}

/// Runs each worker as a separate process.
///
/// Every worker gets `<work_dir>/worker_<id>.json` and is started as
/// `program args... --assignment <file>`; the process is expected to write
/// `worker_<id>.report.json` on success. `RUST_LOG` and the rest of the
/// environment are inherited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    /// Launcher running `program` with `args` before the assignment flag.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn spawn(&self, assignment_path: &Path) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg("--assignment")
            .arg(assignment_path)
            .spawn()
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, assignments: &[WorkerAssignment], work_dir: &Path) -> Result<Vec<WorkerOutcome>, PreaggError> {
        fs::create_dir_all(work_dir).map_err(|err| io_error("worker-dir", work_dir, err))?;
        let mut running = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let path = work_dir.join(format!("worker_{}.json", assignment.worker_id));
            let report = report_path(&path);
            if report.exists() {
                fs::remove_file(&report).map_err(|err| io_error("worker-report-clear", &report, err))?;
            }
            assignment.store(&path)?;
            let child = self.spawn(&path);
            if let Ok(child) = &child {
                info!(worker_id = assignment.worker_id, pid = child.id(), "spawned worker");
            }
            running.push((assignment, path, child));
        }

        let mut outcomes = Vec::with_capacity(running.len());
        for (assignment, path, child) in running {
            let crashed = |error: String| WorkerOutcome::Crashed {
                worker_id: assignment.worker_id,
                entities: assignment.entities.len(),
                error,
            };
            let outcome = match child.and_then(|mut child| child.wait()) {
                Err(err) => crashed(err.to_string()),
                Ok(status) if !status.success() => crashed(format!("worker exited with {status}")),
                Ok(_) => match read_json::<WorkerReport>(&report_path(&path)) {
                    Ok(report) => WorkerOutcome::Finished(report),
                    Err(err) => crashed(err.to_string()),
                },
            };
            if let WorkerOutcome::Crashed { error, .. } = &outcome {
                warn!(worker_id = assignment.worker_id, error = %error, "worker crashed");
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
