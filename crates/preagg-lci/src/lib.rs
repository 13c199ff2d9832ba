//! Resumable, chunked dispatch of per-entity inventory calculations.

#![deny(missing_docs)]

pub mod dispatch;
pub mod evaluator;
pub mod external;
pub mod launcher;
pub mod partition;
pub mod progress;
pub mod worker;

pub use dispatch::{
    dispatch, entity_complete, pending_entities, validate, DispatchRequest, DispatchSummary,
};
pub use evaluator::{DrawSession, EvaluationResources, Evaluator, RawInventory, SESSION_CLOSED};
pub use external::CommandEvaluator;
pub use launcher::{ProcessLauncher, ThreadLauncher, WorkerLauncher, WorkerOutcome};
pub use partition::{ceil_chunks, partition_slices, select_slice, worker_sublists, Slicing};
pub use progress::{progress_overview, slice_progress, BatchProgress, SliceProgress};
pub use worker::{
    compute_entity, resolve_resources, run_assignment_file, run_worker, EntityFailure,
    EntityOutcome, WorkerAssignment, WorkerReport,
};
