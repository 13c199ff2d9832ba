//! Per-slice completion report used to plan resubmissions.

use preagg_core::context::{ProjectContext, ResultType};
use preagg_core::errors::PreaggError;
use preagg_core::seed::BatchKey;
use preagg_samples::load_ordered_codes;
use serde::{Deserialize, Serialize};

use crate::dispatch::pending_entities;
use crate::partition::partition_slices;

/// Completion of one slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceProgress {
    /// Slice index.
    pub slice_id: usize,
    /// Entities in the slice.
    pub entities: usize,
    /// Entities without a complete result.
    pub remaining: usize,
}

/// Completion of every slice of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Batch.
    pub batch: BatchKey,
    /// False when the batch has no result directory yet.
    pub started: bool,
    /// Per-slice counts.
    pub slices: Vec<SliceProgress>,
}

/// Counts remaining entities per slice of `batch`.
pub fn slice_progress(
    ctx: &ProjectContext,
    result_type: ResultType,
    batch: BatchKey,
    number_of_slices: usize,
) -> Result<BatchProgress, PreaggError> {
    let codes = load_ordered_codes(ctx)?;
    let lci_dir = ctx.lci_dir(result_type, batch);
    let slices = partition_slices(&codes, number_of_slices)?
        .iter()
        .enumerate()
        .map(|(slice_id, slice)| SliceProgress {
            slice_id,
            entities: slice.len(),
            remaining: pending_entities(&lci_dir, slice).len(),
        })
        .collect();
    Ok(BatchProgress {
        batch,
        started: lci_dir.is_dir(),
        slices,
    })
}

/// Progress of every batch in `0..=14`.
pub fn progress_overview(
    ctx: &ProjectContext,
    result_type: ResultType,
    number_of_slices: usize,
) -> Result<Vec<BatchProgress>, PreaggError> {
    (0..=BatchKey::MAX)
        .map(|raw| slice_progress(ctx, result_type, BatchKey::new(raw)?, number_of_slices))
        .collect()
}
