//! Seam between the dispatch engine and the solver producing raw inventories.

use std::path::PathBuf;

use preagg_core::context::{ProjectContext, ResultType};
use preagg_core::errors::{ErrorInfo, PreaggError};

/// Resources shared by every entity a worker evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResources {
    /// Result tree the draws are written to.
    pub result_type: ResultType,
    /// Sample resource packages of the batch campaign, in campaign order.
    pub package_paths: Vec<PathBuf>,
    /// Draws requested per entity.
    pub iterations: usize,
    /// Expected length of each draw after summing across columns.
    pub rows: usize,
}

/// Raw inventory of one draw: rows are measurable quantities, columns are
/// contributing processes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawInventory {
    rows: Vec<Vec<f64>>,
}

impl RawInventory {
    /// Wraps row vectors.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the inventory has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sums each row across the column axis.
    pub fn row_sums(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.iter().sum()).collect()
    }
}

/// Error code of a session that cannot produce any draw. Returned from the
/// first [`DrawSession::next_draw`], it fails the whole entity.
pub const SESSION_CLOSED: &str = "session-closed";

/// Stream of draws for one entity.
pub trait DrawSession {
    /// Produces the next draw. An error only affects the current iteration,
    /// except [`SESSION_CLOSED`] on the first draw.
    fn next_draw(&mut self) -> Result<RawInventory, PreaggError>;

    /// Called after the last draw, before the result is stored. An error
    /// discards the entity's result.
    fn finish(&mut self) -> Result<(), PreaggError> {
        Ok(())
    }
}

/// Opens draw sessions for entities.
///
/// Implementations must index rows exactly as the reference flow mapping
/// does, since results are matched to flows by row position.
pub trait Evaluator: Send + Sync {
    /// Prepares the evaluation of `entity`. An error here skips the entity.
    fn open(
        &self,
        ctx: &ProjectContext,
        entity: &str,
        resources: &EvaluationResources,
    ) -> Result<Box<dyn DrawSession + '_>, PreaggError>;
}

/// Builds an evaluation error scoped to an entity.
pub fn evaluation_error(code: &str, entity: &str, message: impl Into<String>) -> PreaggError {
    PreaggError::Evaluation(ErrorInfo::new(code, message).with_context("entity", entity))
}
