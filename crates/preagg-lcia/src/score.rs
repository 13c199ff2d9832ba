//! Weighted aggregation of inventory rows into impact scores.

use preagg_core::array::{ArrayValues, Precision, ResultArray};
use preagg_core::errors::{ErrorInfo, PreaggError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::method::Selection;

/// Shape of a scored array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// One row: the weighted column sums.
    Total,
    /// One row per selected flow, or the full inventory height with zeros
    /// outside the selection when `expand` is set.
    PerRow {
        /// Keep the inventory's row count.
        expand: bool,
    },
}

/// Computes `weights ⊙ raw[rows]` and reduces it according to `mode`.
///
/// Results are accumulated in `f64`. When `F32` storage is requested but a
/// finite value would overflow it, the array is kept in `F64` with a warning.
pub fn score_arrays(
    raw: &ResultArray,
    selection: &Selection,
    precision: Precision,
    mode: ScoreMode,
) -> Result<ResultArray, PreaggError> {
    if selection.weights.len() != selection.row_indices.len() {
        return Err(PreaggError::Config(
            ErrorInfo::new("selection-length", "weights and row indices differ in length")
                .with_context("rows", selection.row_indices.len().to_string())
                .with_context("weights", selection.weights.len().to_string()),
        ));
    }
    if let Some(row) = selection.row_indices.iter().find(|row| **row >= raw.rows()) {
        return Err(PreaggError::Config(
            ErrorInfo::new("selection-row-out-of-range", "selected row exceeds the inventory")
                .with_context("row", row.to_string())
                .with_context("inventory_rows", raw.rows().to_string()),
        ));
    }

    let cols = raw.cols();
    let out_rows = match mode {
        ScoreMode::Total => 1,
        ScoreMode::PerRow { expand: false } => selection.len(),
        ScoreMode::PerRow { expand: true } => raw.rows(),
    };
    let mut values = vec![0.0f64; out_rows * cols];
    for col in 0..cols {
        let column = &mut values[col * out_rows..(col + 1) * out_rows];
        for (position, (row, weight)) in selection
            .row_indices
            .iter()
            .zip(&selection.weights)
            .enumerate()
        {
            let scored = raw.get(*row, col) * weight;
            match mode {
                ScoreMode::Total => column[0] += scored,
                ScoreMode::PerRow { expand: false } => column[position] = scored,
                ScoreMode::PerRow { expand: true } => column[*row] += scored,
            }
        }
    }
    ResultArray::new(out_rows, cols, cast(values, precision))
}

fn cast(values: Vec<f64>, precision: Precision) -> ArrayValues {
    match precision {
        Precision::F64 => ArrayValues::F64(values),
        Precision::F32 => {
            let overflows = values
                .iter()
                .any(|v| v.is_finite() && v.abs() > f64::from(f32::MAX));
            if overflows {
                warn!("scores overflow f32, keeping f64");
                ArrayValues::F64(values)
            } else {
                ArrayValues::F32(values.into_iter().map(|v| v as f32).collect())
            }
        }
    }
}
