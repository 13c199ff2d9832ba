//! Translation of parameter tables into sampled matrices with stable
//! identifier coordinates.

use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::ids::CoordinateTriple;
use serde::{Deserialize, Serialize};

use crate::reference::{IdentifierMapping, ParamRecord, TypeTable};
use crate::sampler::ParameterSampler;

/// Dense `entries × iterations` sample matrix stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl SampleMatrix {
    /// Zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix from row-major values.
    pub fn from_row_major(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, PreaggError> {
        if values.len() != rows * cols {
            return Err(PreaggError::Config(
                ErrorInfo::new("sample-shape", "sample values do not match the matrix shape")
                    .with_context("rows", rows.to_string())
                    .with_context("cols", cols.to_string())
                    .with_context("values", values.len().to_string()),
            ));
        }
        Ok(Self { rows, cols, values })
    }

    /// Number of sampled entries.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of iterations.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.values[row * self.cols + col])
    }

    /// All draws of one entry.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    /// One draw across every entry.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows)
            .map(|row| self.values[row * self.cols + col])
            .collect()
    }

    fn set_column(&mut self, col: usize, draw: &[f64]) {
        for (row, value) in draw.iter().enumerate() {
            self.values[row * self.cols + col] = *value;
        }
    }
}

/// Resolves parameter tables against the identifier mapping and type table.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTranslator<'a> {
    mapping: &'a IdentifierMapping,
    types: &'a TypeTable,
}

impl<'a> CoordinateTranslator<'a> {
    /// Borrows the reverse mappings used for every translation.
    pub fn new(mapping: &'a IdentifierMapping, types: &'a TypeTable) -> Self {
        Self { mapping, types }
    }

    /// Coordinates of every record, in table order.
    pub fn coordinates(&self, params: &[ParamRecord]) -> Result<Vec<CoordinateTriple>, PreaggError> {
        params
            .iter()
            .map(|record| {
                Ok(CoordinateTriple {
                    input: self.mapping.resolve(record.input)?.clone(),
                    output: self.mapping.resolve(record.output)?.clone(),
                    kind: self.types.label(record.type_code)?.to_string(),
                })
            })
            .collect()
    }

    /// Draws `iterations` columns from `sampler` and pairs them with the
    /// resolved coordinates.
    ///
    /// Coordinates are resolved before any draw, so a missing identifier or
    /// type code fails without consuming the sampler.
    pub fn translate(
        &self,
        params: &[ParamRecord],
        iterations: usize,
        sampler: &mut dyn ParameterSampler,
    ) -> Result<(SampleMatrix, Vec<CoordinateTriple>), PreaggError> {
        let coordinates = self.coordinates(params)?;
        let mut samples = SampleMatrix::zeros(params.len(), iterations);
        for iteration in 0..iterations {
            let draw = sampler.next_draw(params)?;
            if draw.len() != params.len() {
                return Err(PreaggError::Config(
                    ErrorInfo::new("sample-length", "sampler returned the wrong number of values")
                        .with_context("expected", params.len().to_string())
                        .with_context("actual", draw.len().to_string())
                        .with_context("iteration", iteration.to_string()),
                ));
            }
            samples.set_column(iteration, &draw);
        }
        Ok((samples, coordinates))
    }
}
