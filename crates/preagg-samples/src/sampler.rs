//! Per-parameter random draws.

use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::RngHandle;
use rand::distributions::Distribution;
use rand_distr::{LogNormal, Normal, Triangular, Uniform};

use crate::reference::ParamRecord;

/// Produces one value per parameter record for every call.
///
/// Implementations own their RNG so consecutive calls yield consecutive
/// iterations of the same stream.
pub trait ParameterSampler {
    /// Draws one value for each record, in table order.
    fn next_draw(&mut self, params: &[ParamRecord]) -> Result<Vec<f64>, PreaggError>;
}

/// Sampler for the standard uncertainty types.
///
/// | id | distribution | fields used            |
/// |----|--------------|------------------------|
/// | 0  | undefined    | amount                 |
/// | 1  | none         | amount                 |
/// | 2  | lognormal    | loc, scale             |
/// | 3  | normal       | loc, scale             |
/// | 4  | uniform      | minimum, maximum       |
/// | 5  | triangular   | minimum, maximum, loc  |
#[derive(Debug, Clone)]
pub struct UncertaintySampler {
    rng: RngHandle,
}

impl UncertaintySampler {
    /// Creates a sampler seeded with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: RngHandle::from_seed(seed),
        }
    }

    fn draw_one(&mut self, record: &ParamRecord) -> Result<f64, PreaggError> {
        let value = match record.uncertainty_type {
            0 | 1 => return Ok(record.amount),
            2 => {
                let loc = record.loc.unwrap_or_else(|| record.amount.abs().ln());
                let scale = required(record, record.scale, "scale")?;
                let dist = LogNormal::new(loc, scale).map_err(|err| invalid(record, err))?;
                let magnitude = dist.sample(self.rng.inner_mut());
                if record.negative {
                    -magnitude
                } else {
                    magnitude
                }
            }
            3 => {
                let loc = record.loc.unwrap_or(record.amount);
                let scale = required(record, record.scale, "scale")?;
                let dist = Normal::new(loc, scale).map_err(|err| invalid(record, err))?;
                dist.sample(self.rng.inner_mut())
            }
            4 => {
                let (low, high) = bounds(record)?;
                Uniform::new_inclusive(low, high).sample(self.rng.inner_mut())
            }
            5 => {
                let (low, high) = bounds(record)?;
                let mode = record.loc.unwrap_or(record.amount);
                let dist = Triangular::new(low, high, mode).map_err(|err| invalid(record, err))?;
                dist.sample(self.rng.inner_mut())
            }
            other => {
                return Err(PreaggError::Config(
                    ErrorInfo::new("uncertainty-unsupported", "unsupported uncertainty type")
                        .with_context("uncertainty_type", other.to_string())
                        .with_context("input", record.input.to_string())
                        .with_context("output", record.output.to_string()),
                ))
            }
        };
        Ok(value)
    }
}

impl ParameterSampler for UncertaintySampler {
    fn next_draw(&mut self, params: &[ParamRecord]) -> Result<Vec<f64>, PreaggError> {
        params.iter().map(|record| self.draw_one(record)).collect()
    }
}

fn required(record: &ParamRecord, value: Option<f64>, field: &str) -> Result<f64, PreaggError> {
    value.ok_or_else(|| {
        PreaggError::Config(
            ErrorInfo::new("uncertainty-field-missing", "distribution parameter missing")
                .with_context("field", field)
                .with_context("input", record.input.to_string())
                .with_context("output", record.output.to_string()),
        )
    })
}

fn bounds(record: &ParamRecord) -> Result<(f64, f64), PreaggError> {
    let low = required(record, record.minimum, "minimum")?;
    let high = required(record, record.maximum, "maximum")?;
    if !low.is_finite() || !high.is_finite() || low > high {
        return Err(invalid(record, "bounds must be finite with minimum <= maximum"));
    }
    Ok((low, high))
}

fn invalid(record: &ParamRecord, err: impl ToString) -> PreaggError {
    PreaggError::Config(
        ErrorInfo::new("uncertainty-invalid", "invalid distribution parameters")
            .with_context("input", record.input.to_string())
            .with_context("output", record.output.to_string())
            .with_hint(err.to_string()),
    )
}
