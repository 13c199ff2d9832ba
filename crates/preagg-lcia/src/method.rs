//! Characterization methods and the row selections derived from them.

use std::path::Path;

use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::ids::IdentifierPair;
use preagg_core::serde::read_json;
use preagg_samples::MatrixIndex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

const DIGEST_PREFIX: usize = 12;

/// Weight applied to one elementary flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationFactor {
    /// Characterized flow.
    pub flow: IdentifierPair,
    /// Characterization factor.
    pub factor: f64,
}

/// Named list of characterization factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationMethod {
    /// Hierarchical method name, e.g. `["IPCC 2013", "climate change", "GWP 100a"]`.
    pub name: Vec<String>,
    /// Factors in method order.
    pub factors: Vec<CharacterizationFactor>,
}

impl CharacterizationMethod {
    /// Builds a method from its name parts and `(flow, factor)` pairs.
    pub fn new(
        name: Vec<String>,
        factors: impl IntoIterator<Item = (IdentifierPair, f64)>,
    ) -> Result<Self, PreaggError> {
        let method = Self {
            name,
            factors: factors
                .into_iter()
                .map(|(flow, factor)| CharacterizationFactor { flow, factor })
                .collect(),
        };
        method.validate()?;
        Ok(method)
    }

    /// Loads a method from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PreaggError> {
        let method: Self = read_json(path)?;
        method.validate().map_err(|err| {
            PreaggError::Config(err.info().clone().with_path(path))
        })?;
        Ok(method)
    }

    fn validate(&self) -> Result<(), PreaggError> {
        if self.name.is_empty() || self.name.iter().any(|part| part.trim().is_empty()) {
            return Err(PreaggError::Config(ErrorInfo::new(
                "method-name",
                "method name parts must be non-empty",
            )));
        }
        Ok(())
    }

    /// Stable directory name for the method.
    ///
    /// The first word is kept whole, every following word contributes its
    /// first character (or the whole word when it starts with a digit), and a
    /// digest of the full name disambiguates methods sharing a prefix.
    pub fn abbreviation(&self) -> String {
        let joined = self.name.join(" ");
        let mut words = joined
            .split_whitespace()
            .map(|word| {
                word.chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|word| !word.is_empty());
        let mut abbreviation = words.next().unwrap_or_default();
        for word in words {
            if word.starts_with(|c: char| c.is_ascii_digit()) {
                abbreviation.push_str(&word);
            } else {
                abbreviation.extend(word.chars().next());
            }
        }
        let digest = format!("{:x}", Sha256::digest(self.name.join("-").as_bytes()));
        format!("{abbreviation}.{}", &digest[..DIGEST_PREFIX])
    }
}

/// Rows of the flow matrix that a method characterizes, with their weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Row indices into the inventory array.
    pub row_indices: Vec<usize>,
    /// Weight of each selected row.
    pub weights: Vec<f64>,
}

impl Selection {
    /// Resolves the factors of `method` against the reference flow index.
    /// Flows the index does not know are skipped.
    pub fn from_method(method: &CharacterizationMethod, flows: &MatrixIndex) -> Self {
        let mut row_indices = Vec::with_capacity(method.factors.len());
        let mut weights = Vec::with_capacity(method.factors.len());
        for factor in &method.factors {
            match flows.get(&factor.flow) {
                Some(row) => {
                    row_indices.push(row);
                    weights.push(factor.factor);
                }
                None => debug!(flow = %factor.flow, "flow absent from inventory, skipped"),
            }
        }
        Self {
            row_indices,
            weights,
        }
    }

    /// Number of selected rows.
    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    /// True when no factor matched the inventory.
    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }

    /// Flow identifiers of the selected rows, in selection order.
    pub fn flow_keys(&self, flows: &MatrixIndex) -> Result<Vec<IdentifierPair>, PreaggError> {
        let reverse = flows.reverse();
        self.row_indices
            .iter()
            .map(|row| {
                reverse.get(row).cloned().ok_or_else(|| {
                    PreaggError::Coordinate(
                        ErrorInfo::new("selection-row-unmapped", "selected row has no flow")
                            .with_context("row", row.to_string()),
                    )
                })
            })
            .collect()
    }
}
