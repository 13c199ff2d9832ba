//! Reference mapping files of a project: matrix indices, identifier mappings,
//! parameter tables and exchange type codes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use preagg_core::context::{
    ProjectContext, ACTIVITY_DICT, BIO_DICT, BIO_PARAMS, IO_MAPPING, ORDERED_ACTIVITY_CODES,
    PRODUCT_DICT, TECH_PARAMS, TYPE_CODES,
};
use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::ids::IdentifierPair;
use preagg_core::serde::{read_json, write_json};
use serde::{Deserialize, Serialize};

/// Sparse matrix whose parameters are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixRole {
    /// Exchanges between processes.
    Technosphere,
    /// Exchanges between processes and elementary flows.
    Biosphere,
}

impl MatrixRole {
    /// Role label stored in packages.
    pub fn label(self) -> &'static str {
        match self {
            MatrixRole::Technosphere => "technosphere",
            MatrixRole::Biosphere => "biosphere",
        }
    }

    fn params_file(self) -> &'static str {
        match self {
            MatrixRole::Technosphere => TECH_PARAMS,
            MatrixRole::Biosphere => BIO_PARAMS,
        }
    }
}

/// One row of a parameter table: a matrix entry and its uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    /// Global index of the supplying process or flow.
    pub input: u64,
    /// Global index of the consuming process.
    pub output: u64,
    /// Numeric exchange type code.
    #[serde(rename = "type")]
    pub type_code: i32,
    /// Deterministic amount.
    pub amount: f64,
    /// Distribution identifier (0 undefined, 1 none, 2 lognormal, 3 normal,
    /// 4 uniform, 5 triangular).
    #[serde(default)]
    pub uncertainty_type: u8,
    /// Location of the distribution: log-mean for lognormal, mode for
    /// triangular.
    #[serde(default)]
    pub loc: Option<f64>,
    /// Spread of the distribution (standard deviation or its log).
    #[serde(default)]
    pub scale: Option<f64>,
    /// Lower bound for bounded distributions.
    #[serde(default)]
    pub minimum: Option<f64>,
    /// Upper bound for bounded distributions.
    #[serde(default)]
    pub maximum: Option<f64>,
    /// Sampled magnitudes are negated when set.
    #[serde(default)]
    pub negative: bool,
}

impl ParamRecord {
    /// Entry without uncertainty.
    pub fn fixed(input: u64, output: u64, type_code: i32, amount: f64) -> Self {
        Self {
            input,
            output,
            type_code,
            amount,
            uncertainty_type: 0,
            loc: None,
            scale: None,
            minimum: None,
            maximum: None,
            negative: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    key: IdentifierPair,
    index: u64,
}

/// Global index → identifier mapping (the reverse of the running identifier
/// counter maintained by the dataset store).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierMapping {
    keys: HashMap<u64, IdentifierPair>,
}

impl IdentifierMapping {
    /// Builds the mapping from `(index, key)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u64, IdentifierPair)>) -> Self {
        Self {
            keys: pairs.into_iter().collect(),
        }
    }

    /// Resolves an index, failing hard when it is unknown.
    pub fn resolve(&self, index: u64) -> Result<&IdentifierPair, PreaggError> {
        self.keys.get(&index).ok_or_else(|| {
            PreaggError::Coordinate(
                ErrorInfo::new("identifier-unmapped", "identifier index missing from mapping")
                    .with_context("index", index.to_string()),
            )
        })
    }

    /// Number of mapped identifiers.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Loads the mapping from a JSON file of `{key, index}` entries.
    pub fn load(path: &Path) -> Result<Self, PreaggError> {
        let entries: Vec<IndexEntry> = read_json(path)?;
        Ok(Self::from_pairs(entries.into_iter().map(|e| (e.index, e.key))))
    }

    /// Stores the mapping, ordered by index.
    pub fn store(&self, path: &Path) -> Result<(), PreaggError> {
        let mut entries: Vec<IndexEntry> = self
            .keys
            .iter()
            .map(|(index, key)| IndexEntry {
                key: key.clone(),
                index: *index,
            })
            .collect();
        entries.sort_by_key(|entry| entry.index);
        write_json(path, &entries)
    }
}

/// Exchange type code → label table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTable {
    labels: BTreeMap<i32, String>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::from_codes([
            ("unknown", -1),
            ("production", 0),
            ("technosphere", 1),
            ("biosphere", 2),
            ("substitution", 3),
        ])
    }
}

impl TypeTable {
    /// Builds the table from `(label, code)` pairs.
    pub fn from_codes<'a>(codes: impl IntoIterator<Item = (&'a str, i32)>) -> Self {
        Self {
            labels: codes
                .into_iter()
                .map(|(label, code)| (code, label.to_string()))
                .collect(),
        }
    }

    /// Label for a code, failing hard when it is unknown.
    pub fn label(&self, code: i32) -> Result<&str, PreaggError> {
        self.labels.get(&code).map(String::as_str).ok_or_else(|| {
            PreaggError::Coordinate(
                ErrorInfo::new("type-code-unmapped", "exchange type code missing from table")
                    .with_context("type_code", code.to_string()),
            )
        })
    }

    /// Loads a `{label: code}` JSON object.
    pub fn load(path: &Path) -> Result<Self, PreaggError> {
        let codes: BTreeMap<String, i32> = read_json(path)?;
        Ok(Self::from_codes(
            codes.iter().map(|(label, code)| (label.as_str(), *code)),
        ))
    }
}

/// Identifier → matrix row or column index (`bio_dict`, `product_dict`,
/// `activity_dict`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixIndex {
    indices: HashMap<IdentifierPair, usize>,
}

impl MatrixIndex {
    /// Builds the index from `(key, position)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (IdentifierPair, usize)>) -> Self {
        Self {
            indices: pairs.into_iter().collect(),
        }
    }

    /// Position of a key.
    pub fn get(&self, key: &IdentifierPair) -> Option<usize> {
        self.indices.get(key).copied()
    }

    /// Number of indexed keys, which is the matrix dimension.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when the index is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Position → key.
    pub fn reverse(&self) -> HashMap<usize, IdentifierPair> {
        self.indices
            .iter()
            .map(|(key, index)| (*index, key.clone()))
            .collect()
    }

    /// True when both indices place the same codes at the same positions,
    /// ignoring namespaces.
    pub fn equivalent_ignoring_namespace(&self, other: &MatrixIndex) -> bool {
        self.by_code() == other.by_code()
    }

    /// Maps positions in `self` to positions in `other`, matching keys by
    /// code so two copies of a database under different names line up.
    pub fn translator(&self, other: &MatrixIndex) -> Result<HashMap<usize, usize>, PreaggError> {
        let other_by_code = other.by_code();
        self.indices
            .iter()
            .map(|(key, index)| {
                other_by_code
                    .get(key.code.as_str())
                    .map(|other_index| (*index, *other_index))
                    .ok_or_else(|| {
                        PreaggError::Coordinate(
                            ErrorInfo::new("code-unmatched", "code missing from other index")
                                .with_context("code", key.code.clone()),
                        )
                    })
            })
            .collect()
    }

    fn by_code(&self) -> HashMap<&str, usize> {
        self.indices
            .iter()
            .map(|(key, index)| (key.code.as_str(), *index))
            .collect()
    }

    /// Loads the index from a JSON file of `{key, index}` entries.
    pub fn load(path: &Path) -> Result<Self, PreaggError> {
        let entries: Vec<IndexEntry> = read_json(path)?;
        Ok(Self::from_pairs(
            entries.into_iter().map(|e| (e.key, e.index as usize)),
        ))
    }

    /// Stores the index, ordered by position.
    pub fn store(&self, path: &Path) -> Result<(), PreaggError> {
        let mut entries: Vec<IndexEntry> = self
            .indices
            .iter()
            .map(|(key, index)| IndexEntry {
                key: key.clone(),
                index: *index as u64,
            })
            .collect();
        entries.sort_by_key(|entry| entry.index);
        write_json(path, &entries)
    }
}

/// Ordered entity codes; the order defines slice partitioning.
pub fn load_ordered_codes(ctx: &ProjectContext) -> Result<Vec<String>, PreaggError> {
    read_json(&ctx.common_file(ORDERED_ACTIVITY_CODES))
}

/// Elementary flow → row mapping; its length is the raw result height.
pub fn load_flow_index(ctx: &ProjectContext) -> Result<MatrixIndex, PreaggError> {
    MatrixIndex::load(&ctx.common_file(BIO_DICT))
}

/// Product → row mapping.
pub fn load_product_index(ctx: &ProjectContext) -> Result<MatrixIndex, PreaggError> {
    MatrixIndex::load(&ctx.common_file(PRODUCT_DICT))
}

/// Activity → column mapping.
pub fn load_activity_index(ctx: &ProjectContext) -> Result<MatrixIndex, PreaggError> {
    MatrixIndex::load(&ctx.common_file(ACTIVITY_DICT))
}

/// Parameter table of one matrix.
pub fn load_params(ctx: &ProjectContext, role: MatrixRole) -> Result<Vec<ParamRecord>, PreaggError> {
    read_json(&ctx.common_file(role.params_file()))
}

/// Global identifier mapping.
pub fn load_identifier_mapping(ctx: &ProjectContext) -> Result<IdentifierMapping, PreaggError> {
    IdentifierMapping::load(&ctx.common_file(IO_MAPPING))
}

/// Type table from `type_codes.json`, or the default table when absent.
pub fn load_type_table(ctx: &ProjectContext) -> Result<TypeTable, PreaggError> {
    let path = ctx.common_file(TYPE_CODES);
    if path.is_file() {
        TypeTable::load(&path)
    } else {
        Ok(TypeTable::default())
    }
}
