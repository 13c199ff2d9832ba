//! Scoring every stored inventory of a batch against one method.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use preagg_core::array::{array_file_name, Precision, ResultArray, ARRAY_EXTENSION};
use preagg_core::context::{ProjectContext, ResultType};
use preagg_core::errors::{io_error, ErrorInfo, PreaggError};
use preagg_core::seed::BatchKey;
use preagg_core::serde::write_json;
use preagg_samples::{load_flow_index, load_ordered_codes};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::method::{CharacterizationMethod, Selection};
use crate::score::{score_arrays, ScoreMode};

/// Directory, under the method directory, holding the persisted selection.
pub const METHOD_FILES_DIR: &str = "method_common_files";
/// Flow keys of the selected rows.
pub const EXCHANGE_KEYS_FILE: &str = "exchange_keys.json";
/// Weights of the selected rows.
pub const CFS_FILE: &str = "cfs.json";

/// Scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOptions {
    /// Result tree read and written.
    #[serde(default)]
    pub result_type: ResultType,
    /// Batch of inventories scored.
    pub batch: BatchKey,
    /// Precision of written arrays.
    #[serde(default)]
    pub precision: Precision,
    /// Write total scores.
    pub totals: bool,
    /// Write per-flow scores.
    pub per_exchange: bool,
    /// Require the stored inventories to match the manifest exactly.
    pub strict: bool,
}

impl ScoreOptions {
    /// Lenient probabilistic scoring writing both totals and per-flow arrays.
    pub fn new(batch: BatchKey) -> Self {
        Self {
            result_type: ResultType::default(),
            batch,
            precision: Precision::default(),
            totals: true,
            per_exchange: true,
            strict: false,
        }
    }
}

/// Entity that could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityScoreFailure {
    /// Entity code.
    pub entity: String,
    /// Failure description.
    pub error: String,
}

/// Outcome of [`save_all_score_arrays`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBatchReport {
    /// Method directory name.
    pub abbreviation: String,
    /// Method directory.
    pub lcia_dir: PathBuf,
    /// Selected flows.
    pub selected_rows: usize,
    /// Entities scored, sorted.
    pub scored: Vec<String>,
    /// Entities skipped.
    pub failed: Vec<EntityScoreFailure>,
}

/// Entity codes that have a stored inventory in `lci_dir`, sorted.
///
/// Only `.bin` files count; worker and staging subdirectories are ignored.
pub fn stored_entities(lci_dir: &Path) -> Result<Vec<String>, PreaggError> {
    let entries = fs::read_dir(lci_dir).map_err(|err| io_error("lci-read", lci_dir, err))?;
    let mut codes = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| io_error("lci-read", lci_dir, err))?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(ARRAY_EXTENSION)
        {
            continue;
        }
        if let Some(code) = path.file_stem().and_then(|stem| stem.to_str()) {
            codes.push(code.to_string());
        }
    }
    codes.sort();
    Ok(codes)
}

/// Scores the stored inventory of one entity.
pub fn score_entity(
    ctx: &ProjectContext,
    code: &str,
    method: &CharacterizationMethod,
    options: &ScoreOptions,
    mode: ScoreMode,
) -> Result<ResultArray, PreaggError> {
    ctx.check_result_dir()?;
    let selection = Selection::from_method(method, &load_flow_index(ctx)?);
    let path = ctx
        .lci_dir(options.result_type, options.batch)
        .join(array_file_name(code));
    let raw = ResultArray::read(&path)?;
    score_arrays(&raw, &selection, options.precision, mode)
}

fn lci_dir_checked(ctx: &ProjectContext, options: &ScoreOptions) -> Result<PathBuf, PreaggError> {
    let lci_dir = ctx.lci_dir(options.result_type, options.batch);
    if !lci_dir.is_dir() {
        return Err(PreaggError::Config(
            ErrorInfo::new("lci-missing", "no inventory results for this batch")
                .with_context("result_type", options.result_type.dir_name())
                .with_context("batch", options.batch.to_string())
                .with_hint("run `preagg lci` first"),
        ));
    }
    Ok(lci_dir)
}

fn check_manifest(ctx: &ProjectContext, stored: &[String]) -> Result<(), PreaggError> {
    let expected: BTreeSet<String> = load_ordered_codes(ctx)?.into_iter().collect();
    let found: BTreeSet<String> = stored.iter().cloned().collect();
    if expected == found {
        return Ok(());
    }
    Err(PreaggError::Config(
        ErrorInfo::new(
            "lci-incomplete",
            "stored inventories differ from the activity manifest",
        )
        .with_context("missing", expected.difference(&found).count().to_string())
        .with_context("unexpected", found.difference(&expected).count().to_string()),
    ))
}

/// Scores every stored inventory of the batch and writes totals and per-flow
/// arrays under the method directory.
///
/// Entities that fail to load or score are logged and reported; they never
/// abort the batch.
pub fn save_all_score_arrays(
    ctx: &ProjectContext,
    method: &CharacterizationMethod,
    options: &ScoreOptions,
) -> Result<ScoreBatchReport, PreaggError> {
    ctx.check_result_dir()?;
    let lci_dir = lci_dir_checked(ctx, options)?;
    let entities = stored_entities(&lci_dir)?;
    if options.strict {
        check_manifest(ctx, &entities)?;
    }

    let flows = load_flow_index(ctx)?;
    let selection = Selection::from_method(method, &flows);
    if selection.is_empty() {
        warn!(method = ?method.name, "no characterized flow appears in the inventory");
    }
    let abbreviation = method.abbreviation();
    let lcia_dir = ctx.lcia_dir(options.result_type, &abbreviation);
    let method_files = lcia_dir.join(METHOD_FILES_DIR);
    write_json(&method_files.join(EXCHANGE_KEYS_FILE), &selection.flow_keys(&flows)?)?;
    write_json(&method_files.join(CFS_FILE), &selection.weights)?;

    let batch_dir = options.batch.to_string();
    let totals_dir = lcia_dir.join("totals").join(&batch_dir);
    let per_exchange_dir = lcia_dir.join("per_exchange").join(&batch_dir);
    info!(
        abbreviation = %abbreviation,
        entities = entities.len(),
        selected_rows = selection.len(),
        "scoring inventories"
    );

    let mut report = ScoreBatchReport {
        abbreviation,
        lcia_dir: lcia_dir.clone(),
        selected_rows: selection.len(),
        scored: Vec::new(),
        failed: Vec::new(),
    };
    for entity in entities {
        let file_name = array_file_name(&entity);
        let outcome = ResultArray::read(&lci_dir.join(&file_name)).and_then(|raw| {
            if options.totals {
                score_arrays(&raw, &selection, options.precision, ScoreMode::Total)?
                    .write(&totals_dir.join(&file_name))?;
            }
            if options.per_exchange {
                score_arrays(
                    &raw,
                    &selection,
                    options.precision,
                    ScoreMode::PerRow { expand: false },
                )?
                .write(&per_exchange_dir.join(&file_name))?;
            }
            Ok(())
        });
        match outcome {
            Ok(()) => report.scored.push(entity),
            Err(err) => {
                warn!(entity = %entity, error = %err, "skipping entity");
                report.failed.push(EntityScoreFailure {
                    entity,
                    error: err.to_string(),
                });
            }
        }
    }
    info!(
        scored = report.scored.len(),
        failed = report.failed.len(),
        "scoring finished"
    );
    Ok(report)
}
