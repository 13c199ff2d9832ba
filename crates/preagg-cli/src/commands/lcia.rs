use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use preagg_core::seed::BatchKey;
use preagg_lcia::{save_all_score_arrays, CharacterizationMethod, ScoreOptions};
use tracing::{info, warn};

use crate::commands::result_type;
use crate::config::{PreaggConfig, PrecisionArg};

#[derive(Args, Debug)]
pub struct LciaArgs {
    /// JSON characterization method.
    #[arg(long)]
    pub method: PathBuf,
    /// Batch number in `0..=14`.
    #[arg(long)]
    pub batch: u32,
    /// Score deterministic results.
    #[arg(long)]
    pub deterministic: bool,
    /// Storage precision of score arrays.
    #[arg(long, value_enum)]
    pub precision: Option<PrecisionArg>,
    /// Skip total scores.
    #[arg(long)]
    pub no_totals: bool,
    /// Skip per-flow scores.
    #[arg(long)]
    pub no_per_exchange: bool,
    /// Require an inventory for every activity in the manifest.
    #[arg(long)]
    pub strict: bool,
}

pub fn run(config: &PreaggConfig, args: &LciaArgs) -> Result<(), Box<dyn Error>> {
    let ctx = config.context()?;
    let method = CharacterizationMethod::load(&args.method)?;
    let options = ScoreOptions {
        result_type: result_type(args.deterministic),
        batch: BatchKey::new(args.batch)?,
        precision: args.precision.map(Into::into).unwrap_or(config.precision),
        totals: !args.no_totals,
        per_exchange: !args.no_per_exchange,
        strict: args.strict,
    };
    let report = save_all_score_arrays(&ctx, &method, &options)?;
    for failure in &report.failed {
        warn!(entity = %failure.entity, error = %failure.error, "entity not scored");
    }
    info!(
        method = %report.abbreviation,
        dir = %report.lcia_dir.display(),
        scored = report.scored.len(),
        "lcia run finished"
    );
    Ok(())
}
