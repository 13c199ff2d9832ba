use std::error::Error;

use clap::Args;
use preagg_core::seed::BatchKey;
use preagg_lci::{progress_overview, slice_progress};

use crate::commands::result_type;
use crate::config::PreaggConfig;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Single batch to report; every batch when omitted.
    #[arg(long)]
    pub batch: Option<u32>,
    /// Number of slices the manifest is cut into.
    #[arg(long, default_value_t = 1)]
    pub number_of_slices: usize,
    /// Report deterministic results.
    #[arg(long)]
    pub deterministic: bool,
}

pub fn run(config: &PreaggConfig, args: &ProgressArgs) -> Result<(), Box<dyn Error>> {
    let ctx = config.context()?;
    ctx.check_common_files()?;
    let result_type = result_type(args.deterministic);
    let progress = match args.batch {
        Some(batch) => vec![slice_progress(
            &ctx,
            result_type,
            BatchKey::new(batch)?,
            args.number_of_slices,
        )?],
        None => progress_overview(&ctx, result_type, args.number_of_slices)?
            .into_iter()
            .filter(|batch| batch.started)
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}
