use std::error::Error;

use clap::Args;
use preagg_core::seed::BatchKey;
use preagg_samples::{
    generate_base_resources, BaseResourceRequest, ResourceRegistry, UncertaintySampler,
};
use tracing::info;

use crate::config::PreaggConfig;

#[derive(Args, Debug)]
pub struct BaseResourcesArgs {
    /// Batch number in `0..=14`.
    #[arg(long)]
    pub batch: u32,
    /// Number of samples drawn per parameter.
    #[arg(long)]
    pub iterations: usize,
    /// Fail instead of replacing an existing package.
    #[arg(long)]
    pub keep_existing: bool,
}

pub fn run(config: &PreaggConfig, args: &BaseResourcesArgs) -> Result<(), Box<dyn Error>> {
    let ctx = config.context()?;
    let mut registry = ResourceRegistry::open_in(&ctx)?;
    let request = BaseResourceRequest {
        overwrite: !args.keep_existing,
        base_name: config.base_name.clone(),
        ..BaseResourceRequest::new(BatchKey::new(args.batch)?, args.iterations)
    };
    let generated =
        generate_base_resources(&ctx, &mut registry, &request, UncertaintySampler::from_seed)?;
    info!(
        campaign = %generated.campaign.name,
        resource = %generated.resource.name,
        path = %generated.resource.path.display(),
        package_id = %generated.package_id,
        "base resources ready"
    );
    Ok(())
}
