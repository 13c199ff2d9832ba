use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use preagg_samples::{load_package, ResourceRegistry};
use tracing::{info, warn};

use crate::config::PreaggConfig;

#[derive(Args, Debug)]
pub struct RelocateArgs {
    /// Directory now holding the resource packages.
    #[arg(long)]
    pub new_parent: PathBuf,
}

pub fn run(config: &PreaggConfig, args: &RelocateArgs) -> Result<(), Box<dyn Error>> {
    let ctx = config.context()?;
    ctx.check_project()?;
    let mut registry = ResourceRegistry::open_in(&ctx)?;
    let rewritten = registry.relocate_resources(&args.new_parent)?;
    let mut unreadable = 0;
    for resource in registry.list_resources()? {
        if let Err(err) = load_package(&resource.path) {
            warn!(resource = %resource.name, path = %resource.path.display(), error = %err, "package unreadable after relocation");
            unreadable += 1;
        }
    }
    info!(rewritten, unreadable, "relocation finished");
    Ok(())
}
