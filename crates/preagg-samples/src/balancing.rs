//! Balancing sample resources layered on top of a batch campaign.

use preagg_core::context::ProjectContext;
use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::seed::{derive_seed, BatchKey};
use tracing::info;

use crate::base::{check_iterations, publish_resource, GeneratedResource};
use crate::package::MatrixGroup;
use crate::registry::ResourceRegistry;

/// Source of correlated samples for one balancing role (`water`, `land`).
pub trait BalancingGenerator {
    /// Role name; the package is named `{role}_{batch}`.
    fn role(&self) -> &str;

    /// Draws `iterations` columns from an RNG seeded with `seed`.
    fn generate(&mut self, iterations: usize, seed: u64) -> Result<Vec<MatrixGroup>, PreaggError>;
}

/// Parameters shared by every balancing generator of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancingRequest {
    /// Batch the samples belong to.
    pub batch: BatchKey,
    /// Number of iterations to draw.
    pub iterations: usize,
    /// Replace existing packages.
    pub overwrite: bool,
    /// Fail when the base campaign of the batch does not exist yet.
    pub expect_base: bool,
}

/// Runs each generator with the batch seed and attaches its package to the
/// batch campaign.
pub fn generate_balancing_resources(
    ctx: &ProjectContext,
    registry: &mut ResourceRegistry,
    request: &BalancingRequest,
    generators: &mut [Box<dyn BalancingGenerator>],
) -> Result<Vec<GeneratedResource>, PreaggError> {
    ctx.check_database()?;
    ctx.check_result_dir()?;
    check_iterations(request.iterations)?;
    registry.get_or_create_campaign(request.batch, request.expect_base)?;
    let seed = derive_seed(request.batch.get())?;

    let mut generated = Vec::with_capacity(generators.len());
    for generator in generators.iter_mut() {
        let name = format!("{}_{}", generator.role(), request.batch);
        info!(role = generator.role(), batch = %request.batch, "generating balancing samples");
        let groups = generator.generate(request.iterations, seed)?;
        if let Some(group) = groups
            .iter()
            .find(|group| group.samples.cols() != request.iterations)
        {
            return Err(PreaggError::Config(
                ErrorInfo::new("balancing-iterations", "generator returned the wrong iteration count")
                    .with_context("role", group.role.clone())
                    .with_context("expected", request.iterations.to_string())
                    .with_context("actual", group.samples.cols().to_string()),
            ));
        }
        generated.push(publish_resource(
            ctx,
            registry,
            request.batch,
            request.expect_base,
            &name,
            &groups,
            request.overwrite,
            seed,
        )?);
    }
    Ok(generated)
}
