//! Base sample resources: every uncertain technosphere and biosphere entry of
//! the database, drawn with the batch seed.

use preagg_core::context::ProjectContext;
use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::seed::{derive_seed, BatchKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::package::{create_package, MatrixGroup};
use crate::reference::{load_identifier_mapping, load_params, load_type_table, MatrixRole};
use crate::registry::{Campaign, Resource, ResourceRegistry};
use crate::sampler::ParameterSampler;
use crate::translate::CoordinateTranslator;

fn default_base_name() -> String {
    "base".to_string()
}

fn default_overwrite() -> bool {
    true
}

/// Parameters of a base resource generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseResourceRequest {
    /// Batch the samples belong to.
    pub batch: BatchKey,
    /// Number of iterations to draw.
    pub iterations: usize,
    /// Replace an existing package with the same name.
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    /// Prefix of the package name, `{base_name}_{batch}`.
    #[serde(default = "default_base_name")]
    pub base_name: String,
}

impl BaseResourceRequest {
    /// Request with the default name prefix and overwrite enabled.
    pub fn new(batch: BatchKey, iterations: usize) -> Self {
        Self {
            batch,
            iterations,
            overwrite: default_overwrite(),
            base_name: default_base_name(),
        }
    }

    /// Name of the package this request produces.
    pub fn package_name(&self) -> String {
        format!("{}_{}", self.base_name, self.batch)
    }
}

/// Outcome of packaging and registering one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedResource {
    /// Content-derived package id.
    pub package_id: String,
    /// Registry row of the package.
    pub resource: Resource,
    /// Campaign the resource belongs to.
    pub campaign: Campaign,
    /// False when the resource was already a campaign member.
    pub newly_attached: bool,
}

/// Samples the technosphere and biosphere parameter tables of the database,
/// packages them as `{base_name}_{batch}` and attaches the package to the
/// batch campaign, creating the campaign when needed.
///
/// Each table is drawn with a fresh sampler from `sampler_factory` seeded
/// with the batch seed.
pub fn generate_base_resources<S, F>(
    ctx: &ProjectContext,
    registry: &mut ResourceRegistry,
    request: &BaseResourceRequest,
    sampler_factory: F,
) -> Result<GeneratedResource, PreaggError>
where
    S: ParameterSampler,
    F: Fn(u64) -> S,
{
    ctx.check_database()?;
    ctx.check_result_dir()?;
    ctx.check_common_files()?;
    check_iterations(request.iterations)?;
    let seed = derive_seed(request.batch.get())?;

    let mapping = load_identifier_mapping(ctx)?;
    let types = load_type_table(ctx)?;
    let translator = CoordinateTranslator::new(&mapping, &types);

    let mut groups = Vec::with_capacity(2);
    for role in [MatrixRole::Technosphere, MatrixRole::Biosphere] {
        info!(role = role.label(), batch = %request.batch, "generating matrix samples");
        let params = load_params(ctx, role)?;
        let mut sampler = sampler_factory(seed);
        let (samples, coordinates) =
            translator.translate(&params, request.iterations, &mut sampler)?;
        groups.push(MatrixGroup::new(role.label(), samples, coordinates));
    }

    publish_resource(
        ctx,
        registry,
        request.batch,
        false,
        &request.package_name(),
        &groups,
        request.overwrite,
        seed,
    )
}

pub(crate) fn check_iterations(iterations: usize) -> Result<(), PreaggError> {
    if iterations == 0 {
        return Err(PreaggError::Config(ErrorInfo::new(
            "iterations-zero",
            "at least one iteration is required",
        )));
    }
    Ok(())
}

/// Packages `groups` under the presamples directory and attaches the package
/// to the batch campaign.
#[allow(clippy::too_many_arguments)]
pub(crate) fn publish_resource(
    ctx: &ProjectContext,
    registry: &mut ResourceRegistry,
    batch: BatchKey,
    require_campaign: bool,
    name: &str,
    groups: &[MatrixGroup],
    overwrite: bool,
    seed: u64,
) -> Result<GeneratedResource, PreaggError> {
    let campaign = registry.get_or_create_campaign(batch, require_campaign)?;
    let (package_id, path) =
        create_package(name, groups, &ctx.presamples_dir(), overwrite, Some(seed))?;
    let resource = registry.register_resource(name, &path)?;
    let newly_attached = registry.attach(&campaign, &resource)?;
    Ok(GeneratedResource {
        package_id,
        resource,
        campaign,
        newly_attached,
    })
}
