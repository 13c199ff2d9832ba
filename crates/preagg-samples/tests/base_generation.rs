mod fixtures;

use preagg_core::{derive_seed, BatchKey, PreaggError};
use preagg_samples::{
    generate_balancing_resources, generate_base_resources, load_group, load_package,
    BalancingGenerator, BalancingRequest, BaseResourceRequest, MatrixGroup, ResourceRegistry,
    SampleMatrix, UncertaintySampler,
};

#[test]
fn base_resources_join_the_batch_campaign() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = fixtures::build_project(dir.path());
    let mut registry = ResourceRegistry::open_in(&ctx).expect("registry");
    let request = BaseResourceRequest::new(BatchKey::new(2).unwrap(), 6);
    let generated = generate_base_resources(&ctx, &mut registry, &request, UncertaintySampler::from_seed)
        .expect("generate");

    assert_eq!(generated.resource.name, "base_2");
    assert_eq!(generated.campaign.name, "c2");
    assert!(generated.newly_attached);
    let manifest = load_package(&generated.resource.path).unwrap();
    assert_eq!(manifest.ncols, 6);
    assert_eq!(manifest.seed, Some(314));
    assert_eq!(load_group(&generated.resource.path, "biosphere").unwrap().samples.rows(), 2);

    let again = generate_base_resources(&ctx, &mut registry, &request, UncertaintySampler::from_seed)
        .expect("regenerate");
    assert!(!again.newly_attached);
    assert_eq!(again.resource.id, generated.resource.id);
    assert_eq!(registry.campaign_resources(&again.campaign).unwrap().len(), 1);
}

#[test]
fn base_resources_are_reproducible() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = fixtures::build_project(dir.path());
    let mut registry = ResourceRegistry::open_in(&ctx).unwrap();
    let request = BaseResourceRequest::new(BatchKey::new(0).unwrap(), 3);
    let first = generate_base_resources(&ctx, &mut registry, &request, UncertaintySampler::from_seed).unwrap();
    let tech = load_group(&first.resource.path, "technosphere").unwrap();
    generate_base_resources(&ctx, &mut registry, &request, UncertaintySampler::from_seed).unwrap();
    assert_eq!(load_group(&first.resource.path, "technosphere").unwrap(), tech);
}

#[test]
fn missing_common_files_stop_generation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = fixtures::build_project(dir.path());
    std::fs::remove_file(ctx.common_file("bio_params.json")).unwrap();
    let mut registry = ResourceRegistry::open_in(&ctx).unwrap();
    let err = generate_base_resources(
        &ctx,
        &mut registry,
        &BaseResourceRequest::new(BatchKey::new(0).unwrap(), 2),
        UncertaintySampler::from_seed,
    )
    .unwrap_err();
    assert_eq!(err.code(), "common-files-missing");
}

struct ConstantWater {
    seeds: Vec<u64>,
}

impl BalancingGenerator for ConstantWater {
    fn role(&self) -> &str {
        "water"
    }

    fn generate(&mut self, iterations: usize, seed: u64) -> Result<Vec<MatrixGroup>, PreaggError> {
        self.seeds.push(seed);
        Ok(vec![MatrixGroup::new(
            "water",
            SampleMatrix::zeros(0, iterations),
            Vec::new(),
        )])
    }
}

#[test]
fn balancing_requires_base_campaign_when_asked() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = fixtures::build_project(dir.path());
    let mut registry = ResourceRegistry::open_in(&ctx).unwrap();
    let batch = BatchKey::new(1).unwrap();
    let mut request = BalancingRequest {
        batch,
        iterations: 4,
        overwrite: true,
        expect_base: true,
    };
    let mut generators: Vec<Box<dyn BalancingGenerator>> =
        vec![Box::new(ConstantWater { seeds: Vec::new() })];
    let err = generate_balancing_resources(&ctx, &mut registry, &request, &mut generators)
        .unwrap_err();
    assert_eq!(err.code(), "campaign-missing");

    request.expect_base = false;
    let generated =
        generate_balancing_resources(&ctx, &mut registry, &request, &mut generators).unwrap();
    assert_eq!(generated[0].resource.name, "water_1");
    assert_eq!(generated[0].campaign.name, "c1");
    assert_eq!(load_package(&generated[0].resource.path).unwrap().seed, Some(derive_seed(1).unwrap()));
}
