#![allow(dead_code)]

use std::path::Path;

use preagg_core::context::{
    DatabaseInfo, ProjectContext, ProjectManifest, ACTIVITY_DICT, BIO_DICT, BIO_PARAMS,
    ORDERED_ACTIVITY_CODES, PRODUCT_DICT, TECH_PARAMS,
};
use preagg_core::serde::write_json;
use preagg_core::IdentifierPair;
use preagg_samples::{IdentifierMapping, MatrixIndex, ParamRecord};

pub const DATABASE: &str = "db";

/// Three activities `a`, `b`, `c` and two elementary flows `f1`, `f2`.
pub fn build_project(root: &Path) -> ProjectContext {
    let project_dir = root.join("project");
    let result_dir = root.join("results");
    std::fs::create_dir_all(&result_dir).expect("result dir");

    let mut manifest = ProjectManifest::new("demo");
    manifest.biosphere = Some("bio".into());
    manifest
        .databases
        .insert(DATABASE.into(), DatabaseInfo { activities: 3 });
    manifest.store(&project_dir).expect("manifest");

    let ctx = ProjectContext::new(&project_dir, DATABASE, &result_dir);
    let activity = |code: &str| IdentifierPair::new(DATABASE, code);
    let flow = |code: &str| IdentifierPair::new("bio", code);

    write_json(&ctx.common_file(ORDERED_ACTIVITY_CODES), &["a", "b", "c"]).expect("codes");
    let activities = MatrixIndex::from_pairs([(activity("a"), 0), (activity("b"), 1), (activity("c"), 2)]);
    activities.store(&ctx.common_file(ACTIVITY_DICT)).expect("activity dict");
    activities.store(&ctx.common_file(PRODUCT_DICT)).expect("product dict");
    MatrixIndex::from_pairs([(flow("f1"), 0), (flow("f2"), 1)])
        .store(&ctx.common_file(BIO_DICT))
        .expect("bio dict");
    IdentifierMapping::from_pairs([
        (1, activity("a")),
        (2, activity("b")),
        (3, activity("c")),
        (4, flow("f1")),
        (5, flow("f2")),
    ])
    .store(&ctx.common_file(preagg_core::context::IO_MAPPING))
    .expect("mapping");

    let mut exchange = ParamRecord::fixed(1, 2, 1, 0.5);
    exchange.uncertainty_type = 3;
    exchange.loc = Some(0.5);
    exchange.scale = Some(0.05);
    let tech = vec![
        ParamRecord::fixed(1, 1, 0, 1.0),
        ParamRecord::fixed(2, 2, 0, 1.0),
        ParamRecord::fixed(3, 3, 0, 1.0),
        exchange,
    ];
    write_json(&ctx.common_file(TECH_PARAMS), &tech).expect("tech params");

    let mut emission = ParamRecord::fixed(4, 1, 2, 2.0);
    emission.uncertainty_type = 2;
    emission.loc = Some(2f64.ln());
    emission.scale = Some(0.1);
    let bio = vec![emission, ParamRecord::fixed(5, 3, 2, 1.0)];
    write_json(&ctx.common_file(BIO_PARAMS), &bio).expect("bio params");
    ctx
}
