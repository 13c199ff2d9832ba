#![allow(dead_code)]

use std::path::Path;

use preagg_core::array::{array_file_name, ResultArray};
use preagg_core::context::{ProjectContext, ResultType, BIO_DICT, ORDERED_ACTIVITY_CODES};
use preagg_core::serde::write_json;
use preagg_core::{BatchKey, IdentifierPair};
use preagg_lcia::CharacterizationMethod;
use preagg_samples::MatrixIndex;

/// Results tree with three flows and inventories for `a` and `b` in batch 0.
pub fn build_results(root: &Path) -> ProjectContext {
    let result_dir = root.join("results");
    let ctx = ProjectContext::new(root.join("project"), "db", &result_dir);
    write_json(&ctx.common_file(ORDERED_ACTIVITY_CODES), &["a", "b"]).expect("codes");
    MatrixIndex::from_pairs([
        (IdentifierPair::new("bio", "co2"), 0),
        (IdentifierPair::new("bio", "ch4"), 1),
        (IdentifierPair::new("bio", "water"), 2),
    ])
    .store(&ctx.common_file(BIO_DICT))
    .expect("bio dict");

    let lci_dir = ctx.lci_dir(ResultType::Probabilistic, BatchKey::new(0).unwrap());
    inventory(1.0)
        .write(&lci_dir.join(array_file_name("a")))
        .expect("inventory a");
    inventory(2.0)
        .write(&lci_dir.join(array_file_name("b")))
        .expect("inventory b");
    ctx
}

/// `co2 = k, ch4 = k / 10, water = 5` over two iterations.
pub fn inventory(k: f64) -> ResultArray {
    ResultArray::from_rows(&[vec![k, 2.0 * k], vec![k / 10.0, k / 5.0], vec![5.0, 5.0]])
        .expect("inventory")
}

pub fn gwp() -> CharacterizationMethod {
    CharacterizationMethod::new(
        vec!["IPCC 2013".into(), "climate change".into(), "GWP 100a".into()],
        [
            (IdentifierPair::new("bio", "co2"), 1.0),
            (IdentifierPair::new("bio", "ch4"), 30.0),
            (IdentifierPair::new("bio", "sf6"), 23_500.0),
        ],
    )
    .expect("method")
}
