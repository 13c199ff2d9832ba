pub mod base;
pub mod lci;
pub mod lcia;
pub mod progress;
pub mod relocate;

use preagg_core::context::ResultType;

/// Result tree selected by the `--deterministic` flag.
pub fn result_type(deterministic: bool) -> ResultType {
    if deterministic {
        ResultType::Deterministic
    } else {
        ResultType::Probabilistic
    }
}
