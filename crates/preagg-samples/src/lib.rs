//! Sample generation for the preagg pipeline: reference mapping files,
//! coordinate translation, resource packages and the campaign registry.

#![deny(missing_docs)]

pub mod balancing;
pub mod base;
pub mod hash;
pub mod package;
pub mod reference;
pub mod registry;
pub mod sampler;
pub mod translate;

pub use balancing::{generate_balancing_resources, BalancingGenerator, BalancingRequest};
pub use base::{generate_base_resources, BaseResourceRequest, GeneratedResource};
pub use package::{
    create_package, load_group, load_package, GroupEntry, MatrixGroup, PackageManifest,
    PACKAGE_MANIFEST,
};
pub use reference::{
    load_activity_index, load_flow_index, load_identifier_mapping, load_ordered_codes,
    load_params, load_product_index, load_type_table, IdentifierMapping, MatrixIndex,
    MatrixRole, ParamRecord, TypeTable,
};
pub use registry::{Campaign, Resource, ResourceRegistry};
pub use sampler::{ParameterSampler, UncertaintySampler};
pub use translate::{CoordinateTranslator, SampleMatrix};
