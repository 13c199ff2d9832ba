#![deny(missing_docs)]
#![doc = "Core types for the preagg pipeline: errors, batch seeding, identifiers, the explicit project context and the result array format."]

pub mod array;
pub mod context;
pub mod errors;
pub mod ids;
pub mod provenance;
pub mod rng;
pub mod seed;
pub mod serde;

pub use array::{
    array_file_name, file_has_zero_column, read_array_header, ArrayHeader, ArrayValues,
    Precision, ResultArray, StagedArray,
};
pub use context::{DatabaseInfo, ProjectContext, ProjectManifest, ResultType};
pub use errors::{ErrorInfo, PreaggError};
pub use ids::{CoordinateTriple, IdentifierPair};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::RngHandle;
pub use seed::{derive_seed, BatchKey};
