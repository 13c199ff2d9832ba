//! Impact scoring of stored inventory arrays against characterization methods.

#![deny(missing_docs)]

pub mod batch;
pub mod method;
pub mod score;

pub use batch::{
    save_all_score_arrays, score_entity, stored_entities, EntityScoreFailure, ScoreBatchReport,
    ScoreOptions, CFS_FILE, EXCHANGE_KEYS_FILE, METHOD_FILES_DIR,
};
pub use method::{CharacterizationFactor, CharacterizationMethod, Selection};
pub use score::{score_arrays, ScoreMode};
