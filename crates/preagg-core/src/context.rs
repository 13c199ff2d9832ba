//! Explicit project context threaded through every pipeline operation.
//!
//! A [`ProjectContext`] names the project directory (manifest and registry),
//! the database whose entities are evaluated and the result directory. Every
//! public operation takes the context as an argument; nothing is switched or
//! cached between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PreaggError};
use crate::seed::BatchKey;
use crate::serde::{read_json, write_json};

/// File name of the project manifest inside the project directory.
pub const PROJECT_MANIFEST: &str = "project.json";
/// File name of the campaign/resource registry inside the project directory.
pub const REGISTRY_FILE: &str = "registry.sqlite";

/// Ordered list of entity codes defining the dispatch manifest.
pub const ORDERED_ACTIVITY_CODES: &str = "ordered_activity_codes.json";
/// Elementary flow → row index mapping.
pub const BIO_DICT: &str = "bio_dict.json";
/// Product → row index mapping.
pub const PRODUCT_DICT: &str = "product_dict.json";
/// Activity → column index mapping.
pub const ACTIVITY_DICT: &str = "activity_dict.json";
/// Technosphere parameter table.
pub const TECH_PARAMS: &str = "tech_params.json";
/// Biosphere parameter table.
pub const BIO_PARAMS: &str = "bio_params.json";
/// Global index → identifier mapping.
pub const IO_MAPPING: &str = "io_mapping.json";
/// Optional type-code table overriding the defaults.
pub const TYPE_CODES: &str = "type_codes.json";

/// Reference files that must exist before sampling or dispatching.
pub const REQUIRED_COMMON_FILES: [&str; 7] = [
    ORDERED_ACTIVITY_CODES,
    BIO_DICT,
    PRODUCT_DICT,
    ACTIVITY_DICT,
    TECH_PARAMS,
    BIO_PARAMS,
    IO_MAPPING,
];

/// Kind of result tree under the result directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResultType {
    /// Monte Carlo results drawn from the batch's sample resources.
    #[default]
    Probabilistic,
    /// Single deterministic evaluation per entity.
    Deterministic,
}

impl ResultType {
    /// Directory name used for this result type.
    pub fn dir_name(self) -> &'static str {
        match self {
            ResultType::Probabilistic => "probabilistic",
            ResultType::Deterministic => "deterministic",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Database registered in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Number of activities imported into the database.
    pub activities: usize,
}

/// Project manifest written by the setup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Project name.
    pub name: String,
    /// Name of the elementary flow database, present once the project is set up.
    #[serde(default)]
    pub biosphere: Option<String>,
    /// Databases imported into the project.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseInfo>,
}

impl ProjectManifest {
    /// Creates an empty manifest.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            biosphere: None,
            databases: BTreeMap::new(),
        }
    }

    /// Loads the manifest stored in `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self, PreaggError> {
        read_json(&project_dir.join(PROJECT_MANIFEST))
    }

    /// Persists the manifest into `project_dir`.
    pub fn store(&self, project_dir: &Path) -> Result<(), PreaggError> {
        write_json(&project_dir.join(PROJECT_MANIFEST), self)
    }
}

/// Explicit project, database and result-directory context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    project_dir: PathBuf,
    database: String,
    result_dir: PathBuf,
}

impl ProjectContext {
    /// Creates a context; nothing is validated until a check is requested.
    pub fn new(
        project_dir: impl Into<PathBuf>,
        database: impl Into<String>,
        result_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            database: database.into(),
            result_dir: result_dir.into(),
        }
    }

    /// Project directory holding the manifest and the registry.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Name of the database whose entities are evaluated.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Root of the result tree.
    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    /// Path of the registry database.
    pub fn registry_path(&self) -> PathBuf {
        self.project_dir.join(REGISTRY_FILE)
    }

    /// Directory holding the reference mapping files.
    pub fn common_files_dir(&self) -> PathBuf {
        self.result_dir.join("common_files")
    }

    /// Path of one reference mapping file.
    pub fn common_file(&self, name: &str) -> PathBuf {
        self.common_files_dir().join(name)
    }

    /// Directory where sample resource packages are written.
    pub fn presamples_dir(&self) -> PathBuf {
        self.result_dir.join("presamples")
    }

    /// Directory holding the raw per-entity arrays of a batch.
    pub fn lci_dir(&self, result_type: ResultType, batch: BatchKey) -> PathBuf {
        self.result_dir
            .join(result_type.dir_name())
            .join("LCI")
            .join(batch.to_string())
    }

    /// Directory holding scored arrays for one method abbreviation.
    pub fn lcia_dir(&self, result_type: ResultType, method_abbreviation: &str) -> PathBuf {
        self.result_dir
            .join(result_type.dir_name())
            .join(method_abbreviation)
    }

    /// Confirms the project exists and has been set up.
    pub fn check_project(&self) -> Result<ProjectManifest, PreaggError> {
        let manifest_path = self.project_dir.join(PROJECT_MANIFEST);
        if !manifest_path.is_file() {
            return Err(PreaggError::Config(
                ErrorInfo::new("project-missing", "project does not exist")
                    .with_path(&self.project_dir)
                    .with_hint("run the setup step first"),
            ));
        }
        let manifest = ProjectManifest::load(&self.project_dir)?;
        if manifest.biosphere.is_none() {
            return Err(PreaggError::Config(
                ErrorInfo::new("project-not-set-up", "project has not been set up")
                    .with_context("project", manifest.name.clone())
                    .with_hint("run the setup step first"),
            ));
        }
        Ok(manifest)
    }

    /// Confirms the database is registered in the project and holds activities.
    pub fn check_database(&self) -> Result<(), PreaggError> {
        let manifest = self.check_project()?;
        match manifest.databases.get(&self.database) {
            None => Err(PreaggError::Config(
                ErrorInfo::new("database-missing", "database has not been set up")
                    .with_context("database", self.database.clone())
                    .with_hint("run the setup step first"),
            )),
            Some(info) if info.activities == 0 => Err(PreaggError::Config(
                ErrorInfo::new("database-empty", "database is empty")
                    .with_context("database", self.database.clone())
                    .with_hint("rerun the setup step overwriting the database"),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Confirms the result directory exists.
    pub fn check_result_dir(&self) -> Result<&Path, PreaggError> {
        if !self.result_dir.is_dir() {
            return Err(PreaggError::Config(
                ErrorInfo::new("result-dir-missing", "result directory does not exist")
                    .with_path(&self.result_dir),
            ));
        }
        Ok(&self.result_dir)
    }

    /// Lists required reference files absent from the common files directory.
    pub fn missing_common_files(&self) -> Vec<&'static str> {
        let dir = self.common_files_dir();
        REQUIRED_COMMON_FILES
            .iter()
            .copied()
            .filter(|name| !dir.join(name).is_file())
            .collect()
    }

    /// Fails when any required reference file is missing, naming all of them.
    pub fn check_common_files(&self) -> Result<(), PreaggError> {
        let missing = self.missing_common_files();
        if missing.is_empty() {
            return Ok(());
        }
        Err(PreaggError::Config(
            ErrorInfo::new("common-files-missing", "reference mapping files are missing")
                .with_context("missing", missing.join(", "))
                .with_path(&self.common_files_dir())
                .with_hint("run the setup step to generate the common files"),
        ))
    }
}
