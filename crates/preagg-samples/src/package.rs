//! Sample resource packages: one directory per resource holding a manifest,
//! bincode-encoded samples and JSON coordinates for each matrix role.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use preagg_core::errors::{io_error, ErrorInfo, PreaggError};
use preagg_core::ids::CoordinateTriple;
use preagg_core::provenance::{RunProvenance, SchemaVersion};
use preagg_core::serde::{read_json, write_json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hash::stable_hash_string;
use crate::translate::SampleMatrix;

/// File name of the manifest inside a package directory.
pub const PACKAGE_MANIFEST: &str = "datapackage.json";

/// Current schema of [`PackageManifest`].
pub const PACKAGE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Samples and coordinates for one matrix role.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixGroup {
    /// Matrix role (`technosphere`, `biosphere`, `water`, ...).
    pub role: String,
    /// `coordinates.len() × iterations` draws.
    pub samples: SampleMatrix,
    /// Matrix coordinates of each sampled row.
    pub coordinates: Vec<CoordinateTriple>,
}

impl MatrixGroup {
    /// Bundles a role with its samples and coordinates.
    pub fn new(
        role: impl Into<String>,
        samples: SampleMatrix,
        coordinates: Vec<CoordinateTriple>,
    ) -> Self {
        Self {
            role: role.into(),
            samples,
            coordinates,
        }
    }
}

/// Files of one group inside a package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Matrix role.
    pub role: String,
    /// Bincode samples file name.
    pub samples: String,
    /// JSON coordinates file name.
    pub coordinates: String,
    /// Number of sampled entries.
    pub rows: usize,
}

/// Manifest written as `datapackage.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Content-derived package identifier.
    pub id: String,
    /// Package name, also the directory name.
    pub name: String,
    /// Iteration count shared by every group.
    pub ncols: usize,
    /// Seed the samples were drawn with.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Manifest schema.
    pub schema_version: SchemaVersion,
    /// Creation metadata.
    pub provenance: RunProvenance,
    /// Groups, in the order they were supplied.
    pub groups: Vec<GroupEntry>,
}

impl PackageManifest {
    /// Entry for `role`, when present.
    pub fn group(&self, role: &str) -> Option<&GroupEntry> {
        self.groups.iter().find(|entry| entry.role == role)
    }
}

/// Writes a package named `name` under `output_dir` and returns its id and
/// directory.
///
/// The package is assembled in a staging directory and renamed into place, so
/// a reader never sees a partially written package. An existing package is
/// only replaced when `overwrite` is set.
pub fn create_package(
    name: &str,
    groups: &[MatrixGroup],
    output_dir: &Path,
    overwrite: bool,
    seed: Option<u64>,
) -> Result<(String, PathBuf), PreaggError> {
    let ncols = validate_groups(name, groups)?;
    let target = output_dir.join(name);
    if target.exists() && !overwrite {
        return Err(PreaggError::Config(
            ErrorInfo::new("package-exists", "sample resource package already exists")
                .with_path(&target)
                .with_hint("pass overwrite to replace it"),
        ));
    }

    let staging = output_dir.join(format!(".{name}.staging"));
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|err| io_error("package-staging-clear", &staging, err))?;
    }
    fs::create_dir_all(&staging).map_err(|err| io_error("package-staging-create", &staging, err))?;

    let mut entries = Vec::with_capacity(groups.len());
    for group in groups {
        let entry = GroupEntry {
            role: group.role.clone(),
            samples: format!("{}.samples.bin", group.role),
            coordinates: format!("{}.coordinates.json", group.role),
            rows: group.samples.rows(),
        };
        let samples_path = staging.join(&entry.samples);
        let bytes = bincode::serialize(&group.samples).map_err(|err| {
            PreaggError::Serde(
                ErrorInfo::new("package-samples-encode", "failed to encode samples")
                    .with_context("role", group.role.clone())
                    .with_hint(err.to_string()),
            )
        })?;
        fs::write(&samples_path, bytes).map_err(|err| io_error("package-samples-write", &samples_path, err))?;
        write_json(&staging.join(&entry.coordinates), &group.coordinates)?;
        debug!(package = name, role = %group.role, rows = entry.rows, "wrote group");
        entries.push(entry);
    }

    let provenance = RunProvenance::now(seed);
    let id = stable_hash_string(&(name, ncols, seed, &provenance.created_at, &entries))?;
    let manifest = PackageManifest {
        id: id.clone(),
        name: name.to_string(),
        ncols,
        seed,
        schema_version: PACKAGE_SCHEMA,
        provenance,
        groups: entries,
    };
    write_json(&staging.join(PACKAGE_MANIFEST), &manifest)?;

    if target.exists() {
        fs::remove_dir_all(&target).map_err(|err| io_error("package-replace", &target, err))?;
    }
    fs::rename(&staging, &target).map_err(|err| io_error("package-promote", &target, err))?;
    info!(package = name, id = %id, ncols, path = %target.display(), "created sample resource");
    Ok((id, target))
}

/// Reads and validates the manifest of the package at `path`.
pub fn load_package(path: &Path) -> Result<PackageManifest, PreaggError> {
    if !path.is_dir() {
        return Err(PreaggError::Registry(
            ErrorInfo::new("package-missing", "sample resource directory does not exist")
                .with_path(path),
        ));
    }
    let manifest: PackageManifest = read_json(&path.join(PACKAGE_MANIFEST))?;
    if manifest.schema_version.major != PACKAGE_SCHEMA.major {
        return Err(PreaggError::Serde(
            ErrorInfo::new("package-schema", "unsupported package schema")
                .with_path(path)
                .with_context("major", manifest.schema_version.major.to_string()),
        ));
    }
    for entry in &manifest.groups {
        for file in [&entry.samples, &entry.coordinates] {
            if !path.join(file).is_file() {
                return Err(PreaggError::Registry(
                    ErrorInfo::new("package-incomplete", "package file is missing")
                        .with_path(path)
                        .with_context("file", file.clone()),
                ));
            }
        }
    }
    Ok(manifest)
}

/// Loads the samples and coordinates of `role` from the package at `path`.
pub fn load_group(path: &Path, role: &str) -> Result<MatrixGroup, PreaggError> {
    let manifest = load_package(path)?;
    let entry = manifest.group(role).ok_or_else(|| {
        PreaggError::Registry(
            ErrorInfo::new("package-role-missing", "package has no group for role")
                .with_path(path)
                .with_context("role", role),
        )
    })?;
    let samples_path = path.join(&entry.samples);
    let bytes = fs::read(&samples_path).map_err(|err| io_error("package-samples-read", &samples_path, err))?;
    let samples: SampleMatrix = bincode::deserialize(&bytes).map_err(|err| {
        PreaggError::Serde(
            ErrorInfo::new("package-samples-decode", "failed to decode samples")
                .with_path(&samples_path)
                .with_hint(err.to_string()),
        )
    })?;
    let coordinates: Vec<CoordinateTriple> = read_json(&path.join(&entry.coordinates))?;
    Ok(MatrixGroup::new(role, samples, coordinates))
}

fn validate_groups(name: &str, groups: &[MatrixGroup]) -> Result<usize, PreaggError> {
    let first = groups.first().ok_or_else(|| {
        PreaggError::Config(
            ErrorInfo::new("package-empty", "a package needs at least one group")
                .with_context("package", name),
        )
    })?;
    let ncols = first.samples.cols();
    let mut roles = BTreeSet::new();
    for group in groups {
        if !roles.insert(group.role.as_str()) {
            return Err(PreaggError::Config(
                ErrorInfo::new("package-role-duplicate", "role appears twice in a package")
                    .with_context("package", name)
                    .with_context("role", group.role.clone()),
            ));
        }
        if group.samples.cols() != ncols {
            return Err(PreaggError::Config(
                ErrorInfo::new("package-ncols", "groups disagree on the iteration count")
                    .with_context("package", name)
                    .with_context("role", group.role.clone())
                    .with_context("expected", ncols.to_string())
                    .with_context("actual", group.samples.cols().to_string()),
            ));
        }
        if group.samples.rows() != group.coordinates.len() {
            return Err(PreaggError::Config(
                ErrorInfo::new("package-rows", "sample rows do not match the coordinates")
                    .with_context("package", name)
                    .with_context("role", group.role.clone())
                    .with_context("rows", group.samples.rows().to_string())
                    .with_context("coordinates", group.coordinates.len().to_string()),
            ));
        }
    }
    Ok(ncols)
}
