//! Canonical JSON helpers used for manifests and reference files.

use std::collections::BTreeMap;
use std::fs;
use std::iter::FromIterator;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::{io_error, ErrorInfo, PreaggError};

fn serde_error(code: &str, err: impl ToString) -> PreaggError {
    PreaggError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, PreaggError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer_pretty(&mut bytes, &canonical)
        .map_err(|err| serde_error("json_write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, PreaggError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PreaggError> {
    let bytes = fs::read(path).map_err(|err| io_error("json_read", path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| {
        PreaggError::Serde(ErrorInfo::new("json_deserialize", err.to_string()).with_path(path))
    })
}

/// Writes a value as canonical JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PreaggError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("json_dir", parent, err))?;
    }
    let bytes = to_canonical_json_bytes(value)?;
    fs::write(path, bytes).map_err(|err| io_error("json_write", path, err))
}
