//! Canonical JSON and YAML encoding for manifests, plans and catalogs.

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tee_core::errors::{ErrorInfo, TeeError};

fn serde_error(code: &str, err: impl ToString) -> TeeError {
    TeeError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn sort_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, mut child) in entries {
                sort_keys(&mut child);
                map.insert(key, child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}

/// Compact JSON with object keys sorted at every depth.
///
/// Run hashes, plan hashes and the artifact records are all computed over
/// these bytes, so two equal values always encode identically.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, TeeError> {
    let mut value = serde_json::to_value(value).map_err(|err| serde_error("json-encode", err))?;
    sort_keys(&mut value);
    serde_json::to_vec(&value).map_err(|err| serde_error("json-write", err))
}

pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, TeeError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json-decode", err))
}

pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, TeeError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("yaml-encode", err))
}

pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, TeeError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("yaml-decode", err))
}

/// Reads and decodes a YAML document; `code` tags the error when the file is unreadable.
pub(crate) fn read_yaml_file<T: DeserializeOwned>(path: &Path, code: &str) -> Result<T, TeeError> {
    let bytes = fs::read(path).map_err(|err| {
        TeeError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    })?;
    from_yaml_slice(&bytes).map_err(|err| match err {
        TeeError::Serde(info) => {
            TeeError::Serde(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })
}
