//! File-backed patient cache.
//!
//! The cache is a single JSON document with a `metadata` envelope
//! (generation timestamp and provenance) and a `patients` array. The
//! format is internal; the only hard requirement is that load/save
//! round-trips preserve every patient field.
//!
//! The store is a single-writer resource per path: the surrounding
//! system serialises concurrent analysis runs against the same cache
//! location, the core does not lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use triage_types::Patient;

/// Errors raised by cache reads and writes.
///
/// `NotFound` and `Corrupt` are deliberately distinct: a caller seeing
/// either can fall back to refetching from upstream instead of
/// crashing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("patients cache not found: {0}")]
    NotFound(PathBuf),
    #[error("patients cache corrupt: {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to create cache directory: {0}")]
    DirCreation(#[source] std::io::Error),
    #[error("failed to read cache file: {0}")]
    FileRead(#[source] std::io::Error),
    #[error("failed to write cache file: {0}")]
    FileWrite(#[source] std::io::Error),
    #[error("failed to serialize cache payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where a stored patient batch originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Api,
    Cache,
}

/// Envelope written alongside every stored batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub generated_at: DateTime<Utc>,
    pub source: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The on-disk cache document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientsCacheFile {
    pub metadata: CacheMetadata,
    pub patients: Vec<Patient>,
}

/// Whether a cache document exists at `path`.
pub fn cache_exists(path: &Path) -> bool {
    path.is_file()
}

/// Reads and structurally validates the cache document.
///
/// A present but invalid file (unparseable JSON, or a `patients` field
/// that is not a list) is [`StoreError::Corrupt`], never a panic.
pub fn read_patients_cache(path: &Path) -> Result<PatientsCacheFile, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_owned()));
    }
    let raw = fs::read_to_string(path).map_err(StoreError::FileRead)?;

    let value: Value = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    if !value.get("patients").map(Value::is_array).unwrap_or(false) {
        return Err(StoreError::Corrupt {
            path: path.to_owned(),
            reason: "patients field missing or not a list".to_owned(),
        });
    }

    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        path: path.to_owned(),
        reason: e.to_string(),
    })
}

/// Persists a patient batch with a fresh timestamp and the given
/// provenance, creating parent directories as needed.
pub fn write_patients_cache(
    path: &Path,
    patients: &[Patient],
    source: Provenance,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
        }
    }

    let document = PatientsCacheFile {
        metadata: CacheMetadata {
            generated_at: Utc::now(),
            source,
            note: None,
        },
        patients: patients.to_vec(),
    };
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(path, json).map_err(StoreError::FileWrite)
}

/// Merges a freshly fetched batch into an existing store snapshot:
/// union keyed by `patient_id`, the fetched record always winning for
/// the same id. Snapshot order is preserved, new ids append in fetch
/// order.
pub fn merge_patients(existing: &[Patient], fetched: &[Patient]) -> Vec<Patient> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<Patient> = Vec::with_capacity(existing.len() + fetched.len());

    for patient in existing.iter().chain(fetched) {
        match slot.get(patient.patient_id.as_str()) {
            Some(&index) => out[index] = patient.clone(),
            None => {
                slot.insert(patient.patient_id.as_str(), out.len());
                out.push(patient.clone());
            }
        }
    }
    out
}
