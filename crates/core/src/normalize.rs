//! Payload-shape normalization.
//!
//! The upstream API is inconsistent about how it wraps patient records
//! and pagination metadata. This module accepts an arbitrary JSON value
//! and extracts a canonical patient list plus pagination, degrading
//! gracefully: an unrecognized shape yields zero records, a record with
//! no usable identity is dropped and counted, and unparseable field
//! values become `None`. Nothing in here is an error.

use serde_json::{Map, Value};
use triage_types::{Pagination, Patient};

/// Observability counters for one normalization pass.
///
/// Invariant: `dropped + normalized == extracted_raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeCounts {
    pub extracted_raw: usize,
    pub normalized: usize,
    pub dropped: usize,
}

/// One normalized page of upstream data.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub patients: Vec<Patient>,
    pub pagination: Option<Pagination>,
    pub debug: NormalizeCounts,
}

/// String coercion: any JSON string, or a finite number rendered as
/// its decimal form. Everything else is `None`.
fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if n.as_f64().is_some_and(f64::is_finite) {
                Some(n.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Numeric coercion: a finite JSON number, or a trimmed numeric
/// string. Everything else is `None`.
fn as_number_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

fn field_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(as_string).filter(|s| !s.is_empty())
}

/// Identity extraction precedence: `patient_id`, `patientId`, `id`,
/// then the nested `patient.patient_id` / `patient.id`.
fn extract_patient_id(raw: &Map<String, Value>) -> Option<String> {
    if let Some(id) = field_string(raw, "patient_id") {
        return Some(id);
    }
    if let Some(id) = field_string(raw, "patientId") {
        return Some(id);
    }
    if let Some(id) = field_string(raw, "id") {
        return Some(id);
    }
    if let Some(Value::Object(nested)) = raw.get("patient") {
        return field_string(nested, "patient_id").or_else(|| field_string(nested, "id"));
    }
    None
}

/// Normalizes a single candidate record, or drops it when no identity
/// field is present.
pub fn normalize_patient(raw: &Map<String, Value>) -> Option<Patient> {
    let patient_id = extract_patient_id(raw)?;

    // Clinical fields may live beside the id or inside a nested
    // `patient` object.
    let base = match raw.get("patient") {
        Some(Value::Object(nested)) => nested,
        _ => raw,
    };
    let get = |key: &str| base.get(key).unwrap_or(&Value::Null);

    Some(Patient {
        patient_id,
        name: as_string(get("name")),
        age: as_number_lenient(get("age")),
        gender: as_string(get("gender")),
        blood_pressure: as_string(get("blood_pressure")),
        temperature: as_number_lenient(get("temperature")),
        visit_date: as_string(get("visit_date")),
        diagnosis: as_string(get("diagnosis")),
        medications: as_string(get("medications")),
    })
}

fn objects_of(array: &[Value]) -> Vec<&Map<String, Value>> {
    array.iter().filter_map(Value::as_object).collect()
}

/// Record extraction precedence, first match wins: the payload itself
/// as an array, `.data` (array or single object), `.patients`,
/// `.result`, `.result.data`. Any other shape yields zero records.
fn extract_raw_patients(payload: &Value) -> Vec<&Map<String, Value>> {
    if let Value::Array(items) = payload {
        return objects_of(items);
    }

    let Value::Object(obj) = payload else {
        return Vec::new();
    };

    match obj.get("data") {
        Some(Value::Array(items)) => return objects_of(items),
        Some(Value::Object(single)) => return vec![single],
        _ => {}
    }

    if let Some(Value::Array(items)) = obj.get("patients") {
        return objects_of(items);
    }

    match obj.get("result") {
        Some(Value::Array(items)) => return objects_of(items),
        Some(Value::Object(result)) => {
            if let Some(Value::Array(items)) = result.get("data") {
                return objects_of(items);
            }
        }
        _ => {}
    }

    Vec::new()
}

fn alias_number(obj: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .find_map(|key| obj.get(*key).and_then(as_number_lenient))
}

fn as_page_count(n: f64) -> Option<u32> {
    (n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX)).then(|| n as u32)
}

/// Pagination extraction: searches `.pagination`, `.pageInfo`,
/// `.meta.pagination`, `.metadata.pagination`, then the payload object
/// itself, accepting common alias names per attribute. `totalPages` is
/// derived from `total`/`limit` when absent, and `hasNext`/
/// `hasPrevious` from `page` vs `totalPages`.
fn extract_pagination(payload: &Value, patient_count: usize) -> Option<Pagination> {
    let root = payload.as_object()?;

    let container = [
        root.get("pagination"),
        root.get("pageInfo"),
        root.get("meta").and_then(|m| m.get("pagination")),
        root.get("metadata").and_then(|m| m.get("pagination")),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_object)
    .unwrap_or(root);

    let page_raw = alias_number(
        container,
        &[
            "page",
            "currentPage",
            "current_page",
            "current_page_index",
            "current_page_number",
        ],
    );
    let limit_raw = alias_number(
        container,
        &["limit", "pageSize", "page_size", "per_page", "perPage"],
    );
    let total = alias_number(
        container,
        &[
            "total",
            "totalCount",
            "total_count",
            "total_records",
            "totalRecords",
        ],
    )
    .and_then(|n| (n.is_finite() && n >= 0.0).then(|| n as u64));

    let mut total_pages =
        alias_number(container, &["totalPages", "total_pages"]).and_then(as_page_count);

    let page = page_raw.and_then(as_page_count).unwrap_or(1);
    let explicit_limit = limit_raw.and_then(as_page_count);
    let limit = explicit_limit.unwrap_or(patient_count as u32);

    // Derivation needs the upstream's own limit; the record-count
    // fallback would fabricate a page count the source never implied.
    if total_pages.is_none() {
        if let (Some(total), Some(limit)) = (total, explicit_limit.filter(|l| *l > 0)) {
            let pages = total.div_ceil(u64::from(limit)).max(1);
            total_pages = u32::try_from(pages).ok();
        }
    }

    let has_next = match container.get("hasNext") {
        Some(Value::Bool(b)) => Some(*b),
        _ => total_pages.map(|tp| page < tp),
    };
    let has_previous = match container.get("hasPrevious") {
        Some(Value::Bool(b)) => Some(*b),
        _ => total_pages.map(|_| page > 1),
    };

    Some(Pagination {
        page,
        limit,
        total,
        total_pages,
        has_next,
        has_previous,
    })
}

/// Normalizes one upstream page of unknown shape into canonical
/// patients plus pagination metadata.
pub fn normalize_patients_payload(payload: &Value) -> NormalizedPage {
    let raw_patients = extract_raw_patients(payload);
    let extracted_raw = raw_patients.len();

    let mut patients = Vec::with_capacity(extracted_raw);
    let mut dropped = 0usize;
    for raw in raw_patients {
        match normalize_patient(raw) {
            Some(patient) => patients.push(patient),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped records without a usable patient identity");
    }

    let pagination = extract_pagination(payload, patients.len());

    NormalizedPage {
        debug: NormalizeCounts {
            extracted_raw,
            normalized: patients.len(),
            dropped,
        },
        patients,
        pagination,
    }
}
