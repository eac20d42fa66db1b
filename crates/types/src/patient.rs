//! Canonical patient record and pagination metadata.

use serde::{Deserialize, Serialize};

/// A normalized patient record.
///
/// `patient_id` is always present and non-empty for any record that
/// survives normalization; every other field is independently optional
/// and may be `None` when the upstream payload omitted it or supplied
/// a value that could not be coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub name: Option<String>,
    pub age: Option<f64>,
    pub gender: Option<String>,
    /// Raw blood pressure string in "systolic/diastolic" form.
    pub blood_pressure: Option<String>,
    pub temperature: Option<f64>,
    pub visit_date: Option<String>,
    pub diagnosis: Option<String>,
    pub medications: Option<String>,
}

impl Patient {
    /// Creates a record with only the identity set. Used by
    /// normalization before field coercion fills in the rest.
    pub fn with_id(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            name: None,
            age: None,
            gender: None,
            blood_pressure: None,
            temperature: None,
            visit_date: None,
            diagnosis: None,
            medications: None,
        }
    }
}

/// Pagination metadata extracted from an upstream page response.
///
/// `has_next`/`has_previous` are derived from `page` vs `total_pages`
/// when the upstream source omits them; `total_pages` is itself derived
/// from `total` and `limit` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: Option<u64>,
    pub total_pages: Option<u32>,
    pub has_next: Option<bool>,
    pub has_previous: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_serializes_optionals_as_null() {
        let p = Patient::with_id("P-001");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["patient_id"], "P-001");
        assert!(json["age"].is_null());
        assert!(json["blood_pressure"].is_null());
    }

    #[test]
    fn pagination_uses_camel_case_field_names() {
        let pg = Pagination {
            page: 2,
            limit: 10,
            total: Some(25),
            total_pages: Some(3),
            has_next: Some(true),
            has_previous: Some(true),
        };
        let json = serde_json::to_value(&pg).unwrap();
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["hasPrevious"], true);
    }
}
