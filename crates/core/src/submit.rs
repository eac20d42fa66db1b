//! Assessment submission.
//!
//! Sends the alert lists of a completed analysis to the upstream
//! `/submit-assessment` endpoint, after re-checking the cross-run
//! invariant that no list carries duplicate patient ids. The upstream
//! response is passed through unmodified.

use crate::config::RetryConfig;
use crate::http::{request_with_retry, ApiClient, HttpError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use triage_engine::Alerts;

/// Errors raised by assessment submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("duplicate patient ids in {list}")]
    DuplicateIds { list: &'static str },
    #[error("failed to serialize alerts: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("upstream submit failed")]
    Upstream(#[from] HttpError),
}

/// Per-list submission counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedCounts {
    pub high_risk_patients: usize,
    pub fever_patients: usize,
    pub data_quality_issues: usize,
}

/// Result of a successful submission: what was sent plus the upstream
/// response body verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub submitted: SubmittedCounts,
    pub upstream: Value,
}

fn has_duplicates(ids: &[String]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().any(|id| !seen.insert(id.as_str()))
}

/// Checks that each alert list carries an id at most once.
pub fn validate_alerts(alerts: &Alerts) -> Result<(), SubmitError> {
    if has_duplicates(&alerts.high_risk_patients) {
        return Err(SubmitError::DuplicateIds {
            list: "high_risk_patients",
        });
    }
    if has_duplicates(&alerts.fever_patients) {
        return Err(SubmitError::DuplicateIds {
            list: "fever_patients",
        });
    }
    if has_duplicates(&alerts.data_quality_issues) {
        return Err(SubmitError::DuplicateIds {
            list: "data_quality_issues",
        });
    }
    Ok(())
}

/// Submits the alerts object upstream through the retry executor.
pub async fn submit_assessment(
    client: &ApiClient,
    retry: &RetryConfig,
    alerts: &Alerts,
) -> Result<SubmitReceipt, SubmitError> {
    validate_alerts(alerts)?;

    let body = serde_json::to_value(alerts).map_err(SubmitError::Serialization)?;
    let upstream =
        request_with_retry(retry, || client.post_json("/submit-assessment", &body)).await?;

    tracing::info!(
        high_risk = alerts.high_risk_patients.len(),
        fever = alerts.fever_patients.len(),
        quality = alerts.data_quality_issues.len(),
        "assessment submitted"
    );

    Ok(SubmitReceipt {
        submitted: SubmittedCounts {
            high_risk_patients: alerts.high_risk_patients.len(),
            fever_patients: alerts.fever_patients.len(),
            data_quality_issues: alerts.data_quality_issues.len(),
        },
        upstream,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alerts(high_risk: &[&str], fever: &[&str], quality: &[&str]) -> Alerts {
        let owned = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect();
        Alerts {
            high_risk_patients: owned(high_risk),
            fever_patients: owned(fever),
            data_quality_issues: owned(quality),
        }
    }

    #[test]
    fn clean_lists_pass_validation() {
        let a = alerts(&["p1", "p2"], &["p3"], &["p1"]);
        // The same id in two different lists is allowed.
        assert!(validate_alerts(&a).is_ok());
    }

    #[test]
    fn duplicates_within_one_list_are_rejected() {
        let a = alerts(&["p1", "p1"], &[], &[]);
        assert!(matches!(
            validate_alerts(&a),
            Err(SubmitError::DuplicateIds { list: "high_risk_patients" })
        ));

        let a = alerts(&[], &[], &["p9", "p9"]);
        assert!(matches!(
            validate_alerts(&a),
            Err(SubmitError::DuplicateIds { list: "data_quality_issues" })
        ));
    }

    #[test]
    fn empty_lists_are_valid() {
        assert!(validate_alerts(&Alerts::default()).is_ok());
    }
}
