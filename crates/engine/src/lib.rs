//! # Triage Engine
//!
//! Rule evaluation over normalized patients: each configured metric is
//! parsed and scored independently, per-metric outcomes are summed into
//! a total, and classification thresholds bucket patients into alert
//! lists.
//!
//! Evaluation is deterministic and patient-order-preserving. Metrics of
//! different patients have no data dependency, so the loop could be
//! parallelized, but output order must stay the original patient order
//! so we keep it sequential.

pub mod parsers;
pub mod scorers;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use triage_types::{Patient, Rules};

use crate::parsers::{lookup_parser, ParseOutcome};
use crate::scorers::lookup_scorer;

/// Errors raised by rule evaluation. These are deployment
/// misconfigurations, not data problems, and abort the whole run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown parserId: {parser_id} (metric {metric_id})")]
    UnknownParser {
        metric_id: String,
        parser_id: String,
    },
    #[error("unknown scorerId: {scorer_id} (metric {metric_id})")]
    UnknownScorer {
        metric_id: String,
        scorer_id: String,
    },
}

/// Per-metric outcome for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricOutcome {
    pub metric_id: String,
    pub points: i32,
    pub state: Option<String>,
    pub invalid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Classification flags derived after all metrics are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFlags {
    pub data_quality_issue: bool,
    pub fever: bool,
    pub high_risk: bool,
}

/// Single-choice summary of which alert list a patient primarily
/// belongs to. Precedence: quality issue > high risk > fever > none.
/// This affects only the summary field; actual list membership is
/// independent per flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedList {
    DataQualityIssues,
    HighRiskPatients,
    FeverPatients,
    None,
}

/// Per-patient aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientOutcome {
    pub patient_id: String,
    pub total: i32,
    pub metrics: BTreeMap<String, MetricOutcome>,
    pub flags: PatientFlags,
    pub assigned_list: AssignedList,
}

/// The three alert lists. A patient id appears at most once per list,
/// but may appear in more than one list when its flags qualify for
/// more than one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alerts {
    pub high_risk_patients: Vec<String>,
    pub fever_patients: Vec<String>,
    pub data_quality_issues: Vec<String>,
}

/// Scored patients (original order) plus alert-list membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub scored: Vec<PatientOutcome>,
    pub alerts: Alerts,
}

/// Evaluates every metric of `rules` against every patient.
///
/// Metrics run in declared order; each is independent. A parse failure
/// contributes the metric's `invalidPoints` and, if configured, raises
/// the patient's data-quality flag. Unknown parser or scorer ids fail
/// the entire run.
pub fn evaluate(patients: &[Patient], rules: &Rules) -> Result<EngineOutput, EngineError> {
    let mut alerts = Alerts::default();
    let mut scored = Vec::with_capacity(patients.len());

    for patient in patients {
        let mut total: i32 = 0;
        let mut any_quality_issue = false;
        let mut metrics = BTreeMap::new();

        for metric in &rules.metrics {
            let parser =
                lookup_parser(&metric.parser_id).ok_or_else(|| EngineError::UnknownParser {
                    metric_id: metric.id.clone(),
                    parser_id: metric.parser_id.clone(),
                })?;
            let scorer =
                lookup_scorer(&metric.scorer_id).ok_or_else(|| EngineError::UnknownScorer {
                    metric_id: metric.id.clone(),
                    scorer_id: metric.scorer_id.clone(),
                })?;

            match parser(patient, &metric.fields) {
                ParseOutcome::Failed { reason } => {
                    metrics.insert(
                        metric.id.clone(),
                        MetricOutcome {
                            metric_id: metric.id.clone(),
                            points: metric.invalid_points,
                            state: None,
                            invalid: true,
                            invalid_reason: Some(reason.to_owned()),
                        },
                    );
                    if metric.invalid_counts_as_quality_issue {
                        any_quality_issue = true;
                    }
                    total += metric.invalid_points;
                }
                ParseOutcome::Parsed(values) => {
                    let score = scorer(&metric.rules, &values);
                    metrics.insert(
                        metric.id.clone(),
                        MetricOutcome {
                            metric_id: metric.id.clone(),
                            points: score.points,
                            state: score.state,
                            invalid: false,
                            invalid_reason: None,
                        },
                    );
                    total += score.points;
                }
            }
        }

        let fever = patient
            .temperature
            .map(|t| t.is_finite() && t >= rules.thresholds.fever_temp_min_inclusive)
            .unwrap_or(false);
        let high_risk = total >= rules.thresholds.high_risk_total_score_min_inclusive;

        // The three list memberships are independent; a patient can
        // land in more than one simultaneously.
        if high_risk {
            alerts.high_risk_patients.push(patient.patient_id.clone());
        }
        if fever {
            alerts.fever_patients.push(patient.patient_id.clone());
        }
        if any_quality_issue {
            alerts.data_quality_issues.push(patient.patient_id.clone());
        }

        let assigned_list = if any_quality_issue {
            AssignedList::DataQualityIssues
        } else if high_risk {
            AssignedList::HighRiskPatients
        } else if fever {
            AssignedList::FeverPatients
        } else {
            AssignedList::None
        };

        scored.push(PatientOutcome {
            patient_id: patient.patient_id.clone(),
            total,
            metrics,
            flags: PatientFlags {
                data_quality_issue: any_quality_issue,
                fever,
                high_risk,
            },
            assigned_list,
        });
    }

    Ok(EngineOutput { scored, alerts })
}
