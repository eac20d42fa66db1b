//! The declarative scoring rules document.
//!
//! Rules are loaded once per analysis run from an external JSON
//! document and are immutable thereafter. Structural validation is
//! deliberately strict: a rules file that is missing required pieces is
//! a deployment misconfiguration and fails fast, before any patient is
//! scored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors raised by rules loading and structural validation.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("rules document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rules.metrics missing or empty")]
    NoMetrics,
    #[error("metric.id missing or empty")]
    MissingMetricId,
    #[error("metric.parserId missing: {metric_id}")]
    MissingParserId { metric_id: String },
    #[error("metric.scorerId missing: {metric_id}")]
    MissingScorerId { metric_id: String },
    #[error("metric.fields missing or empty: {metric_id}")]
    MissingFields { metric_id: String },
}

/// A numeric interval test. Each bound is independently optional; a
/// value matches iff it is not excluded by any present bound, so a
/// rule with no bounds matches every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeRule {
    pub min_inclusive: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
}

/// How a multi-field metric rule combines its per-field range matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logic {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// One scoring branch of a metric: a state label, the points it
/// awards (may be zero or negative), and per-field range tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRule {
    pub state: String,
    pub points: i32,
    /// Defaults to [`Logic::Or`] when absent.
    pub logic: Option<Logic>,
    pub rule: BTreeMap<String, RangeRule>,
}

impl MetricRule {
    pub fn logic(&self) -> Logic {
        self.logic.unwrap_or(Logic::Or)
    }
}

/// One declarative metric: which patient fields it reads, which parser
/// and scorer evaluate it, and its ordered scoring branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfig {
    pub id: String,
    pub label: Option<String>,
    pub fields: Vec<String>,
    pub parser_id: String,
    pub scorer_id: String,
    pub rules: Vec<MetricRule>,
    /// Score applied when the parser fails on this metric.
    pub invalid_points: i32,
    /// Whether a parse failure flags the patient as a data-quality issue.
    pub invalid_counts_as_quality_issue: bool,
}

/// Classification thresholds applied after all metrics are scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub high_risk_total_score_min_inclusive: i32,
    pub fever_temp_min_inclusive: f64,
}

/// The complete rules document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    pub version: String,
    pub thresholds: Thresholds,
    pub metrics: Vec<MetricConfig>,
}

impl Rules {
    /// Parses a rules document from JSON and validates its structure.
    pub fn from_json_str(raw: &str) -> Result<Self, RulesError> {
        let rules: Rules = serde_json::from_str(raw)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Fail-fast structural validation: non-empty metrics, and every
    /// metric carries an id, a parser, a scorer and at least one field.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.metrics.is_empty() {
            return Err(RulesError::NoMetrics);
        }
        for m in &self.metrics {
            if m.id.trim().is_empty() {
                return Err(RulesError::MissingMetricId);
            }
            if m.parser_id.trim().is_empty() {
                return Err(RulesError::MissingParserId {
                    metric_id: m.id.clone(),
                });
            }
            if m.scorer_id.trim().is_empty() {
                return Err(RulesError::MissingScorerId {
                    metric_id: m.id.clone(),
                });
            }
            if m.fields.is_empty() {
                return Err(RulesError::MissingFields {
                    metric_id: m.id.clone(),
                });
            }
        }
        Ok(())
    }
}
