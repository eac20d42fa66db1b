//! Analysis-run orchestration.
//!
//! One run takes the current patient set (local cache when enabled and
//! present, otherwise a full paginated fetch merged into the cache),
//! evaluates the rules over it, and produces an [`AnalysisReport`]
//! that can be persisted and later submitted.

use crate::config::AppConfig;
use crate::fetch::{fetch_all_patients, FetchError};
use crate::http::ApiClient;
use crate::store::{
    cache_exists, merge_patients, read_patients_cache, write_patients_cache, Provenance,
    StoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use triage_engine::{evaluate, Alerts, EngineError, PatientOutcome};
use triage_types::{Patient, Rules, RulesError};

/// Errors raised by an analysis run or report persistence.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to read rules file: {0}")]
    RulesFileRead(#[source] std::io::Error),
    #[error("analysis report not found: {0}")]
    ReportNotFound(PathBuf),
    #[error("analysis report corrupt: {path}: {reason}")]
    ReportCorrupt { path: PathBuf, reason: String },
    #[error("failed to create report directory: {0}")]
    ReportDirCreation(#[source] std::io::Error),
    #[error("failed to read report file: {0}")]
    ReportFileRead(#[source] std::io::Error),
    #[error("failed to write report file: {0}")]
    ReportFileWrite(#[source] std::io::Error),
    #[error("failed to serialize report: {0}")]
    ReportSerialization(#[source] serde_json::Error),
}

/// Envelope describing how a report was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub generated_at: DateTime<Utc>,
    pub source: Provenance,
    pub rules_version: String,
    pub patient_count: usize,
}

/// The persisted output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub alerts: Alerts,
    pub scored_patients: Vec<PatientOutcome>,
}

/// Loads and validates the rules document from its configured path.
pub fn load_rules(path: &Path) -> Result<Rules, AnalysisError> {
    let raw = fs::read_to_string(path).map_err(AnalysisError::RulesFileRead)?;
    Ok(Rules::from_json_str(&raw)?)
}

/// Runs one full analysis: source selection, cache reconciliation,
/// rule evaluation, report assembly.
///
/// When the fetch path runs and an existing cache snapshot is present,
/// the fetched batch is merged into it (fetched records win) and the
/// merged set is both persisted and scored. A corrupt snapshot is
/// logged and discarded in favour of the fresh fetch rather than
/// failing the run.
pub async fn run_analysis(
    client: &ApiClient,
    config: &AppConfig,
    rules: &Rules,
) -> Result<AnalysisReport, AnalysisError> {
    rules.validate()?;

    let cache_path = config.cache.patients_file_path.as_path();
    let (patients, source) = if config.cache.use_local_cache && cache_exists(cache_path) {
        let snapshot = read_patients_cache(cache_path)?;
        (snapshot.patients, Provenance::Cache)
    } else {
        let fetched = fetch_all_patients(client, config).await?;
        let merged = reconcile_with_cache(cache_path, fetched)?;
        write_patients_cache(cache_path, &merged, Provenance::Api)?;
        (merged, Provenance::Api)
    };

    tracing::info!(
        patient_count = patients.len(),
        source = ?source,
        rules_version = %rules.version,
        "running rule evaluation"
    );
    let output = evaluate(&patients, rules)?;

    Ok(AnalysisReport {
        metadata: AnalysisMetadata {
            generated_at: Utc::now(),
            source,
            rules_version: rules.version.clone(),
            patient_count: patients.len(),
        },
        alerts: output.alerts,
        scored_patients: output.scored,
    })
}

fn reconcile_with_cache(
    cache_path: &Path,
    fetched: Vec<Patient>,
) -> Result<Vec<Patient>, AnalysisError> {
    if !cache_exists(cache_path) {
        return Ok(fetched);
    }
    match read_patients_cache(cache_path) {
        Ok(snapshot) => Ok(merge_patients(&snapshot.patients, &fetched)),
        Err(StoreError::Corrupt { path, reason }) => {
            tracing::warn!(
                path = %path.display(),
                reason = %reason,
                "discarding corrupt patient cache in favour of fresh fetch"
            );
            Ok(fetched)
        }
        Err(err) => Err(err.into()),
    }
}

/// Persists a report at the configured path, creating parent
/// directories as needed.
pub fn save_analysis(path: &Path, report: &AnalysisReport) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(AnalysisError::ReportDirCreation)?;
        }
    }
    let json = serde_json::to_string_pretty(report).map_err(AnalysisError::ReportSerialization)?;
    fs::write(path, json).map_err(AnalysisError::ReportFileWrite)
}

/// Loads a previously saved report, distinguishing a missing report
/// from a corrupt one.
pub fn load_analysis(path: &Path) -> Result<AnalysisReport, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::ReportNotFound(path.to_owned()));
    }
    let raw = fs::read_to_string(path).map_err(AnalysisError::ReportFileRead)?;
    serde_json::from_str(&raw).map_err(|e| AnalysisError::ReportCorrupt {
        path: path.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, CacheConfig, RetryConfig};
    use tempfile::TempDir;
    use triage_engine::{AssignedList, PatientFlags};

    fn report() -> AnalysisReport {
        AnalysisReport {
            metadata: AnalysisMetadata {
                generated_at: Utc::now(),
                source: Provenance::Cache,
                rules_version: "1.0".to_owned(),
                patient_count: 1,
            },
            alerts: Alerts {
                high_risk_patients: vec!["p1".to_owned()],
                fever_patients: vec![],
                data_quality_issues: vec![],
            },
            scored_patients: vec![PatientOutcome {
                patient_id: "p1".to_owned(),
                total: 7,
                metrics: Default::default(),
                flags: PatientFlags {
                    data_quality_issue: false,
                    fever: false,
                    high_risk: true,
                },
                assigned_list: AssignedList::HighRiskPatients,
            }],
        }
    }

    #[test]
    fn save_then_load_round_trips_the_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("analysis.json");

        let original = report();
        save_analysis(&path, &original).unwrap();
        let loaded = load_analysis(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn loading_a_missing_report_is_distinct_from_corrupt() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("analysis.json");
        assert!(matches!(
            load_analysis(&missing),
            Err(AnalysisError::ReportNotFound(_))
        ));

        fs::write(&missing, "nonsense").unwrap();
        assert!(matches!(
            load_analysis(&missing),
            Err(AnalysisError::ReportCorrupt { .. })
        ));
    }

    #[test]
    fn load_rules_surfaces_validation_failures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"{ "version": "1",
                 "thresholds": { "highRiskTotalScoreMinInclusive": 6, "feverTempMinInclusive": 38 },
                 "metrics": [] }"#,
        )
        .unwrap();

        assert!(matches!(
            load_rules(&path),
            Err(AnalysisError::Rules(RulesError::NoMetrics))
        ));
    }

    #[tokio::test]
    async fn run_analysis_scores_the_cache_snapshot() {
        let dir = TempDir::new().unwrap();
        let patients_path = dir.path().join("patients.json");

        let mut febrile = Patient::with_id("p1");
        febrile.temperature = Some(39.5);
        write_patients_cache(&patients_path, &[febrile], Provenance::Api).unwrap();

        let config = AppConfig {
            api: ApiConfig {
                base_url: "https://upstream.example".to_owned(),
                api_key: "k".to_owned(),
                page_limit: 10,
                timeouts_ms: 1_000,
            },
            cache: CacheConfig {
                use_local_cache: true,
                patients_file_path: patients_path,
                analysis_file_path: dir.path().join("analysis.json"),
                rules_file_path: dir.path().join("rules.json"),
            },
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 10,
                max_delay_ms: 10,
                jitter_ratio: 0.0,
            },
        };
        let client = ApiClient::new(&config.api).unwrap();

        let rules = Rules::from_json_str(
            r#"{
                "version": "t1",
                "thresholds": { "highRiskTotalScoreMinInclusive": 6, "feverTempMinInclusive": 38 },
                "metrics": [{
                    "id": "temperature", "fields": ["temperature"],
                    "parserId": "numberLenient", "scorerId": "singleFieldRangeFirstMatch",
                    "rules": [{ "state": "febrile", "points": 2,
                                "rule": { "temperature": { "minInclusive": 38.0 } } }],
                    "invalidPoints": 0, "invalidCountsAsQualityIssue": false
                }]
            }"#,
        )
        .unwrap();

        let report = run_analysis(&client, &config, &rules).await.unwrap();
        assert_eq!(report.metadata.source, Provenance::Cache);
        assert_eq!(report.metadata.patient_count, 1);
        assert_eq!(report.metadata.rules_version, "t1");
        assert_eq!(report.alerts.fever_patients, vec!["p1"]);
        assert!(report.alerts.high_risk_patients.is_empty());
        assert_eq!(report.scored_patients[0].total, 2);
    }

    #[test]
    fn reconcile_discards_corrupt_snapshots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.json");
        fs::write(&path, "{ broken").unwrap();

        let fetched = vec![Patient::with_id("fresh")];
        let merged = reconcile_with_cache(&path, fetched.clone()).unwrap();
        assert_eq!(merged, fetched);
    }

    #[test]
    fn reconcile_merges_with_a_healthy_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.json");
        write_patients_cache(
            &path,
            &[Patient::with_id("old"), Patient::with_id("both")],
            Provenance::Api,
        )
        .unwrap();

        let mut updated = Patient::with_id("both");
        updated.temperature = Some(39.0);
        let merged = reconcile_with_cache(&path, vec![updated]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].patient_id, "both");
        assert_eq!(merged[1].temperature, Some(39.0));
    }
}
