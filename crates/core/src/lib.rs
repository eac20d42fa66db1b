//! # Triage Core
//!
//! Core pipeline for patient risk triage:
//! - resilient paginated fetch of patient records from an upstream API
//!   ([`fetch`], [`http`])
//! - normalization of inconsistently shaped payloads into canonical
//!   records ([`normalize`])
//! - a file-backed patient cache with identity-keyed merge ([`store`])
//! - analysis orchestration and report persistence ([`analysis`])
//! - assessment submission ([`submit`])
//!
//! Rule evaluation itself lives in `triage-engine`; the shared data
//! model in `triage-types`.
//!
//! **No transport or UI concerns**: HTTP route wiring, rendering and
//! process configuration loading belong to the surrounding system,
//! which hands the core a validated [`config::AppConfig`].

pub mod analysis;
pub mod config;
pub mod fetch;
pub mod http;
pub mod normalize;
pub mod store;
pub mod submit;

pub use analysis::{load_rules, run_analysis, AnalysisError, AnalysisReport};
pub use config::{AppConfig, ConfigError, RetryConfig};
pub use fetch::{fetch_all_patients, FetchError};
pub use http::{request_with_retry, ApiClient, HttpError};
pub use normalize::{normalize_patients_payload, NormalizedPage};
pub use store::{merge_patients, read_patients_cache, write_patients_cache, Provenance, StoreError};
pub use submit::{submit_assessment, SubmitError, SubmitReceipt};
