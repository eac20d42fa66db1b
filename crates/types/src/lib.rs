//! # Triage Types
//!
//! Shared data model for the patient triage pipeline:
//! - [`Patient`] and [`Pagination`] — the canonical shapes produced by
//!   payload normalization
//! - [`Rules`] and its sub-types — the declarative, externally
//!   configured scoring document
//!
//! **No behaviour**: fetching, normalization, scoring and storage live
//! in `triage-core` and `triage-engine`. This crate only defines the
//! records they exchange, plus fail-fast structural validation for the
//! rules document.

pub mod patient;
pub mod rules;

pub use patient::{Pagination, Patient};
pub use rules::{Logic, MetricConfig, MetricRule, RangeRule, Rules, RulesError, Thresholds};
