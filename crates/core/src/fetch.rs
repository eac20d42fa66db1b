//! Resilient paginated fetch of the full patient set.
//!
//! Pages are requested one at a time through the retry executor, each
//! page is normalized, and termination is decided from whatever
//! pagination signal the upstream has offered so far:
//!
//! 1. a reliable `totalPages` → stop once the page index reaches it;
//! 2. else a reliable `total` count → stop once the distinct-id count
//!    reaches it, or after two consecutive empty pages;
//! 3. else → stop after two consecutive empty pages.
//!
//! A request still failing with 429 after the retry budget aborts the
//! whole fetch with a distinct rate-limited outcome, so callers can
//! message the user differently from ordinary failures.

use crate::config::AppConfig;
use crate::http::{request_with_retry, ApiClient, HttpError};
use crate::normalize::normalize_patients_payload;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use triage_types::Patient;

/// Courtesy delay between page requests, applied regardless of outcome.
pub const INTER_PAGE_DELAY: Duration = Duration::from_millis(400);

/// Consecutive empty pages tolerated before giving up on heuristic
/// termination.
pub const MAX_EMPTY_PAGES: u32 = 2;

/// Errors raised by a full paginated fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Rate limit still in force after retries were exhausted. Kept
    /// separate from other failures so the caller can surface a
    /// user-actionable message naming the failing page.
    #[error("upstream rate limit exceeded on page {page}")]
    RateLimited { page: u32 },
    #[error("page {page} request failed")]
    Page {
        page: u32,
        #[source]
        source: HttpError,
    },
}

/// Fetches all pages from the configured upstream `/patients` endpoint.
pub async fn fetch_all_patients(
    client: &ApiClient,
    config: &AppConfig,
) -> Result<Vec<Patient>, FetchError> {
    let limit = config.api.page_limit;
    fetch_all_pages(config, INTER_PAGE_DELAY, |page| async move {
        client
            .get_json(
                "/patients",
                &[("page", page.to_string()), ("limit", limit.to_string())],
            )
            .await
    })
    .await
}

/// Drives the page loop over an arbitrary page source. Split from
/// [`fetch_all_patients`] so termination policy can be exercised
/// without a live HTTP client.
pub async fn fetch_all_pages<F, Fut>(
    config: &AppConfig,
    inter_page_delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<Patient>, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Value, HttpError>>,
{
    let mut all: Vec<Patient> = Vec::new();
    let mut page: u32 = 1;
    let mut total_pages: Option<u32> = None;
    let mut expected_total: Option<u64> = None;
    let mut empty_streak: u32 = 0;

    loop {
        let payload = match request_with_retry(&config.retry, || fetch_page(page)).await {
            Ok(payload) => payload,
            Err(err) if err.status() == Some(429) => {
                return Err(FetchError::RateLimited { page });
            }
            Err(err) => return Err(FetchError::Page { page, source: err }),
        };

        let normalized = normalize_patients_payload(&payload);
        tracing::info!(
            page,
            extracted = normalized.debug.extracted_raw,
            normalized = normalized.debug.normalized,
            dropped = normalized.debug.dropped,
            "fetched patient page"
        );

        // Remember any reliable signal seen on any page so far.
        if let Some(pagination) = &normalized.pagination {
            if let Some(tp) = pagination.total_pages {
                total_pages = Some(tp);
            }
            if let Some(total) = pagination.total {
                expected_total = Some(total);
            }
        }

        if normalized.patients.is_empty() {
            empty_streak += 1;
        } else {
            empty_streak = 0;
        }
        all.extend(normalized.patients);

        if let Some(tp) = total_pages {
            if page >= tp {
                break;
            }
        } else if let Some(total) = expected_total {
            let distinct = all
                .iter()
                .map(|p| p.patient_id.as_str())
                .collect::<HashSet<_>>()
                .len() as u64;
            if distinct >= total || empty_streak >= MAX_EMPTY_PAGES {
                break;
            }
        } else if empty_streak >= MAX_EMPTY_PAGES {
            break;
        }

        page += 1;
        tokio::time::sleep(inter_page_delay).await;
    }

    Ok(dedup_last_wins(all))
}

/// Deduplicates by `patient_id`, keeping first-appearance order while
/// a later record for the same id overwrites an earlier one.
pub fn dedup_last_wins(patients: Vec<Patient>) -> Vec<Patient> {
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Patient> = Vec::new();
    for patient in patients {
        match slot.get(&patient.patient_id) {
            Some(&index) => out[index] = patient,
            None => {
                slot.insert(patient.patient_id.clone(), out.len());
                out.push(patient);
            }
        }
    }
    out
}
