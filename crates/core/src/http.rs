//! Upstream HTTP client and the retry executor.
//!
//! [`ApiClient`] is a thin wrapper over `reqwest` that classifies every
//! failure into the [`HttpError`] taxonomy the rest of the pipeline
//! relies on: transient failures (timeouts, connection errors, a small
//! set of retryable statuses) are retried by [`request_with_retry`],
//! everything else propagates immediately.
//!
//! Delay selection honours a server-supplied retry directive when one
//! is present (a `Retry-After` header in seconds or HTTP-date form, or
//! a `retry_after` body field in seconds), otherwise falls back to
//! clamped exponential backoff with symmetric jitter.

use crate::config::{ApiConfig, RetryConfig};
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// HTTP statuses worth retrying: rate limiting and transient 5xx.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors raised by upstream requests.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("api key is not a valid header value")]
    InvalidApiKey,
    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("upstream returned HTTP {status}")]
    Status {
        status: u16,
        /// Server-supplied retry directive, already floored at zero.
        retry_after: Option<Duration>,
        /// Response body, when it was readable JSON.
        body: Option<Value>,
    },
    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl HttpError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the retry executor may try this request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Timeout(_) | HttpError::Connect(_) => true,
            HttpError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Server-supplied retry directive attached to this failure.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HttpError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Client for the upstream patients API.
///
/// Carries the base URL, the request timeout and the `x-api-key`
/// header; all requests go through [`Self::get_json`] /
/// [`Self::post_json`] so that failure classification happens in one
/// place.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(api: &ApiConfig) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        let key =
            HeaderValue::from_str(&api.api_key).map_err(|_| HttpError::InvalidApiKey)?;
        headers.insert("x-api-key", key);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(api.timeouts_ms))
            .default_headers(headers)
            .build()
            .map_err(HttpError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Issues a GET and returns the JSON body.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, HttpError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(classify_send_error)?;
        decode_response(response).await
    }

    /// Issues a POST with a JSON body and returns the JSON response.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, HttpError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(classify_send_error)?;
        decode_response(response).await
    }
}

fn classify_send_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(err)
    } else if err.is_connect() {
        HttpError::Connect(err)
    } else {
        HttpError::Transport(err)
    }
}

async fn decode_response(response: reqwest::Response) -> Result<Value, HttpError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(HttpError::Decode);
    }

    let header_directive = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_header);
    let body: Option<Value> = response.json().await.ok();
    let retry_after = header_directive.or_else(|| body.as_ref().and_then(retry_after_from_body));

    Err(HttpError::Status {
        status: status.as_u16(),
        retry_after,
        body,
    })
}

/// Parses a `Retry-After` header as delay seconds or as an HTTP date.
/// A date in the past yields a zero delay.
pub(crate) fn parse_retry_after_header(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }

    let at: DateTime<Utc> = DateTime::parse_from_rfc2822(trimmed).ok()?.into();
    let delta_ms = (at - Utc::now()).num_milliseconds().max(0);
    Some(Duration::from_millis(delta_ms as u64))
}

/// Reads a `retry_after` field (seconds, number or numeric string)
/// from a failure response body.
pub(crate) fn retry_after_from_body(body: &Value) -> Option<Duration> {
    let seconds = match body.get("retry_after")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

/// Exponential backoff for the given zero-based attempt index,
/// clamped to `[base_delay_ms, max_delay_ms]`.
pub(crate) fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let exponential = retry.base_delay_ms.saturating_mul(factor);
    let clamped = exponential.clamp(retry.base_delay_ms, retry.max_delay_ms);
    Duration::from_millis(clamped)
}

/// Applies symmetric jitter of `±(delay * ratio)`, floored at zero.
pub(crate) fn with_jitter(delay: Duration, ratio: f64) -> Duration {
    let ms = delay.as_millis() as f64;
    let offset = rand::thread_rng().gen_range(-1.0..=1.0) * ms * ratio;
    Duration::from_millis((ms + offset).max(0.0) as u64)
}

/// Executes an idempotent upstream operation with retries.
///
/// The operation runs up to `max_retries + 1` times. Only retryable
/// failures (per [`HttpError::is_retryable`]) are retried; anything
/// else propagates immediately. On budget exhaustion the last observed
/// failure is returned unchanged.
pub async fn request_with_retry<T, F, Fut>(retry: &RetryConfig, mut op: F) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= retry.max_retries {
            return Err(err);
        }

        let delay = err
            .retry_after()
            .unwrap_or_else(|| backoff_delay(retry, attempt));
        tracing::warn!(
            status = err.status(),
            attempt = attempt + 1,
            max_retries = retry.max_retries,
            "retrying upstream request"
        );
        tokio::time::sleep(with_jitter(delay, retry.jitter_ratio)).await;
        attempt += 1;
    }
}
