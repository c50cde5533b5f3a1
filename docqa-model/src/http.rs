//! HTTP plumbing shared by the hosted providers.

use std::time::Duration;

use docqa_core::{DocqaError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::error;

/// Build a client whose every request is bounded by `timeout`.
pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
        DocqaError::Configuration(format!("failed to build {provider} HTTP client: {e}"))
    })
}

/// Map a transport-level failure onto the error taxonomy.
pub(crate) fn classify_transport(provider: &str, err: reqwest::Error) -> DocqaError {
    error!(provider, error = %err, "request failed");
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        DocqaError::transient(provider, format!("request failed: {err}"))
    } else {
        DocqaError::provider(provider, format!("request failed: {err}"))
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    detail: String,
) -> DocqaError {
    let message = format!("API returned {status}: {detail}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DocqaError::Authentication { provider: provider.into(), message }
        }
        StatusCode::TOO_MANY_REQUESTS => DocqaError::QuotaExceeded {
            provider: provider.into(),
            message,
            retry_after: parse_retry_after(headers),
        },
        StatusCode::REQUEST_TIMEOUT => DocqaError::transient(provider, message),
        s if s.is_server_error() => DocqaError::transient(provider, message),
        _ => DocqaError::provider(provider, message),
    }
}

/// Read a `Retry-After` header expressed in (possibly fractional) seconds.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

/// Check the status and decode a JSON body.
///
/// `error_detail` pulls a human readable message out of the provider's
/// error body; when it returns `None` the raw body is used.
pub(crate) async fn read_json<T, F>(provider: &str, response: Response, error_detail: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> Option<String>,
{
    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body).unwrap_or(body);
        error!(provider, %status, "API error");
        return Err(classify_status(provider, status, &headers, detail));
    }

    response.json::<T>().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        if e.is_timeout() {
            DocqaError::transient(provider, format!("timed out reading response: {e}"))
        } else {
            DocqaError::provider(provider, format!("failed to parse response: {e}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use docqa_core::ErrorKind;
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        let headers = HeaderMap::new();
        let kind = |status| classify_status("OpenAI", status, &headers, String::new()).kind();
        assert_eq!(kind(StatusCode::UNAUTHORIZED), ErrorKind::Authentication);
        assert_eq!(kind(StatusCode::FORBIDDEN), ErrorKind::Authentication);
        assert_eq!(kind(StatusCode::TOO_MANY_REQUESTS), ErrorKind::QuotaExceeded);
        assert_eq!(kind(StatusCode::REQUEST_TIMEOUT), ErrorKind::Transient);
        assert_eq!(kind(StatusCode::SERVICE_UNAVAILABLE), ErrorKind::Transient);
        assert_eq!(kind(StatusCode::BAD_GATEWAY), ErrorKind::Transient);
        assert_eq!(kind(StatusCode::BAD_REQUEST), ErrorKind::Provider);
        assert_eq!(kind(StatusCode::NOT_FOUND), ErrorKind::Provider);
    }

    #[test]
    fn quota_carries_retry_after_hint() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2.5"));
        let err = classify_status(
            "Gemini",
            StatusCode::TOO_MANY_REQUESTS,
            &headers,
            "Resource has been exhausted".into(),
        );
        assert_eq!(err.retry_after(), Some(Duration::from_millis(2500)));
        assert!(err.to_string().contains("Resource has been exhausted"));
    }

    #[test]
    fn unparseable_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
