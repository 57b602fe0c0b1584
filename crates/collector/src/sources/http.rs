use std::time::Duration;

use db::OffsetDateTime;
use derive_more::{Display, Error, From};
use reqwest::{header::HeaderMap, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::retry::Retryable;

/// Header that carries the unix timestamp at which a rate limit resets.
pub const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Errors of upstream HTTP requests.
#[derive(Debug, Display, Error, From)]
pub enum HttpError {
    #[display(fmt = "request failed: {}", _0)]
    Request(reqwest::Error),

    #[display(fmt = "unexpected response status: {}", _0)]
    #[from(ignore)]
    Status(#[error(ignore)] StatusCode),

    #[display(fmt = "rate limited for {:?}", _0)]
    #[from(ignore)]
    RateLimited(#[error(ignore)] Duration),
}

impl Retryable for HttpError {
    fn is_transient(&self) -> bool {
        match self {
            HttpError::Request(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            HttpError::Status(status) => status.is_server_error(),
            HttpError::RateLimited(_) => true,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            HttpError::RateLimited(delay) => Some(*delay),
            _ => None,
        }
    }
}

/// Delay until the rate limit resets, at least one second.
pub(crate) fn rate_limit_delay(headers: &HeaderMap, now: i64) -> Duration {
    let reset = headers
        .get(RATE_LIMIT_RESET)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.trim().parse::<i64>().ok())
        .unwrap_or(0);

    Duration::from_secs((reset - now).max(1) as u64)
}

/// Convert non-successful responses into errors.
pub(crate) fn check(response: Response) -> Result<Response, HttpError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        return Err(HttpError::RateLimited(rate_limit_delay(
            response.headers(),
            now,
        )));
    }

    if !status.is_success() {
        return Err(HttpError::Status(status));
    }

    Ok(response)
}

/// Send a request and decode a JSON response body.
pub(crate) async fn json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, HttpError> {
    let response = check(request.send().await?)?;

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::{header::HeaderMap, StatusCode};

    use super::{rate_limit_delay, HttpError, RATE_LIMIT_RESET};
    use crate::retry::Retryable;

    #[test]
    fn rate_limit_reset() {
        let mut headers = HeaderMap::new();

        assert_eq!(rate_limit_delay(&headers, 1000), Duration::from_secs(1));

        headers.insert(RATE_LIMIT_RESET, "1030".parse().expect("valid header"));
        assert_eq!(rate_limit_delay(&headers, 1000), Duration::from_secs(30));

        headers.insert(RATE_LIMIT_RESET, "900".parse().expect("valid header"));
        assert_eq!(rate_limit_delay(&headers, 1000), Duration::from_secs(1));
    }

    #[test]
    fn classification() {
        assert!(HttpError::Status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(!HttpError::Status(StatusCode::NOT_FOUND).is_transient());

        let limited = HttpError::RateLimited(Duration::from_secs(7));

        assert!(limited.is_transient());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
    }
}
