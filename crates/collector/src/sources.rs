//! Clients of upstream telemetry collaborators.
//!
//! Every client is constructed from its configuration section. Integrations
//! that require credentials refuse to construct without them and return
//! [`NotConfigured`], which tasks surface as a disabled integration.

pub mod catalog;
pub mod exchange;
pub mod http;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod relay;
pub mod reputation;

use std::time::Duration;

use derive_more::{Display, Error};

pub use http::HttpError;

/// Timeout of a single non-streaming upstream request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Optional integration is missing required configuration.
#[derive(Debug, Display, Error)]
#[display(fmt = "{} integration is not configured", integration)]
pub struct NotConfigured {
    pub integration: &'static str,
}

impl NotConfigured {
    pub fn new(integration: &'static str) -> Self {
        Self { integration }
    }
}

/// Build an HTTP client used by request-response upstreams.
pub(crate) fn client() -> Result<reqwest::Client, HttpError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Build an HTTP client without a total request timeout,
/// suitable for long-lived streams.
pub(crate) fn streaming_client() -> Result<reqwest::Client, HttpError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(REQUEST_TIMEOUT)
        .build()?)
}
