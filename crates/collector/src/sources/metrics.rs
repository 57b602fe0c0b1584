//! Prometheus-compatible network metrics backend.

use serde::Deserialize;
use serde_json::Value;

use super::{http, HttpError, NotConfigured};

const PROVIDERS_WITH_TASKS: &str =
    r#"increase(payment_invoices_provider_accepted{exported_job="community.1"}[10m]) > 0"#;

const ACTIVE_ACTIVITIES: &str =
    r#"activity_provider_created{job="community.1"} - activity_provider_destroyed{job="community.1"}"#;

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Series>,
}

#[derive(Debug, Deserialize)]
struct Series {
    metric: SeriesMetric,

    #[serde(default)]
    values: Vec<(Value, String)>,
}

#[derive(Debug, Deserialize)]
struct SeriesMetric {
    exported_instance: Option<String>,
}

impl QueryResponse {
    /// Instances of every returned series.
    pub(crate) fn instances(self) -> Vec<String> {
        self.data
            .result
            .into_iter()
            .filter_map(|series| series.metric.exported_instance)
            .collect()
    }

    /// Instances whose latest sample equals `1`.
    pub(crate) fn active_instances(self) -> Vec<String> {
        self.data
            .result
            .into_iter()
            .filter(|series| matches!(series.values.last(), Some((_, val)) if val == "1"))
            .filter_map(|series| series.metric.exported_instance)
            .collect()
    }
}

/// Network metrics client.
pub struct MetricsClient {
    client: reqwest::Client,
    url: String,
}

impl MetricsClient {
    pub fn new(
        client: reqwest::Client,
        config: &common::config::Metrics,
    ) -> Result<Self, NotConfigured> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| NotConfigured::new("metrics"))?;

        Ok(Self { client, url })
    }

    async fn query_range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step: u32,
    ) -> Result<QueryResponse, HttpError> {
        let request = self.client.get(&self.url).query(&[
            ("query", query.to_owned()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("step", step.to_string()),
        ]);

        http::json(request).await
    }

    /// Providers that accepted an invoice during the last ten minutes.
    pub async fn providers_with_tasks(&self, now: i64) -> Result<Vec<String>, HttpError> {
        Ok(self
            .query_range(PROVIDERS_WITH_TASKS, now, now, 5)
            .await?
            .instances())
    }

    /// Providers running at least one activity right now.
    pub async fn computing_providers(&self, now: i64) -> Result<Vec<String>, HttpError> {
        Ok(self
            .query_range(ACTIVE_ACTIVITIES, now - 10, now, 1)
            .await?
            .active_instances())
    }
}
