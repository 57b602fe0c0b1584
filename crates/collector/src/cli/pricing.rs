use common::config::Config;
use db::{node::Network, DatabaseConnection, DbErr, OffsetDateTime};
use derive_more::{Display, Error, From};
use tracing::{info, warn};

use crate::{
    aggregate,
    retry::RetryPolicy,
    snapshot::integration_status,
    sources::{self, metrics::MetricsClient, HttpError},
};

#[derive(Debug, Display, Error, From)]
pub enum PricingError {
    DatabaseError(DbErr),

    #[display(fmt = "metrics request failed: {}", _0)]
    Upstream(HttpError),
}

/// Record prices of providers that recently received tasks.
pub async fn pricing_samples(
    database: &DatabaseConnection,
    config: &Config,
) -> Result<(), PricingError> {
    let metrics = match MetricsClient::new(sources::client()?, &config.metrics) {
        Ok(metrics) => metrics,
        Err(error) => {
            warn!(%error, "skipping pricing samples");
            integration_status(database, error.integration, false).await?;
            return Ok(());
        }
    };

    integration_status(database, "metrics", true).await?;

    let now = OffsetDateTime::now_utc().unix_timestamp();

    let providers: Vec<String> = RetryPolicy::from(&config.retry)
        .run("providers with tasks", || metrics.providers_with_tasks(now))
        .await?
        .into_iter()
        .map(|node_id| node_id.trim().to_lowercase())
        .collect();

    let recorded = aggregate::record_pricing_samples(database, providers, db::utc_now()).await?;

    info!(recorded, "pricing samples recorded");

    Ok(())
}

/// Store the pricing snapshot of the previous day.
pub async fn pricing_snapshot(database: &DatabaseConnection, network: Network) -> Result<(), DbErr> {
    aggregate::pricing_snapshot(database, network, db::utc_now()).await?;

    Ok(())
}
