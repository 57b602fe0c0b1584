use common::config::Config;
use db::{DatabaseConnection, DbErr, OffsetDateTime};
use derive_more::{Display, Error, From};
use tracing::{info, warn};

use crate::{
    retry::RetryPolicy,
    snapshot::integration_status,
    sources::{self, metrics::MetricsClient, HttpError},
    status::{record_computing_total, set_computing},
};

#[derive(Debug, Display, Error, From)]
pub enum ComputingError {
    DatabaseError(DbErr),

    #[display(fmt = "metrics request failed: {}", _0)]
    Upstream(HttpError),
}

/// Mark providers that run an activity right now as computing and record
/// the daily computing total.
pub async fn computing(database: &DatabaseConnection, config: &Config) -> Result<(), ComputingError> {
    let metrics = match MetricsClient::new(sources::client()?, &config.metrics) {
        Ok(metrics) => metrics,
        Err(error) => {
            warn!(%error, "skipping computing flags update");
            integration_status(database, error.integration, false).await?;
            return Ok(());
        }
    };

    integration_status(database, "metrics", true).await?;

    let now = OffsetDateTime::now_utc().unix_timestamp();

    let computing: Vec<String> = RetryPolicy::from(&config.retry)
        .run("computing providers", || metrics.computing_providers(now))
        .await?
        .into_iter()
        .map(|node_id| node_id.trim().to_lowercase())
        .collect();

    info!(computing = computing.len(), "computing providers fetched");

    set_computing(database, computing).await?;

    let total = record_computing_total(database, db::utc_now()).await?;

    info!(total, "computing total recorded");

    Ok(())
}
