use std::time::Duration;

use common::config::Config;
use db::{DatabaseConnection, DbErr};
use derive_more::{Display, Error, From};
use tracing::{info, warn};

use crate::{
    reconcile::{reconcile, PricingContext, ScannedOffer},
    retry::RetryPolicy,
    snapshot::integration_status,
    sources::{self, market::MarketClient, HttpError},
    status::{apply_transitions, Observation},
};

#[derive(Debug, Display, Error, From)]
pub enum ScanError {
    DatabaseError(DbErr),

    #[display(fmt = "market request failed: {}", _0)]
    Upstream(HttpError),
}

/// Scan every configured subnet and reconcile collected offers.
///
/// Every provider that issued an offer is recorded online before its
/// offers are reconciled.
pub async fn scan(database: &DatabaseConnection, config: &Config) -> Result<(), ScanError> {
    let market = match MarketClient::new(sources::client()?, &config.market) {
        Ok(market) => market,
        Err(error) => {
            warn!(%error, "skipping market scan");
            integration_status(database, error.integration, false).await?;
            return Ok(());
        }
    };

    integration_status(database, "market", true).await?;

    let retry = RetryPolicy::from(&config.retry);
    let limit = Duration::from_secs(config.market.timeout);

    for subnet in &config.market.subnets {
        let offers = retry
            .run("market scan", || market.scan(subnet, limit))
            .await?;

        let now = db::utc_now();

        let batch: Vec<_> = offers
            .iter()
            .filter_map(|offer| ScannedOffer::from_raw(&offer.issuer_id, &offer.properties))
            .collect();

        let observations: Vec<_> = batch
            .iter()
            .map(|offer| Observation::online(offer.node_id.clone()))
            .collect();

        apply_transitions(database, &observations, now).await?;

        let ctx = PricingContext::load(database, now.date()).await?;
        let report = reconcile(database, batch, &ctx, now).await?;

        info!(%subnet, received = offers.len(), ?report, "market offers reconciled");
    }

    Ok(())
}
