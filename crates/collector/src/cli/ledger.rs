use common::config::Config;
use db::{DatabaseConnection, OffsetDateTime};
use tracing::info;

use crate::{
    ledger::{backfill, follow, Backfill, LedgerError},
    retry::RetryPolicy,
    sources::{self, ledger::LedgerClient},
};

/// Index historical transfers, unless the ledger was already indexed.
pub async fn ledger_backfill(
    database: &DatabaseConnection,
    config: &Config,
) -> Result<(), LedgerError> {
    let feed = LedgerClient::new(sources::client()?, &config.ledger);
    let retry = RetryPolicy::from(&config.retry);
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let outcome = backfill(database, &feed, &retry, Backfill::from(&config.ledger), now).await?;
    info!(?outcome, "ledger backfill finished");

    Ok(())
}

/// Index transfers newer than the stored cursor.
pub async fn ledger_follow(database: &DatabaseConnection, config: &Config) -> Result<(), LedgerError> {
    let feed = LedgerClient::new(sources::client()?, &config.ledger);
    let retry = RetryPolicy::from(&config.retry);
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let outcome = follow(database, &feed, &retry, now).await?;
    info!(?outcome, "ledger follow finished");

    Ok(())
}
