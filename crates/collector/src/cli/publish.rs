use std::collections::HashMap;

use common::config::Config;
use db::{DatabaseConnection, DbErr};
use derive_more::{Display, Error, From};
use tracing::{info, warn};

use crate::{
    aggregate::Report,
    retry::RetryPolicy,
    sources::{self, reputation::ReputationClient, HttpError},
};

#[derive(Debug, Display, Error, From)]
pub enum PublishError {
    DatabaseError(DbErr),
    HttpError(HttpError),
}

/// Compute a report and publish it under its snapshot key.
///
/// Reputation is only fetched for reports that include it. The report is
/// still published without reputation if the reputation service fails.
pub async fn publish(
    database: &DatabaseConnection,
    config: &Config,
    report: Report,
) -> Result<(), PublishError> {
    let reputation = if report == Report::OnlineNodes {
        let client = ReputationClient::new(sources::client()?, &config.reputation);

        match RetryPolicy::from(&config.retry)
            .run("provider reputation", || client.online())
            .await
        {
            Ok(reputation) => reputation,
            Err(error) => {
                warn!(%error, "unable to fetch provider reputation");
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    };

    report
        .publish(database, database, &reputation, db::utc_now())
        .await?;

    info!(key = report.key(), "report published");

    Ok(())
}
