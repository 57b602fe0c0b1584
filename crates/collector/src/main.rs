mod aggregate;
mod cli;
mod ledger;
mod reconcile;
mod retry;
mod snapshot;
mod sources;
mod status;
mod uptime;

#[cfg(test)]
mod testing;

use clap::Parser;
use cli::{Cli, Command};
use common::{config::Config, logging};
use db::Database;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = Config::new(cli.config)?;

    logging::init(&config);

    info!("connecting to database");
    let database = Database::connect(&config.database.url).await?;

    match cli.command {
        Command::Scan => cli::scan(&database, &config).await?,
        Command::RelayMonitor => cli::relay_monitor(&database, &config).await?,
        Command::Computing => cli::computing(&database, &config).await?,
        Command::ExchangeRate => cli::exchange_rate(&database, &config).await?,
        Command::Catalog => cli::catalog(&database, &config).await?,
        Command::PricingSamples => cli::pricing_samples(&database, &config).await?,
        Command::PricingSnapshot { network } => {
            cli::pricing_snapshot(&database, network.into()).await?
        }
        Command::NetworkStats => cli::network_stats(&database).await?,
        Command::MaxStats { days } => cli::max_stats(&database, days).await?,
        Command::Publish { report } => cli::publish(&database, &config, report).await?,
        Command::LedgerBackfill => cli::ledger_backfill(&database, &config).await?,
        Command::LedgerFollow => cli::ledger_follow(&database, &config).await?,
        Command::RegisterRequestors { node_ids } => {
            cli::register_requestors(&database, node_ids).await?
        }
    }

    Ok(())
}
