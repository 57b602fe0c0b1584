mod catalog;
mod computing;
mod exchange_rate;
mod ledger;
mod network_stats;
mod pricing;
mod publish;
mod relay;
mod requestors;
mod scan;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use db::node::Network;

use crate::aggregate::Report;

pub use catalog::catalog;
pub use computing::computing;
pub use exchange_rate::exchange_rate;
pub use ledger::{ledger_backfill, ledger_follow};
pub use network_stats::{max_stats, network_stats};
pub use pricing::{pricing_samples, pricing_snapshot};
pub use publish::publish;
pub use relay::relay_monitor;
pub use requestors::register_requestors;
pub use scan::scan;

#[derive(Parser)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Configuration file path, `Config.toml` by default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scan market subnets for offers and reconcile them with stored nodes and offers.
    Scan,

    /// Apply relay server node listing, then follow relay node events.
    RelayMonitor,

    /// Update computing flags from the network metrics backend.
    Computing,

    /// Update the GLM to USD exchange rate.
    ExchangeRate,

    /// Synchronize reference instances with the pricing catalog.
    Catalog,

    /// Record hourly prices of providers that recently received tasks.
    PricingSamples,

    /// Store average and median prices of the previous day.
    PricingSnapshot {
        #[arg(long, value_enum)]
        network: ReportedNetwork,
    },

    /// Sample resources of online offers and publish network totals.
    NetworkStats,

    /// Fill missing daily maximum network stats.
    MaxStats {
        /// Count of full days before today to cover.
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Compute and publish an aggregate report.
    Publish {
        #[arg(value_enum)]
        report: Report,
    },

    /// Index historical ledger transfers.
    LedgerBackfill,

    /// Index ledger transfers newer than the stored cursor.
    LedgerFollow,

    /// Register requestor node identifiers as known network participants.
    RegisterRequestors {
        #[arg(required = true)]
        node_ids: Vec<String>,
    },
}

/// Network with separately reported aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReportedNetwork {
    Mainnet,
    Testnet,
}

impl From<ReportedNetwork> for Network {
    fn from(network: ReportedNetwork) -> Self {
        match network {
            ReportedNetwork::Mainnet => Network::Mainnet,
            ReportedNetwork::Testnet => Network::Testnet,
        }
    }
}
