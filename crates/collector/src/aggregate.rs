//! Rolling aggregates over the collected telemetry.
//!
//! Aggregates are computed from range queries and published to the
//! [`SnapshotStore`] under stable keys, which read endpoints serve as is.

mod network;
mod nodes;
mod pricing;
pub(crate) mod stats;
mod transactions;
mod window;

use std::collections::HashMap;

use clap::ValueEnum;
use db::{DatabaseConnection, DbErr, PrimitiveDateTime};
use serde_json::Value;

pub use network::{materialize_daily_max, network_online_stats, sample_network_stats};
pub use pricing::{pricing_snapshot, record_pricing_samples};

use network::historical_stats;
use nodes::{
    cheapest_offers, cheapest_providers, computing_totals, cpu_architectures, cpu_vendors,
    online_counts, online_nodes, reference_comparison, uptime_donut, wallets_and_ids,
};
use pricing::{charted, past_hour};
use transactions::{
    amount_over_time, average_value_over_time, daily_type_counts, daily_volume, type_comparison,
    volume_over_time,
};

use crate::{snapshot::SnapshotStore, sources::reputation::ProviderReputation};

/// Aggregate that is recomputed from stored data and published as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Report {
    NetworkHistory,
    PricingPastHour,
    PricingCharted,
    UptimeDonut,
    OnlineCounts,
    OnlineNodes,
    ReferenceComparison,
    DailyVolume,
    DailyTypeCounts,
    CpuVendors,
    CpuArchitectures,
    CheapestOffers,
    CheapestProviders,
    TransactionVolume,
    AmountTransferred,
    AverageTransactionValue,
    TransactionTypeComparison,
    ComputingTotals,
    WalletsAndIds,
}

impl Report {
    /// Snapshot key the report is published under.
    pub fn key(&self) -> &'static str {
        match self {
            Report::NetworkHistory => "network_historical_stats_v2",
            Report::PricingPastHour => "pricing_past_hour_v2",
            Report::PricingCharted => "pricing_data_charted_v2",
            Report::UptimeDonut => "online_nodes_uptime_donut_data",
            Report::OnlineCounts => "v2_online_counts",
            Report::OnlineNodes => "v2_online",
            Report::ReferenceComparison => "ec2_comparison",
            Report::DailyVolume => "daily_volume_golem_vs_chain",
            Report::DailyTypeCounts => "daily_transaction_type_counts",
            Report::CpuVendors => "cpu_vendors_count",
            Report::CpuArchitectures => "cpu_architecture_count",
            Report::CheapestOffers => "v2_cheapest_offer",
            Report::CheapestProviders => "v2_cheapest_provider",
            Report::TransactionVolume => "transaction_volume_over_time",
            Report::AmountTransferred => "amount_transferred_over_time",
            Report::AverageTransactionValue => "average_transaction_value_over_time",
            Report::TransactionTypeComparison => "transaction_type_comparison",
            Report::ComputingTotals => "computing_total_over_time",
            Report::WalletsAndIds => "wallets_and_ids",
        }
    }

    /// Compute the report.
    ///
    /// Reputation is only used by [`Report::OnlineNodes`].
    pub async fn compute(
        &self,
        db: &DatabaseConnection,
        reputation: &HashMap<String, ProviderReputation>,
        now: PrimitiveDateTime,
    ) -> Result<Value, DbErr> {
        match self {
            Report::NetworkHistory => historical_stats(db, now).await,
            Report::PricingPastHour => past_hour(db, now).await,
            Report::PricingCharted => charted(db, now).await,
            Report::UptimeDonut => uptime_donut(db, now).await,
            Report::OnlineCounts => online_counts(db, now).await,
            Report::OnlineNodes => online_nodes(db, reputation, now).await,
            Report::ReferenceComparison => reference_comparison(db).await,
            Report::DailyVolume => daily_volume(db, now).await,
            Report::DailyTypeCounts => daily_type_counts(db, now).await,
            Report::CpuVendors => cpu_vendors(db).await,
            Report::CpuArchitectures => cpu_architectures(db).await,
            Report::CheapestOffers => cheapest_offers(db, now).await,
            Report::CheapestProviders => cheapest_providers(db).await,
            Report::TransactionVolume => volume_over_time(db, now).await,
            Report::AmountTransferred => amount_over_time(db, now).await,
            Report::AverageTransactionValue => average_value_over_time(db, now).await,
            Report::TransactionTypeComparison => type_comparison(db, now).await,
            Report::ComputingTotals => computing_totals(db, now).await,
            Report::WalletsAndIds => wallets_and_ids(db).await,
        }
    }

    /// Compute and publish the report.
    pub async fn publish<S: SnapshotStore + ?Sized>(
        &self,
        db: &DatabaseConnection,
        store: &S,
        reputation: &HashMap<String, ProviderReputation>,
        now: PrimitiveDateTime,
    ) -> Result<(), DbErr> {
        let value = self.compute(db, reputation, now).await?;
        store.put(self.key(), value).await
    }
}
