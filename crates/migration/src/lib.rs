pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_nodes_table;
mod m20240101_000002_create_reference_instances_table;
mod m20240101_000003_create_offers_table;
mod m20240101_000004_create_node_status_history_table;
mod m20240101_000005_create_pricing_samples_table;
mod m20240101_000006_create_pricing_snapshots_table;
mod m20240101_000007_create_network_stats_table;
mod m20240101_000008_create_network_stats_max_table;
mod m20240101_000009_create_golem_transactions_table;
mod m20240101_000010_create_transaction_scraper_cursor_table;
mod m20240101_000011_create_relay_nodes_table;
mod m20240101_000012_create_requestors_table;
mod m20240101_000013_create_exchange_rates_table;
mod m20240101_000014_create_snapshots_table;
mod m20240101_000015_create_computing_totals_table;

pub(crate) use m20240101_000001_create_nodes_table::Nodes;
pub(crate) use m20240101_000002_create_reference_instances_table::ReferenceInstances;
pub(crate) use m20240101_000003_create_offers_table::Offers;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_nodes_table::Migration),
            Box::new(m20240101_000002_create_reference_instances_table::Migration),
            Box::new(m20240101_000003_create_offers_table::Migration),
            Box::new(m20240101_000004_create_node_status_history_table::Migration),
            Box::new(m20240101_000005_create_pricing_samples_table::Migration),
            Box::new(m20240101_000006_create_pricing_snapshots_table::Migration),
            Box::new(m20240101_000007_create_network_stats_table::Migration),
            Box::new(m20240101_000008_create_network_stats_max_table::Migration),
            Box::new(m20240101_000009_create_golem_transactions_table::Migration),
            Box::new(m20240101_000010_create_transaction_scraper_cursor_table::Migration),
            Box::new(m20240101_000011_create_relay_nodes_table::Migration),
            Box::new(m20240101_000012_create_requestors_table::Migration),
            Box::new(m20240101_000013_create_exchange_rates_table::Migration),
            Box::new(m20240101_000014_create_snapshots_table::Migration),
            Box::new(m20240101_000015_create_computing_totals_table::Migration),
        ]
    }
}
