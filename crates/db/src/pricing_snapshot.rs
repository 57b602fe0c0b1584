//! Daily pricing summary of a single network.
//!
//! At most one snapshot exists per `(network, date)` pair.

use sea_orm::entity::prelude::*;

use crate::node::Network;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pricing_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub network: Network,

    /// Summarized day.
    pub date: TimeDate,

    pub average_cpu_price: f64,
    pub median_cpu_price: f64,
    pub average_env_price: f64,
    pub median_env_price: f64,
    pub average_start_price: f64,
    pub median_start_price: f64,

    /// Snapshot computation timestamp.
    pub created_at: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
