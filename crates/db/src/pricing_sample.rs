//! Hourly price sample of a provider that received a task.
//!
//! Samples feed pricing snapshots and past hour pricing statistics.

use sea_orm::entity::prelude::*;

use crate::node::Network;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pricing_samples")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub node_id: i64,
    pub offer_id: i64,

    /// CPU price per hour, in GLM.
    pub cpu_per_hour: Option<f64>,

    /// Environment price per hour, in GLM.
    pub env_per_hour: Option<f64>,

    /// Flat start price, in GLM.
    pub start_price: Option<f64>,

    pub network: Network,
    pub created_at: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::node::Entity",
        from = "Column::NodeId",
        to = "super::node::Column::Id"
    )]
    Node,

    #[sea_orm(
        belongs_to = "super::offer::Entity",
        from = "Column::OfferId",
        to = "super::offer::Column::Id"
    )]
    Offer,
}

impl ActiveModelBehavior for ActiveModel {}
