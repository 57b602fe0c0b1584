//! Compute provider identity.
//!
//! Nodes are created on first sighting in any upstream scan or relay event
//! and are never deleted. `computing_now` must be `false` whenever `online`
//! is `false`, every write path in the collector upholds that.

use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Provider node model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    /// Unique node identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Network address of a provider node.
    #[sea_orm(unique)]
    pub node_id: String,

    /// Payment address advertised by the node.
    pub wallet: Option<String>,

    /// Last observed online status.
    pub online: bool,

    /// Whether the node is running an activity right now.
    pub computing_now: bool,

    /// Provider software version.
    pub version: Option<String>,

    /// Payment network the node accepts payments on.
    pub network: Network,

    /// Node discovery timestamp.
    pub created_at: TimeDateTime,

    /// Last update timestamp.
    pub updated_at: TimeDateTime,

    /// Start of the uptime accounting window.
    pub uptime_created_at: TimeDateTime,
}

/// Payment network of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[sea_orm(num_value = 0)]
    Mainnet,
    #[sea_orm(num_value = 1)]
    Testnet,
    #[sea_orm(num_value = 2)]
    Unknown,
}

impl Network {
    /// Networks that are reported separately in published aggregates.
    pub const REPORTED: [Network; 2] = [Network::Mainnet, Network::Testnet];

    /// Lowercase network name, as used in published aggregate keys.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Unknown => "unknown",
        }
    }
}

/// Node model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::offer::Entity")]
    Offers,

    #[sea_orm(has_many = "super::node_status_history::Entity")]
    StatusHistory,
}

impl Related<super::offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl Related<super::node_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
