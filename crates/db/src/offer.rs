//! Current capability and price advertisement of one (node, runtime) pair.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Related node identifier.
    pub node_id: i64,

    /// Runtime name, e.g. `vm` or `wasmtime`.
    pub runtime: String,

    /// Flattened offer properties.
    pub properties: Json,

    pub monthly_price_glm: Option<f64>,
    pub monthly_price_usd: Option<f64>,
    pub hourly_price_glm: Option<f64>,
    pub hourly_price_usd: Option<f64>,

    /// Whether the offer is more expensive than the closest reference instance.
    pub is_overpriced: bool,

    /// Reference instance this offer is more expensive than.
    pub overpriced_compared_to: Option<i64>,
    pub times_more_expensive: Option<f64>,

    /// Reference instance this offer is cheaper than.
    pub cheaper_than: Option<i64>,
    pub times_cheaper: Option<f64>,

    /// Hourly environment price at which an overpriced offer
    /// would match its reference instance.
    pub suggest_env_per_hour_price: Option<f64>,

    pub created_at: TimeDateTime,
    pub updated_at: TimeDateTime,
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
        belongs_to = "super::reference_instance::Entity",
        from = "Column::OverpricedComparedTo",
        to = "super::reference_instance::Column::Id"
    )]
    OverpricedComparedTo,

    #[sea_orm(
        belongs_to = "super::reference_instance::Entity",
        from = "Column::CheaperThan",
        to = "super::reference_instance::Column::Id"
    )]
    CheaperThan,
}

impl Related<super::node::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Node.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
