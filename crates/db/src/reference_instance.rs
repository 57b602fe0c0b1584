//! Priced external cloud instance used as a comparison baseline.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reference_instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Instance type name, e.g. `m5.xlarge`.
    #[sea_orm(unique)]
    pub name: String,

    /// Count of virtual CPUs.
    pub vcpu: i32,

    /// Memory size, in GiB.
    pub memory: f64,

    /// On-demand price per hour, in USD.
    pub price_usd: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
