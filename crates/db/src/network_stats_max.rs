//! Daily maximum of network resource samples.
//!
//! Existing date buckets are never overwritten, a rollup only fills gaps.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "network_stats_max")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub runtime: String,
    pub online: i32,
    pub cores: i32,
    pub memory: f64,
    pub disk: f64,
    pub gpus: i32,
    pub date: TimeDate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
