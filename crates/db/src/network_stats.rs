//! Raw per-runtime network resource sample.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "network_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub runtime: String,
    pub online: i32,
    pub cores: i32,
    pub threads: i32,

    /// Total memory, in GiB.
    pub memory: f64,

    /// Total disk space, in GiB.
    pub disk: f64,

    pub gpus: i32,
    pub cuda_cores: i32,
    pub gpu_memory: f64,

    /// GPU model name to count mapping.
    pub gpu_models: Json,

    pub date: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
