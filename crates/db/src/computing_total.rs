//! Daily maximum count of providers running an activity.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "computing_totals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub total: i32,
    #[sea_orm(unique)]
    pub date: TimeDate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
