//! Latest known GLM to USD exchange rate.

use sea_orm::entity::prelude::*;

/// Identifier of the GLM rate row.
pub const GLM_RATE_ID: i64 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// Price of a single GLM, in USD.
    pub current_price: f64,

    pub updated_at: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
