//! Resumable ledger scraping state.
//!
//! The table holds at most a single row with [`CURSOR_ID`] identifier.

use sea_orm::entity::prelude::*;

/// Identifier of the only cursor row.
pub const CURSOR_ID: i64 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_scraper_cursor")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// Whether the historical backfill has completed.
    pub indexed_before: bool,

    /// Timestamp from which the next incremental fetch starts.
    pub latest_timestamp_indexed: Option<TimeDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
