//! On-chain GLM transfer.
//!
//! Transfers are append-only and deduplicated by the ledger's own record
//! identifier.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "golem_transactions")]
pub struct Model {
    /// Ledger record identifier.
    #[sea_orm(primary_key, auto_increment = false)]
    pub scanner_id: String,

    pub txhash: String,

    /// Transferred amount, in GLM.
    pub amount: f64,

    pub timestamp: TimeDateTime,
    pub sender: String,
    pub receiver: String,
    pub transaction_type: Option<TransactionType>,

    /// Whether the sender is a known network participant.
    pub tx_from_golem: bool,
}

/// Transfer kind, classified by the destination contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    #[sea_orm(num_value = 0)]
    SingleTransfer,
    #[sea_orm(num_value = 1)]
    Batched,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
