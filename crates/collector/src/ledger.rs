//! Resumable GLM transfer ledger scraping.
//!
//! The scraper has two states, tracked by the singleton
//! [`scraper_cursor`] row. While backfilling, historical transfers are fetched
//! window by window from a fixed epoch. Once the backfill completes, every
//! run only fetches transfers newer than the cursor and moves the cursor one
//! second past the latest transfer seen.

use std::collections::HashSet;

use async_trait::async_trait;
use db::{
    golem_transaction::{self, TransactionType},
    relay_node, requestor,
    scraper_cursor::{self, CURSOR_ID},
    sea_query::OnConflict,
    ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PrimitiveDateTime, QueryFilter, QuerySelect, TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{retry::RetryPolicy, sources::HttpError};

/// Destination contract of batched payments.
pub const BATCHED_CONTRACT: &str = "0x50100d4faf5f3b09987dea36dc2eddd57a3e561b";

/// Destination contract of single transfers.
pub const SINGLE_TRANSFER_CONTRACT: &str = "0x0b220b82f3ea3b7f6d9a1d8ab58930c064a2b5bf";

const TOKEN_DECIMALS: f64 = 1e18;

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(val) => Ok(val),
        Value::Number(num) => Ok(num.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Transfer record of the ledger API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub tx_hash: String,
    pub from_addr: String,
    pub to_addr: String,
    pub receiver_addr: String,

    /// Transferred amount, in the smallest token unit.
    #[serde(deserialize_with = "string_or_number")]
    pub token_amount: String,

    pub block_timestamp: i64,
}

impl Transfer {
    /// Transferred amount, in GLM.
    pub fn amount(&self) -> Option<f64> {
        self.token_amount
            .parse::<u128>()
            .ok()
            .map(|amount| amount as f64 / TOKEN_DECIMALS)
    }

    pub fn transaction_type(&self) -> Option<TransactionType> {
        let to = self.to_addr.to_lowercase();

        if to == BATCHED_CONTRACT {
            Some(TransactionType::Batched)
        } else if to == SINGLE_TRANSFER_CONTRACT {
            Some(TransactionType::SingleTransfer)
        } else {
            None
        }
    }
}

/// Source of ledger transfers.
#[async_trait]
pub trait TransferFeed: Send + Sync {
    /// Transfers with block timestamps within the inclusive range.
    async fn transfers(&self, from: i64, to: i64) -> Result<Vec<Transfer>, HttpError>;
}

#[derive(Debug, Display, Error, From)]
pub enum LedgerError {
    DatabaseError(DbErr),

    #[display(fmt = "ledger request failed: {}", _0)]
    Upstream(HttpError),
}

/// Historical backfill bounds.
#[derive(Debug, Clone, Copy)]
pub struct Backfill {
    pub start: i64,
    pub end: Option<i64>,
    pub window: i64,
    pub batch: usize,
}

impl From<&common::config::Ledger> for Backfill {
    fn from(config: &common::config::Ledger) -> Self {
        Self {
            start: config.start,
            end: config.end,
            window: config.window,
            batch: config.batch,
        }
    }
}

/// Outcome of a historical backfill run.
#[derive(Debug, PartialEq, Eq)]
pub enum BackfillOutcome {
    AlreadyIndexed,
    Completed { fetched: usize, latest: Option<i64> },
}

/// Outcome of an incremental run.
#[derive(Debug, PartialEq, Eq)]
pub enum FollowOutcome {
    NotIndexed,
    NoTransfers,
    Advanced { fetched: usize, cursor: i64 },
}

fn unix(ts: PrimitiveDateTime) -> i64 {
    ts.assume_utc().unix_timestamp()
}

async fn cursor<C: ConnectionTrait>(db: &C) -> Result<Option<scraper_cursor::Model>, DbErr> {
    scraper_cursor::Entity::find_by_id(CURSOR_ID).one(db).await
}

async fn save_cursor<C: ConnectionTrait>(
    db: &C,
    indexed_before: bool,
    latest: Option<PrimitiveDateTime>,
) -> Result<(), DbErr> {
    scraper_cursor::Entity::insert(scraper_cursor::ActiveModel {
        id: ActiveValue::Set(CURSOR_ID),
        indexed_before: ActiveValue::Set(indexed_before),
        latest_timestamp_indexed: ActiveValue::Set(latest),
    })
    .on_conflict(
        OnConflict::column(scraper_cursor::Column::Id)
            .update_columns([
                scraper_cursor::Column::IndexedBefore,
                scraper_cursor::Column::LatestTimestampIndexed,
            ])
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    Ok(())
}

/// Senders of the provided transfers that are known network participants.
async fn known_senders<C: ConnectionTrait>(
    db: &C,
    transfers: &[Transfer],
) -> Result<HashSet<String>, DbErr> {
    let senders: HashSet<String> = transfers
        .iter()
        .map(|transfer| transfer.from_addr.to_lowercase())
        .collect();

    let requestors: Vec<String> = requestor::Entity::find()
        .select_only()
        .column(requestor::Column::NodeId)
        .filter(requestor::Column::NodeId.is_in(senders.iter().cloned()))
        .into_tuple()
        .all(db)
        .await?;

    let relay_nodes: Vec<String> = relay_node::Entity::find()
        .select_only()
        .column(relay_node::Column::NodeId)
        .filter(relay_node::Column::NodeId.is_in(senders))
        .into_tuple()
        .all(db)
        .await?;

    Ok(requestors.into_iter().chain(relay_nodes).collect())
}

fn transaction_model(
    transfer: &Transfer,
    known: &HashSet<String>,
) -> Option<golem_transaction::ActiveModel> {
    let Some(amount) = transfer.amount() else {
        warn!(id = %transfer.id, amount = %transfer.token_amount, "skipping transfer with invalid amount");
        return None;
    };

    let Some(timestamp) = db::from_unix(transfer.block_timestamp) else {
        warn!(id = %transfer.id, timestamp = transfer.block_timestamp, "skipping transfer with invalid timestamp");
        return None;
    };

    Some(golem_transaction::ActiveModel {
        scanner_id: ActiveValue::Set(transfer.id.clone()),
        txhash: ActiveValue::Set(transfer.tx_hash.clone()),
        amount: ActiveValue::Set(amount),
        timestamp: ActiveValue::Set(timestamp),
        sender: ActiveValue::Set(transfer.from_addr.clone()),
        receiver: ActiveValue::Set(transfer.receiver_addr.clone()),
        transaction_type: ActiveValue::Set(transfer.transaction_type()),
        tx_from_golem: ActiveValue::Set(known.contains(&transfer.from_addr.to_lowercase())),
    })
}

/// Insert a batch of transactions, ignoring already known records.
async fn store<C: ConnectionTrait>(
    db: &C,
    models: Vec<golem_transaction::ActiveModel>,
) -> Result<(), DbErr> {
    if !models.is_empty() {
        golem_transaction::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(golem_transaction::Column::ScannerId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    Ok(())
}

/// Fetch and store historical transfers from the configured epoch.
///
/// Every batch is committed in its own database transaction. The cursor is
/// only written once every window was processed, so a failed run can be
/// safely repeated.
pub async fn backfill<F: TransferFeed>(
    db: &DatabaseConnection,
    feed: &F,
    retry: &RetryPolicy,
    range: Backfill,
    now: i64,
) -> Result<BackfillOutcome, LedgerError> {
    if cursor(db).await?.map_or(false, |cursor| cursor.indexed_before) {
        info!("ledger is already indexed, skipping backfill");
        return Ok(BackfillOutcome::AlreadyIndexed);
    }

    let upper = range.end.map_or(now, |end| end.min(now));
    let window = range.window.max(1);
    let batch = range.batch.max(1);

    let mut start = range.start;
    let mut fetched = 0;
    let mut latest: Option<i64> = None;

    while start <= upper {
        let end = (start + window).min(upper);

        let transfers = retry
            .run("ledger transfers", || feed.transfers(start, end))
            .await?;

        info!(start, end, transfers = transfers.len(), "fetched ledger window");

        let known = known_senders(db, &transfers).await?;

        let mut models: Vec<_> = transfers
            .iter()
            .filter_map(|transfer| transaction_model(transfer, &known))
            .collect();

        while !models.is_empty() {
            let rest = models.split_off(batch.min(models.len()));
            let chunk = std::mem::replace(&mut models, rest);

            db.transaction::<_, _, DbErr>(|txn| Box::pin(async move { store(txn, chunk).await }))
                .await
                .into_raw_result()?;
        }

        fetched += transfers.len();
        latest = transfers
            .iter()
            .map(|transfer| transfer.block_timestamp)
            .chain(latest)
            .max();

        start = end + 1;
    }

    let latest_indexed = db::from_unix(latest.unwrap_or(upper));
    save_cursor(db, true, latest_indexed).await?;

    info!(fetched, ?latest, "ledger backfill completed");

    Ok(BackfillOutcome::Completed { fetched, latest })
}

/// Fetch transfers newer than the cursor.
///
/// The cursor is left untouched if no transfers were returned.
pub async fn follow<F: TransferFeed>(
    db: &DatabaseConnection,
    feed: &F,
    retry: &RetryPolicy,
    now: i64,
) -> Result<FollowOutcome, LedgerError> {
    let Some(from) = cursor(db)
        .await?
        .filter(|cursor| cursor.indexed_before)
        .and_then(|cursor| cursor.latest_timestamp_indexed)
        .map(unix)
    else {
        info!("ledger is not indexed yet, skipping");
        return Ok(FollowOutcome::NotIndexed);
    };

    let transfers = retry
        .run("ledger transfers", || feed.transfers(from, now))
        .await?;

    let Some(latest) = transfers
        .iter()
        .map(|transfer| transfer.block_timestamp)
        .max()
    else {
        debug!(from, now, "no new transfers");
        return Ok(FollowOutcome::NoTransfers);
    };

    let next = latest + 1;
    let fetched = transfers.len();

    db.transaction::<_, _, DbErr>(|txn| {
        Box::pin(async move {
            let known = known_senders(txn, &transfers).await?;

            let models = transfers
                .iter()
                .filter_map(|transfer| transaction_model(transfer, &known))
                .collect();

            store(txn, models).await?;
            save_cursor(txn, true, db::from_unix(next)).await
        })
    })
    .await
    .into_raw_result()?;

    info!(fetched, cursor = next, "ledger cursor advanced");

    Ok(FollowOutcome::Advanced {
        fetched,
        cursor: next,
    })
}
