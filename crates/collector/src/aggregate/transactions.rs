//! Daily ledger transfer aggregates.

use std::collections::{BTreeMap, HashSet};

use db::{
    golem_transaction::{self, TransactionType},
    ColumnTrait, DatabaseConnection, Date, DbErr, EntityTrait, PrimitiveDateTime, QueryFilter,
    QueryOrder,
};
use serde_json::{json, Map, Value};

use super::window::LEDGER;

async fn transfers(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Vec<golem_transaction::Model>, DbErr> {
    golem_transaction::Entity::find()
        .filter(golem_transaction::Column::Timestamp.lte(now))
        .order_by_asc(golem_transaction::Column::Timestamp)
        .all(db)
        .await
}

/// Fold transfers of every ledger window into daily buckets.
fn daily<T, F>(transfers: &[golem_transaction::Model], now: PrimitiveDateTime, fold: F) -> Value
where
    T: Default + Into<Value>,
    F: Fn(&mut T, &golem_transaction::Model),
{
    let earliest = transfers.first().map(|transfer| transfer.timestamp);

    let windows: Map<String, Value> = LEDGER
        .iter()
        .map(|window| {
            let mut days: BTreeMap<Date, T> = BTreeMap::new();

            for transfer in transfers
                .iter()
                .filter(|transfer| window.contains(transfer.timestamp, now, earliest))
            {
                fold(days.entry(transfer.timestamp.date()).or_default(), transfer);
            }

            let entries = days
                .into_iter()
                .map(|(date, bucket)| {
                    let mut entry = bucket.into();

                    if let Value::Object(fields) = &mut entry {
                        fields.insert(String::from("date"), Value::String(date.to_string()));
                    }

                    entry
                })
                .collect();

            (window.label.to_owned(), Value::Array(entries))
        })
        .collect();

    Value::Object(windows)
}

#[derive(Default)]
struct Volume {
    on_golem: f64,
    not_golem: f64,
}

impl From<Volume> for Value {
    fn from(volume: Volume) -> Self {
        json!({
            "on_golem": volume.on_golem,
            "not_golem": volume.not_golem,
        })
    }
}

#[derive(Default)]
struct TypeCounts {
    single_transfer: u64,
    batched: u64,
}

impl From<TypeCounts> for Value {
    fn from(counts: TypeCounts) -> Self {
        json!({
            "singleTransfer": counts.single_transfer,
            "batched": counts.batched,
        })
    }
}

/// Distinct transferred amounts.
#[derive(Default)]
struct DistinctAmounts {
    on_golem: HashSet<u64>,
    not_golem: HashSet<u64>,
}

impl From<DistinctAmounts> for Value {
    fn from(amounts: DistinctAmounts) -> Self {
        json!({
            "on_golem": amounts.on_golem.len(),
            "not_golem": amounts.not_golem.len(),
        })
    }
}

#[derive(Default)]
struct Total {
    amount: f64,
}

impl From<Total> for Value {
    fn from(total: Total) -> Self {
        json!({ "total_amount": total.amount })
    }
}

#[derive(Default)]
struct Averages {
    on_golem: (f64, u32),
    not_golem: (f64, u32),
}

impl From<Averages> for Value {
    fn from(averages: Averages) -> Self {
        let average = |(sum, count): (f64, u32)| {
            if count == 0 {
                0.0
            } else {
                sum / f64::from(count)
            }
        };

        json!({
            "on_golem": average(averages.on_golem),
            "not_golem": average(averages.not_golem),
        })
    }
}

/// Daily transferred amount, split by whether the sender is a known
/// network participant.
pub async fn daily_volume(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let transfers = transfers(db, now).await?;

    Ok(daily(&transfers, now, |volume: &mut Volume, transfer| {
        if transfer.tx_from_golem {
            volume.on_golem += transfer.amount;
        } else {
            volume.not_golem += transfer.amount;
        }
    }))
}

/// Daily transfer counts per transfer kind.
///
/// Transfers of unknown kind are not counted but still produce a bucket.
pub async fn daily_type_counts(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let transfers = transfers(db, now).await?;

    Ok(daily(&transfers, now, |counts: &mut TypeCounts, transfer| {
        match transfer.transaction_type {
            Some(TransactionType::SingleTransfer) => counts.single_transfer += 1,
            Some(TransactionType::Batched) => counts.batched += 1,
            None => {}
        }
    }))
}

/// Daily count of distinct transferred amounts, split by whether the sender
/// is a known network participant.
pub async fn volume_over_time(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let transfers = transfers(db, now).await?;

    Ok(daily(&transfers, now, |amounts: &mut DistinctAmounts, transfer| {
        let amount = transfer.amount.to_bits();

        if transfer.tx_from_golem {
            amounts.on_golem.insert(amount);
        } else {
            amounts.not_golem.insert(amount);
        }
    }))
}

/// Daily total transferred amount.
pub async fn amount_over_time(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let transfers = transfers(db, now).await?;

    Ok(daily(&transfers, now, |total: &mut Total, transfer| {
        total.amount += transfer.amount;
    }))
}

/// Daily average transfer amount, split by whether the sender is a known
/// network participant. Days without transfers of a kind average to zero.
pub async fn average_value_over_time(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let transfers = transfers(db, now).await?;

    Ok(daily(&transfers, now, |averages: &mut Averages, transfer| {
        let bucket = if transfer.tx_from_golem {
            &mut averages.on_golem
        } else {
            &mut averages.not_golem
        };

        bucket.0 += transfer.amount;
        bucket.1 += 1;
    }))
}

/// Transfer count per transfer kind within every ledger window.
pub async fn type_comparison(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let transfers = transfers(db, now).await?;
    let earliest = transfers.first().map(|transfer| transfer.timestamp);

    let windows: Map<String, Value> = LEDGER
        .iter()
        .map(|window| {
            let mut batched = 0u64;
            let mut single = 0u64;

            for transfer in transfers
                .iter()
                .filter(|transfer| window.contains(transfer.timestamp, now, earliest))
            {
                match transfer.transaction_type {
                    Some(TransactionType::Batched) => batched += 1,
                    Some(TransactionType::SingleTransfer) => single += 1,
                    None => {}
                }
            }

            let totals: Vec<Value> = [
                (TransactionType::Batched, batched),
                (TransactionType::SingleTransfer, single),
            ]
            .into_iter()
            .filter(|(_, total)| *total > 0)
            .map(|(kind, total)| json!({ "transaction_type": kind, "total": total }))
            .collect();

            (window.label.to_owned(), Value::Array(totals))
        })
        .collect();

    Ok(Value::Object(windows))
}

#[cfg(test)]
mod tests {
    use db::{
        golem_transaction::{self, TransactionType},
        ActiveValue, Duration, EntityTrait, PrimitiveDateTime,
    };
    use serde_json::json;

    use super::{
        amount_over_time, average_value_over_time, daily_type_counts, daily_volume,
        type_comparison, volume_over_time,
    };
    use crate::testing::{create_database, datetime};

    async fn insert_transfer(
        db: &db::DatabaseConnection,
        id: &str,
        timestamp: PrimitiveDateTime,
        amount: f64,
        kind: TransactionType,
        tx_from_golem: bool,
    ) {
        golem_transaction::Entity::insert(golem_transaction::ActiveModel {
            scanner_id: ActiveValue::Set(id.to_owned()),
            txhash: ActiveValue::Set(format!("0x{id}")),
            amount: ActiveValue::Set(amount),
            timestamp: ActiveValue::Set(timestamp),
            sender: ActiveValue::Set(String::from("0xsender")),
            receiver: ActiveValue::Set(String::from("0xreceiver")),
            transaction_type: ActiveValue::Set(Some(kind)),
            tx_from_golem: ActiveValue::Set(tx_from_golem),
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert transfer");
    }

    async fn seed(db: &db::DatabaseConnection) -> PrimitiveDateTime {
        let now = datetime(2024, 3, 10, 12);

        insert_transfer(
            db,
            "1",
            now - Duration::hours(2),
            1.5,
            TransactionType::SingleTransfer,
            true,
        )
        .await;
        insert_transfer(
            db,
            "2",
            now - Duration::hours(3),
            2.0,
            TransactionType::Batched,
            false,
        )
        .await;
        insert_transfer(
            db,
            "3",
            now - Duration::days(10),
            4.0,
            TransactionType::SingleTransfer,
            false,
        )
        .await;
        insert_transfer(
            db,
            "4",
            now + Duration::hours(1),
            8.0,
            TransactionType::Batched,
            true,
        )
        .await;

        now
    }

    #[tokio::test]
    async fn volume_per_day() {
        let db = create_database().await;
        let now = seed(&db).await;

        let report = daily_volume(&db, now).await.expect("unable to build report");

        assert_eq!(
            report["7d"],
            json!([{ "date": "2024-03-10", "on_golem": 1.5, "not_golem": 2.0 }])
        );
        assert_eq!(
            report["14d"],
            json!([
                { "date": "2024-02-29", "on_golem": 0.0, "not_golem": 4.0 },
                { "date": "2024-03-10", "on_golem": 1.5, "not_golem": 2.0 },
            ])
        );
        assert_eq!(report["All"], report["14d"]);
        assert_eq!(report["1y"], report["14d"]);
    }

    #[tokio::test]
    async fn counts_per_kind() {
        let db = create_database().await;
        let now = seed(&db).await;

        let report = daily_type_counts(&db, now)
            .await
            .expect("unable to build report");

        assert_eq!(
            report["7d"],
            json!([{ "date": "2024-03-10", "singleTransfer": 1, "batched": 1 }])
        );
        assert_eq!(report["1m"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn empty_ledger() {
        let db = create_database().await;

        let report = daily_volume(&db, datetime(2024, 1, 1, 0))
            .await
            .expect("unable to build report");

        assert_eq!(report["All"], json!([]));
        assert_eq!(report.as_object().map(|windows| windows.len()), Some(7));
    }

    #[tokio::test]
    async fn amounts_and_averages() {
        let db = create_database().await;
        let now = seed(&db).await;

        insert_transfer(
            &db,
            "5",
            now - Duration::hours(1),
            1.5,
            TransactionType::SingleTransfer,
            true,
        )
        .await;
        insert_transfer(
            &db,
            "6",
            now - Duration::hours(1),
            4.5,
            TransactionType::Batched,
            true,
        )
        .await;

        let volume = volume_over_time(&db, now)
            .await
            .expect("unable to build report");

        assert_eq!(
            volume["7d"],
            json!([{ "date": "2024-03-10", "on_golem": 2, "not_golem": 1 }])
        );

        let amount = amount_over_time(&db, now)
            .await
            .expect("unable to build report");

        assert_eq!(
            amount["14d"],
            json!([
                { "date": "2024-02-29", "total_amount": 4.0 },
                { "date": "2024-03-10", "total_amount": 9.5 },
            ])
        );

        let average = average_value_over_time(&db, now)
            .await
            .expect("unable to build report");

        assert_eq!(
            average["14d"],
            json!([
                { "date": "2024-02-29", "on_golem": 0.0, "not_golem": 4.0 },
                { "date": "2024-03-10", "on_golem": 2.5, "not_golem": 2.0 },
            ])
        );
    }

    #[tokio::test]
    async fn kinds_per_window() {
        let db = create_database().await;
        let now = seed(&db).await;

        let report = type_comparison(&db, now)
            .await
            .expect("unable to build report");

        assert_eq!(
            report["7d"],
            json!([
                { "transaction_type": "batched", "total": 1 },
                { "transaction_type": "singleTransfer", "total": 1 },
            ])
        );
        assert_eq!(
            report["1m"],
            json!([
                { "transaction_type": "batched", "total": 1 },
                { "transaction_type": "singleTransfer", "total": 2 },
            ])
        );

        let empty = type_comparison(&create_database().await, now)
            .await
            .expect("unable to build report");

        assert_eq!(empty["All"], json!([]));
    }
}
