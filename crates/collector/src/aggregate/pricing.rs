//! Pricing samples, daily snapshots and pricing reports.

use db::{
    node::{self, Network},
    offer, pricing_sample, pricing_snapshot,
    sea_query::OnConflict,
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, Duration, EntityTrait,
    PrimitiveDateTime, QueryFilter, QueryOrder, SelectExt,
};
use offers::{pricing::LinearPricing, Properties};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{
    stats::{mean, median, unix_seconds},
    window::PRICING,
};
use crate::reconcile::network_of;

/// Runtime whose pricing is sampled.
const SAMPLED_RUNTIME: &str = "vm";

/// Record hourly prices of providers that received tasks.
///
/// Providers without a known `vm` offer are skipped. Returns the count of
/// recorded samples.
pub async fn record_pricing_samples(
    db: &DatabaseConnection,
    providers: Vec<String>,
    now: PrimitiveDateTime,
) -> Result<usize, DbErr> {
    if providers.is_empty() {
        return Ok(0);
    }

    let offers = offer::Entity::find()
        .find_also_related(node::Entity)
        .filter(node::Column::NodeId.is_in(providers))
        .filter(offer::Column::Runtime.eq(SAMPLED_RUNTIME))
        .all(db)
        .await?;

    let samples: Vec<_> = offers
        .into_iter()
        .filter_map(|(offer, node)| {
            let node = node?;
            let properties = Properties::from_value(&offer.properties)?;

            let pricing = match LinearPricing::from_properties(&properties) {
                Ok(pricing) => pricing,
                Err(error) => {
                    debug!(node_id = %node.node_id, %error, "offer has no usable pricing");
                    return None;
                }
            };

            Some(pricing_sample::ActiveModel {
                node_id: ActiveValue::Set(node.id),
                offer_id: ActiveValue::Set(offer.id),
                cpu_per_hour: ActiveValue::Set(Some(pricing.cpu_per_hour())),
                env_per_hour: ActiveValue::Set(Some(pricing.env_per_hour())),
                start_price: ActiveValue::Set(Some(pricing.start)),
                network: ActiveValue::Set(network_of(&properties)),
                created_at: ActiveValue::Set(now),
                ..Default::default()
            })
        })
        .collect();

    let recorded = samples.len();

    if !samples.is_empty() {
        pricing_sample::Entity::insert_many(samples)
            .exec_without_returning(db)
            .await?;
    }

    info!(recorded, "pricing samples recorded");

    Ok(recorded)
}

/// Price columns of samples, with missing values excluded.
struct SampledPrices {
    cpu: Vec<f64>,
    env: Vec<f64>,
    start: Vec<f64>,
}

impl SampledPrices {
    fn collect(samples: &[pricing_sample::Model]) -> Self {
        Self {
            cpu: samples.iter().filter_map(|s| s.cpu_per_hour).collect(),
            env: samples.iter().filter_map(|s| s.env_per_hour).collect(),
            start: samples.iter().filter_map(|s| s.start_price).collect(),
        }
    }
}

async fn samples_since(
    db: &DatabaseConnection,
    network: Network,
    since: PrimitiveDateTime,
) -> Result<Vec<pricing_sample::Model>, DbErr> {
    pricing_sample::Entity::find()
        .filter(pricing_sample::Column::Network.eq(network))
        .filter(pricing_sample::Column::CreatedAt.gte(since))
        .all(db)
        .await
}

/// Summarize the past day of pricing samples of a network.
///
/// The snapshot is dated with the day before `now`. Returns `false` without
/// writing anything if that snapshot already exists.
pub async fn pricing_snapshot(
    db: &DatabaseConnection,
    network: Network,
    now: PrimitiveDateTime,
) -> Result<bool, DbErr> {
    let since = now - Duration::days(1);
    let date = since.date();

    let exists = pricing_snapshot::Entity::find()
        .filter(pricing_snapshot::Column::Network.eq(network))
        .filter(pricing_snapshot::Column::Date.eq(date))
        .exists(db)
        .await?;

    if exists {
        debug!(network = network.name(), %date, "pricing snapshot already exists");
        return Ok(false);
    }

    let samples = samples_since(db, network, since).await?;

    if samples.is_empty() {
        warn!(network = network.name(), "no pricing samples for the past day");
    }

    let prices = SampledPrices::collect(&samples);

    pricing_snapshot::Entity::insert(pricing_snapshot::ActiveModel {
        network: ActiveValue::Set(network),
        date: ActiveValue::Set(date),
        average_cpu_price: ActiveValue::Set(mean(&prices.cpu).unwrap_or_default()),
        median_cpu_price: ActiveValue::Set(median(&prices.cpu).unwrap_or_default()),
        average_env_price: ActiveValue::Set(mean(&prices.env).unwrap_or_default()),
        median_env_price: ActiveValue::Set(median(&prices.env).unwrap_or_default()),
        average_start_price: ActiveValue::Set(mean(&prices.start).unwrap_or_default()),
        median_start_price: ActiveValue::Set(median(&prices.start).unwrap_or_default()),
        created_at: ActiveValue::Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            pricing_snapshot::Column::Network,
            pricing_snapshot::Column::Date,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    info!(network = network.name(), %date, samples = samples.len(), "pricing snapshot created");

    Ok(true)
}

/// Median and average prices of the past hour, per network.
pub async fn past_hour(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let mut report = Map::new();

    for network in Network::REPORTED {
        let samples = samples_since(db, network, now - Duration::hours(1)).await?;
        let prices = SampledPrices::collect(&samples);

        report.insert(
            network.name().to_owned(),
            json!({
                "cpu_median": median(&prices.cpu).unwrap_or_default(),
                "cpu_average": mean(&prices.cpu).unwrap_or_default(),
                "env_median": median(&prices.env).unwrap_or_default(),
                "env_average": mean(&prices.env).unwrap_or_default(),
                "start_median": median(&prices.start).unwrap_or_default(),
                "start_average": mean(&prices.start).unwrap_or_default(),
            }),
        );
    }

    Ok(Value::Object(report))
}

/// Daily pricing snapshots per network and chart window.
pub async fn charted(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let mut report = Map::new();

    for network in Network::REPORTED {
        let snapshots = pricing_snapshot::Entity::find()
            .filter(pricing_snapshot::Column::Network.eq(network))
            .filter(pricing_snapshot::Column::CreatedAt.lte(now))
            .order_by_asc(pricing_snapshot::Column::Date)
            .all(db)
            .await?;

        let earliest = snapshots.iter().map(|snapshot| snapshot.created_at).min();

        let windows: Map<String, Value> = PRICING
            .iter()
            .map(|window| {
                let entries = snapshots
                    .iter()
                    .filter(|snapshot| window.contains(snapshot.created_at, now, earliest))
                    .map(|snapshot| {
                        json!({
                            "date": unix_seconds(snapshot.date.midnight()),
                            "average_cpu": snapshot.average_cpu_price,
                            "median_cpu": snapshot.median_cpu_price,
                            "average_env": snapshot.average_env_price,
                            "median_env": snapshot.median_env_price,
                            "average_start": snapshot.average_start_price,
                            "median_start": snapshot.median_start_price,
                        })
                    })
                    .collect();

                (window.label.to_owned(), Value::Array(entries))
            })
            .collect();

        report.insert(network.name().to_owned(), Value::Object(windows));
    }

    Ok(Value::Object(report))
}

#[cfg(test)]
mod tests {
    use db::{
        node::{self, Network},
        offer, pricing_sample, ActiveValue, Duration, EntityTrait,
        PaginatorTrait,
    };
    use serde_json::json;

    use super::{charted, past_hour, pricing_snapshot, record_pricing_samples};
    use crate::{
        aggregate::stats::unix_seconds,
        testing::{create_database, datetime},
    };

    async fn insert_sample(
        db: &db::DatabaseConnection,
        network: Network,
        cpu: Option<f64>,
        created_at: db::PrimitiveDateTime,
    ) {
        pricing_sample::Entity::insert(pricing_sample::ActiveModel {
            node_id: ActiveValue::Set(1),
            offer_id: ActiveValue::Set(1),
            cpu_per_hour: ActiveValue::Set(cpu),
            env_per_hour: ActiveValue::Set(Some(0.25)),
            start_price: ActiveValue::Set(None),
            network: ActiveValue::Set(network),
            created_at: ActiveValue::Set(created_at),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert sample");
    }

    #[tokio::test]
    async fn samples_from_vm_offers() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        let node = node::Entity::insert(node::ActiveModel {
            node_id: ActiveValue::Set(String::from("0xa")),
            wallet: ActiveValue::Set(None),
            online: ActiveValue::Set(true),
            computing_now: ActiveValue::Set(false),
            version: ActiveValue::Set(None),
            network: ActiveValue::Set(Network::Mainnet),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            uptime_created_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec(&db)
        .await
        .expect("unable to insert node")
        .last_insert_id;

        offer::Entity::insert(offer::ActiveModel {
            node_id: ActiveValue::Set(node),
            runtime: ActiveValue::Set(String::from("vm")),
            properties: ActiveValue::Set(json!({
                "golem.runtime.name": "vm",
                "golem.com.usage.vector": ["golem.usage.duration_sec", "golem.usage.cpu_sec"],
                "golem.com.pricing.model.linear.coeffs": [0.000002, 0.00001, 0.5],
                "golem.com.payment.platform.erc20-polygon-glm.address": "0xwallet",
            })),
            is_overpriced: ActiveValue::Set(false),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec_without_returning(&db)
        .await
        .expect("unable to insert offer");

        let recorded = record_pricing_samples(
            &db,
            vec![String::from("0xa"), String::from("0xunknown")],
            now,
        )
        .await
        .expect("unable to record samples");

        assert_eq!(recorded, 1);

        let sample = pricing_sample::Entity::find()
            .one(&db)
            .await
            .expect("unable to query samples")
            .expect("sample must exist");

        assert!((sample.cpu_per_hour.expect("cpu price") - 0.036).abs() < 1e-12);
        assert!((sample.env_per_hour.expect("env price") - 0.0072).abs() < 1e-12);
        assert_eq!(sample.start_price, Some(0.5));
        assert_eq!(sample.network, Network::Mainnet);
    }

    #[tokio::test]
    async fn snapshot_is_idempotent() {
        let db = create_database().await;
        let now = datetime(2024, 1, 2, 6);

        insert_sample(&db, Network::Mainnet, Some(1.0), now - Duration::hours(2)).await;
        insert_sample(&db, Network::Mainnet, Some(3.0), now - Duration::hours(3)).await;
        insert_sample(&db, Network::Mainnet, None, now - Duration::hours(4)).await;
        insert_sample(&db, Network::Mainnet, Some(100.0), now - Duration::days(2)).await;

        assert!(pricing_snapshot(&db, Network::Mainnet, now)
            .await
            .expect("unable to create snapshot"));
        assert!(!pricing_snapshot(&db, Network::Mainnet, now + Duration::hours(1))
            .await
            .expect("unable to create snapshot"));

        let snapshots = pricing_snapshot::Entity::find()
            .all(&db)
            .await
            .expect("unable to query snapshots");

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].date, datetime(2024, 1, 1, 0).date());
        assert_eq!(snapshots[0].average_cpu_price, 2.0);
        assert_eq!(snapshots[0].median_cpu_price, 2.0);
        assert_eq!(snapshots[0].average_start_price, 0.0);

        assert!(pricing_snapshot(&db, Network::Testnet, now)
            .await
            .expect("unable to create snapshot"));

        let count = pricing_snapshot::Entity::find()
            .count(&db)
            .await
            .expect("unable to count snapshots");

        assert_eq!(count, 2);

        let chart = charted(&db, now + Duration::hours(1))
            .await
            .expect("unable to chart");

        assert_eq!(
            chart["mainnet"]["7d"],
            json!([{
                "date": unix_seconds(datetime(2024, 1, 1, 0)),
                "average_cpu": 2.0,
                "median_cpu": 2.0,
                "average_env": 0.25,
                "median_env": 0.25,
                "average_start": 0.0,
                "median_start": 0.0,
            }])
        );
        assert_eq!(chart["mainnet"]["All"], chart["mainnet"]["7d"]);
    }

    #[tokio::test]
    async fn past_hour_excludes_missing_prices() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 12);

        insert_sample(&db, Network::Testnet, Some(1.0), now - Duration::minutes(10)).await;
        insert_sample(&db, Network::Testnet, Some(2.0), now - Duration::minutes(20)).await;
        insert_sample(&db, Network::Testnet, None, now - Duration::minutes(30)).await;
        insert_sample(&db, Network::Testnet, Some(9.0), now - Duration::minutes(90)).await;

        let report = past_hour(&db, now).await.expect("unable to build report");

        assert_eq!(report["testnet"]["cpu_median"], 1.5);
        assert_eq!(report["testnet"]["cpu_average"], 1.5);
        assert_eq!(report["testnet"]["start_average"], 0.0);
        assert_eq!(report["mainnet"]["cpu_median"], 0.0);
    }
}
