//! Network resource samples, daily maxima and history.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use db::{
    network_stats, network_stats_max, node, offer,
    sea_query::OnConflict,
    ActiveValue, ColumnTrait, DatabaseConnection, Date, DbErr, EntityTrait, JoinType,
    PaginatorTrait, PrimitiveDateTime, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use offers::Properties;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{
    stats::{round_to, unix_seconds},
    window::HISTORICAL,
};

/// Resource totals of online offers of a single runtime.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RuntimeTotals {
    pub online: i64,
    pub cores: i64,
    pub threads: i64,
    pub memory: f64,
    pub disk: f64,
    pub gpus: i64,
    pub cuda_cores: i64,
    pub gpu_memory: f64,
    pub gpu_models: BTreeMap<String, i64>,
}

impl RuntimeTotals {
    fn add(&mut self, properties: &Properties) {
        let resources = properties.resources();

        self.online += 1;
        self.cores += resources.cores;
        self.threads += resources.threads;
        self.memory += resources.memory_gib;
        self.disk += resources.storage_gib;

        if let Some(gpu) = properties.gpu() {
            self.gpus += 1;
            self.cuda_cores += gpu.cuda_cores;
            self.gpu_memory += gpu.memory_gib;
            *self.gpu_models.entry(gpu.model).or_default() += 1;
        }
    }
}

/// Offers of online nodes.
async fn online_offers(db: &DatabaseConnection) -> Result<Vec<offer::Model>, DbErr> {
    offer::Entity::find()
        .join(JoinType::InnerJoin, offer::Relation::Node.def())
        .filter(node::Column::Online.eq(true))
        .order_by_asc(offer::Column::Id)
        .all(db)
        .await
}

async fn online_count(db: &DatabaseConnection, network: node::Network) -> Result<u64, DbErr> {
    node::Entity::find()
        .filter(node::Column::Online.eq(true))
        .filter(node::Column::Network.eq(network))
        .count(db)
        .await
}

/// Per-runtime totals of offers of online nodes.
pub async fn runtime_totals(
    db: &DatabaseConnection,
) -> Result<BTreeMap<String, RuntimeTotals>, DbErr> {
    let mut totals: BTreeMap<String, RuntimeTotals> = BTreeMap::new();

    for offer in online_offers(db).await? {
        let Some(properties) = Properties::from_value(&offer.properties) else {
            debug!(offer = offer.id, "offer has no properties");
            continue;
        };

        totals.entry(offer.runtime).or_default().add(&properties);
    }

    Ok(totals)
}

/// Record a network resource sample per runtime.
///
/// Returns the published `online_stats_by_runtime` report.
pub async fn sample_network_stats(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let totals = runtime_totals(db).await?;

    let samples: Vec<_> = totals
        .iter()
        .map(|(runtime, totals)| network_stats::ActiveModel {
            runtime: ActiveValue::Set(runtime.clone()),
            online: ActiveValue::Set(totals.online as i32),
            cores: ActiveValue::Set(totals.cores as i32),
            threads: ActiveValue::Set(totals.threads as i32),
            memory: ActiveValue::Set(totals.memory),
            disk: ActiveValue::Set(totals.disk),
            gpus: ActiveValue::Set(totals.gpus as i32),
            cuda_cores: ActiveValue::Set(totals.cuda_cores as i32),
            gpu_memory: ActiveValue::Set(totals.gpu_memory),
            gpu_models: ActiveValue::Set(json!(totals.gpu_models)),
            date: ActiveValue::Set(now),
            ..Default::default()
        })
        .collect();

    if !samples.is_empty() {
        network_stats::Entity::insert_many(samples)
            .exec_without_returning(db)
            .await?;
    }

    info!(runtimes = totals.len(), "network stats sampled");

    let mut report: Map<String, Value> = totals
        .into_iter()
        .map(|(runtime, totals)| (runtime, json!(totals)))
        .collect();

    report.insert(
        String::from("totalOnlineMainnet"),
        json!(online_count(db, node::Network::Mainnet).await?),
    );
    report.insert(
        String::from("totalOnlineTestnet"),
        json!(online_count(db, node::Network::Testnet).await?),
    );

    Ok(Value::Object(report))
}

/// Network resource totals, counting the largest offer of each online node.
pub async fn network_online_stats(db: &DatabaseConnection) -> Result<Value, DbErr> {
    let providers = node::Entity::find()
        .filter(node::Column::Online.eq(true))
        .count(db)
        .await?;

    #[derive(Default)]
    struct Largest {
        threads: i64,
        memory: f64,
        storage: f64,
        gpus: i64,
    }

    let mut largest: HashMap<i64, Largest> = HashMap::new();

    for offer in online_offers(db).await? {
        let Some(properties) = Properties::from_value(&offer.properties) else {
            continue;
        };

        let resources = properties.resources();
        let node = largest.entry(offer.node_id).or_default();

        node.threads = node.threads.max(resources.threads);
        node.memory = node.memory.max(resources.memory_gib);
        node.storage = node.storage.max(resources.storage_gib);

        if properties.gpu().is_some() {
            node.gpus += 1;
        }
    }

    Ok(json!({
        "providers": providers,
        "cores": largest.values().map(|node| node.threads).sum::<i64>(),
        "memory": largest.values().map(|node| node.memory).sum::<f64>(),
        "storage": largest.values().map(|node| node.storage).sum::<f64>(),
        "gpus": largest.values().map(|node| node.gpus).sum::<i64>(),
    }))
}

#[derive(Debug, Default, Clone, Copy)]
struct DailyMax {
    online: i32,
    cores: i32,
    memory: f64,
    disk: f64,
    gpus: i32,
}

/// Materialize daily maxima of full days preceding `today`.
///
/// Only `(runtime, date)` buckets that do not exist yet are written, so
/// repeated runs are no-ops. Returns the count of created buckets.
pub async fn materialize_daily_max(
    db: &DatabaseConnection,
    today: Date,
    days: i64,
) -> Result<usize, DbErr> {
    let end = today.midnight();
    let start = end - db::Duration::days(days.max(1));

    let samples = network_stats::Entity::find()
        .filter(network_stats::Column::Date.gte(start))
        .filter(network_stats::Column::Date.lt(end))
        .all(db)
        .await?;

    let existing: HashSet<(String, Date)> = network_stats_max::Entity::find()
        .select_only()
        .column(network_stats_max::Column::Runtime)
        .column(network_stats_max::Column::Date)
        .filter(network_stats_max::Column::Date.gte(start.date()))
        .filter(network_stats_max::Column::Date.lt(today))
        .into_tuple()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let mut buckets: BTreeMap<(String, Date), DailyMax> = BTreeMap::new();

    for sample in samples {
        let key = (sample.runtime, sample.date.date());

        if existing.contains(&key) {
            continue;
        }

        let bucket = buckets.entry(key).or_default();

        bucket.online = bucket.online.max(sample.online);
        bucket.cores = bucket.cores.max(sample.cores);
        bucket.memory = bucket.memory.max(sample.memory);
        bucket.disk = bucket.disk.max(sample.disk);
        bucket.gpus = bucket.gpus.max(sample.gpus);
    }

    let created = buckets.len();

    let rows: Vec<_> = buckets
        .into_iter()
        .map(|((runtime, date), max)| network_stats_max::ActiveModel {
            runtime: ActiveValue::Set(runtime),
            online: ActiveValue::Set(max.online),
            cores: ActiveValue::Set(max.cores),
            memory: ActiveValue::Set(max.memory),
            disk: ActiveValue::Set(max.disk),
            gpus: ActiveValue::Set(max.gpus),
            date: ActiveValue::Set(date),
            ..Default::default()
        })
        .collect();

    if !rows.is_empty() {
        network_stats_max::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    network_stats_max::Column::Runtime,
                    network_stats_max::Column::Date,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    info!(created, "daily network maxima materialized");

    Ok(created)
}

fn history_entry(
    ts: PrimitiveDateTime,
    online: f64,
    cores: f64,
    memory: f64,
    disk: f64,
    gpus: f64,
) -> Value {
    json!({
        "date": unix_seconds(ts),
        "online": online.round() as i64,
        "cores": cores.round() as i64,
        "memory": round_to(memory / 1024.0, 2),
        "disk": round_to(disk / 1024.0, 2),
        "gpus": gpus.round() as i64,
    })
}

/// Longest window charted from raw samples.
const RAW_HISTORY: db::Duration = db::Duration::days(30);

/// Running averages of the samples of one bucket.
#[derive(Debug, Default, Clone, Copy)]
struct Averages {
    count: u32,
    online: f64,
    cores: f64,
    memory: f64,
    disk: f64,
    gpus: f64,
}

impl Averages {
    fn add(&mut self, online: f64, cores: f64, memory: f64, disk: f64, gpus: f64) {
        self.count += 1;
        self.online += online;
        self.cores += cores;
        self.memory += memory;
        self.disk += disk;
        self.gpus += gpus;
    }

    fn entry(&self, ts: PrimitiveDateTime) -> Value {
        let count = f64::from(self.count.max(1));

        history_entry(
            ts,
            self.online / count,
            self.cores / count,
            self.memory / count,
            self.disk / count,
            self.gpus / count,
        )
    }
}

/// Historical network resources per runtime, bucketed per window.
///
/// Windows up to 30 days average raw samples. Longer windows chart the
/// materialized daily maxima, so only a bounded range of raw samples is
/// ever loaded. Every window is extended with the latest sample placed one
/// microsecond before `now`.
pub async fn historical_stats(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let samples = network_stats::Entity::find()
        .filter(network_stats::Column::Date.gte(now - RAW_HISTORY))
        .filter(network_stats::Column::Date.lte(now))
        .order_by_asc(network_stats::Column::Date)
        .order_by_asc(network_stats::Column::Id)
        .all(db)
        .await?;

    let maxima = network_stats_max::Entity::find()
        .filter(network_stats_max::Column::Date.lte(now.date()))
        .order_by_asc(network_stats_max::Column::Date)
        .all(db)
        .await?;

    let mut recent: BTreeMap<String, Vec<network_stats::Model>> = BTreeMap::new();

    for sample in samples {
        recent
            .entry(sample.runtime.clone())
            .or_default()
            .push(sample);
    }

    let mut daily: BTreeMap<String, Vec<network_stats_max::Model>> = BTreeMap::new();

    for max in maxima {
        daily.entry(max.runtime.clone()).or_default().push(max);
    }

    let runtimes: BTreeSet<String> = recent.keys().chain(daily.keys()).cloned().collect();

    let mut report = Map::new();

    for runtime in runtimes {
        let recent = recent.get(&runtime).map(Vec::as_slice).unwrap_or_default();
        let daily = daily.get(&runtime).map(Vec::as_slice).unwrap_or_default();

        let latest = network_stats::Entity::find()
            .filter(network_stats::Column::Runtime.eq(runtime.as_str()))
            .filter(network_stats::Column::Date.lt(now))
            .order_by_desc(network_stats::Column::Date)
            .order_by_desc(network_stats::Column::Id)
            .one(db)
            .await?;

        let mut windows = Map::new();

        for window in HISTORICAL {
            let mut buckets: BTreeMap<PrimitiveDateTime, Averages> = BTreeMap::new();

            if window.span.map_or(false, |span| span <= RAW_HISTORY) {
                let earliest = recent.first().map(|sample| sample.date);

                for sample in recent
                    .iter()
                    .filter(|sample| window.contains(sample.date, now, earliest))
                {
                    buckets
                        .entry(window.granularity.truncate(sample.date))
                        .or_default()
                        .add(
                            sample.online.into(),
                            sample.cores.into(),
                            sample.memory,
                            sample.disk,
                            sample.gpus.into(),
                        );
                }
            } else {
                let earliest = daily.first().map(|max| max.date.midnight());

                for max in daily
                    .iter()
                    .filter(|max| window.contains(max.date.midnight(), now, earliest))
                {
                    buckets.entry(max.date.midnight()).or_default().add(
                        max.online.into(),
                        max.cores.into(),
                        max.memory,
                        max.disk,
                        max.gpus.into(),
                    );
                }
            }

            let mut entries: Vec<Value> = buckets
                .iter()
                .map(|(ts, averages)| averages.entry(*ts))
                .collect();

            if let Some(latest) = &latest {
                entries.push(history_entry(
                    now - db::Duration::microseconds(1),
                    latest.online.into(),
                    latest.cores.into(),
                    latest.memory,
                    latest.disk,
                    latest.gpus.into(),
                ));
            }

            windows.insert(window.label.to_owned(), Value::Array(entries));
        }

        report.insert(runtime, Value::Object(windows));
    }

    Ok(Value::Object(report))
}

#[cfg(test)]
mod tests {
    use db::{
        network_stats, network_stats_max, node, offer, ActiveValue, Duration, EntityTrait,
        PaginatorTrait,
    };
    use serde_json::json;

    use super::{
        historical_stats, materialize_daily_max, network_online_stats, sample_network_stats,
    };
    use crate::aggregate::stats::unix_seconds;
    use crate::testing::{create_database, datetime};

    async fn insert_node(db: &db::DatabaseConnection, node_id: &str, online: bool) -> i64 {
        let now = datetime(2024, 1, 1, 0);

        node::Entity::insert(node::ActiveModel {
            node_id: ActiveValue::Set(node_id.to_owned()),
            wallet: ActiveValue::Set(None),
            online: ActiveValue::Set(online),
            computing_now: ActiveValue::Set(false),
            version: ActiveValue::Set(None),
            network: ActiveValue::Set(node::Network::Mainnet),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            uptime_created_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec(db)
        .await
        .expect("unable to insert node")
        .last_insert_id
    }

    async fn insert_offer(
        db: &db::DatabaseConnection,
        node: i64,
        runtime: &str,
        properties: serde_json::Value,
    ) {
        let now = datetime(2024, 1, 1, 0);

        offer::Entity::insert(offer::ActiveModel {
            node_id: ActiveValue::Set(node),
            runtime: ActiveValue::Set(runtime.to_owned()),
            properties: ActiveValue::Set(properties),
            is_overpriced: ActiveValue::Set(false),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert offer");
    }

    async fn insert_sample(db: &db::DatabaseConnection, date: db::PrimitiveDateTime, online: i32) {
        network_stats::Entity::insert(network_stats::ActiveModel {
            runtime: ActiveValue::Set(String::from("vm")),
            online: ActiveValue::Set(online),
            cores: ActiveValue::Set(online * 4),
            threads: ActiveValue::Set(online * 8),
            memory: ActiveValue::Set(2048.0),
            disk: ActiveValue::Set(1024.0),
            gpus: ActiveValue::Set(0),
            cuda_cores: ActiveValue::Set(0),
            gpu_memory: ActiveValue::Set(0.0),
            gpu_models: ActiveValue::Set(json!({})),
            date: ActiveValue::Set(date),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert sample");
    }

    #[tokio::test]
    async fn runtime_sample() {
        let db = create_database().await;

        let online = insert_node(&db, "0xa", true).await;
        let offline = insert_node(&db, "0xb", false).await;

        insert_offer(
            &db,
            online,
            "vm-nvidia",
            json!({
                "golem.inf.cpu.cores": 4,
                "golem.inf.cpu.threads": 8,
                "golem.inf.mem.gib": 16.0,
                "golem.inf.storage.gib": 100.0,
                "golem.!exp.gap-35.v1.inf.gpu.model": "RTX 4090",
                "golem.!exp.gap-35.v1.inf.gpu.cuda.cores": 16384,
                "golem.!exp.gap-35.v1.inf.gpu.memory.total.gib": 24.0,
            }),
        )
        .await;
        insert_offer(
            &db,
            online,
            "vm",
            json!({ "golem.inf.cpu.cores": 2, "golem.inf.cpu.threads": 4 }),
        )
        .await;
        insert_offer(&db, offline, "vm", json!({ "golem.inf.cpu.cores": 64 })).await;

        let report = sample_network_stats(&db, datetime(2024, 1, 2, 0))
            .await
            .expect("unable to sample");

        assert_eq!(
            report,
            json!({
                "vm": {
                    "online": 1,
                    "cores": 2,
                    "threads": 4,
                    "memory": 0.0,
                    "disk": 0.0,
                    "gpus": 0,
                    "cuda_cores": 0,
                    "gpu_memory": 0.0,
                    "gpu_models": {},
                },
                "vm-nvidia": {
                    "online": 1,
                    "cores": 4,
                    "threads": 8,
                    "memory": 16.0,
                    "disk": 100.0,
                    "gpus": 1,
                    "cuda_cores": 16384,
                    "gpu_memory": 24.0,
                    "gpu_models": { "RTX 4090": 1 },
                },
                "totalOnlineMainnet": 1,
                "totalOnlineTestnet": 0,
            })
        );

        let samples = network_stats::Entity::find()
            .count(&db)
            .await
            .expect("unable to count samples");

        assert_eq!(samples, 2);

        let totals = network_online_stats(&db)
            .await
            .expect("unable to compute totals");

        assert_eq!(
            totals,
            json!({
                "providers": 1,
                "cores": 8,
                "memory": 16.0,
                "storage": 100.0,
                "gpus": 1,
            })
        );
    }

    #[tokio::test]
    async fn daily_max_is_idempotent() {
        let db = create_database().await;
        let today = datetime(2024, 1, 3, 0);

        insert_sample(&db, datetime(2024, 1, 1, 3), 10).await;
        insert_sample(&db, datetime(2024, 1, 1, 9), 14).await;
        insert_sample(&db, datetime(2024, 1, 2, 9), 7).await;
        insert_sample(&db, datetime(2024, 1, 3, 1), 99).await;

        let created = materialize_daily_max(&db, today.date(), 7)
            .await
            .expect("unable to materialize");

        assert_eq!(created, 2);

        let created = materialize_daily_max(&db, today.date(), 7)
            .await
            .expect("unable to materialize");

        assert_eq!(created, 0);

        let rows = network_stats_max::Entity::find()
            .all(&db)
            .await
            .expect("unable to query maxima");

        assert_eq!(rows.len(), 2);

        let first = rows
            .iter()
            .find(|row| row.date == datetime(2024, 1, 1, 0).date())
            .expect("bucket must exist");

        assert_eq!(first.online, 14);
        assert_eq!(first.cores, 56);
    }

    #[tokio::test]
    async fn history_windows() {
        let db = create_database().await;
        let now = datetime(2024, 1, 10, 12);

        insert_sample(&db, now - Duration::minutes(90), 10).await;
        insert_sample(&db, now - Duration::minutes(80), 20).await;
        insert_sample(&db, now - Duration::days(3), 4).await;

        let report = historical_stats(&db, now)
            .await
            .expect("unable to build history");

        let day = report["vm"]["1d"].as_array().expect("window must be a list");

        assert_eq!(day.len(), 2);
        assert_eq!(
            day[0],
            json!({
                "date": unix_seconds(datetime(2024, 1, 10, 10)),
                "online": 15,
                "cores": 60,
                "memory": 2.0,
                "disk": 1.0,
                "gpus": 0,
            })
        );
        assert_eq!(day[1]["online"], 20);
        assert_eq!(
            day[1]["date"],
            json!(unix_seconds(now - Duration::microseconds(1)))
        );

        let week = report["vm"]["7d"].as_array().expect("window must be a list");

        assert_eq!(week.len(), 3);
        assert_eq!(report["vm"]["All"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn long_windows_use_daily_maxima() {
        let db = create_database().await;
        let now = datetime(2024, 1, 10, 12);

        insert_sample(&db, now - Duration::days(60), 8).await;
        insert_sample(&db, now - Duration::days(60) + Duration::hours(1), 12).await;
        insert_sample(&db, now - Duration::days(3), 4).await;

        materialize_daily_max(&db, now.date(), 90)
            .await
            .expect("unable to materialize");

        let report = historical_stats(&db, now)
            .await
            .expect("unable to build history");

        let month = report["vm"]["1m"].as_array().expect("window must be a list");

        assert_eq!(month.len(), 2);

        let year = report["vm"]["1y"].as_array().expect("window must be a list");

        assert_eq!(year.len(), 3);
        assert_eq!(
            year[0],
            json!({
                "date": unix_seconds(datetime(2023, 11, 11, 0)),
                "online": 12,
                "cores": 48,
                "memory": 2.0,
                "disk": 1.0,
                "gpus": 0,
            })
        );
        assert_eq!(year[1]["online"], 4);
        assert_eq!(year[2]["online"], 4);
        assert_eq!(report["vm"]["All"], report["vm"]["1y"]);
    }
}
