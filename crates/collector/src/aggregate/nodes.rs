//! Node-facing reports.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use db::{
    computing_total, exchange_rate,
    node::{self, Network},
    node_status_history, offer, reference_instance, ColumnTrait, DatabaseConnection, DbErr,
    Duration, EntityTrait, PaginatorTrait, PrimitiveDateTime, QueryFilter, QueryOrder,
};
use itertools::Itertools;
use offers::{properties::PaymentNetwork, Properties};
use serde_json::{json, Map, Value};
use time::format_description::well_known::Rfc3339;

use super::{
    stats::{round_to, unix_seconds},
    window::{Granularity, LEDGER},
};
use crate::{sources::reputation::ProviderReputation, uptime::node_uptimes};

/// Count of hourly points in the online count report.
const ONLINE_COUNT_POINTS: usize = 90;

const BLACKLISTED_REASON: &str = "Blacklisted by provider or wallet";

/// Offers updated this recently are listed by [`cheapest_offers`].
const RECENT_OFFER: Duration = Duration::minutes(5);

/// Thread counts of the cloud comparison tiers.
const PROVIDER_TIERS: [i64; 4] = [2, 8, 32, 64];

/// Monthly cloud server plan shown next to the cheapest Golem provider.
struct CloudPlan {
    name: &'static str,
    img: &'static str,
    usd_monthly: f64,
    bandwidth: &'static str,
    cores: i64,
    memory: f64,
    disk: f64,
}

const fn plan(
    name: &'static str,
    img: &'static str,
    usd_monthly: f64,
    bandwidth: &'static str,
    cores: i64,
    memory: f64,
    disk: f64,
) -> CloudPlan {
    CloudPlan {
        name,
        img,
        usd_monthly,
        bandwidth,
        cores,
        memory,
        disk,
    }
}

const DO: (&str, &str) = ("Digital Ocean", "/do-logo.svg");
const AWS: (&str, &str) = ("Amazon Web Services", "/aws-logo.svg");
const GCP: (&str, &str) = ("Google Cloud Platform", "/gcp-logo.svg");
const AZURE: (&str, &str) = ("Azure", "/azure-logo.svg");

/// Cloud plans per tier, in [`PROVIDER_TIERS`] order.
const CLOUD_PLANS: [[CloudPlan; 4]; 4] = [
    [
        plan(DO.0, DO.1, 15.0, "3", 2, 1.0, 25.0),
        plan(AWS.0, AWS.1, 15.23, "Unlimited", 2, 1.0, 25.0),
        plan(GCP.0, GCP.1, 10.37, "Unlimited", 2, 1.0, 25.0),
        plan(AZURE.0, AZURE.1, 15.11, "6", 2, 1.0, 25.0),
    ],
    [
        plan(DO.0, DO.1, 80.0, "6", 8, 16.0, 320.0),
        plan(AWS.0, AWS.1, 121.81, "Unlimited", 8, 16.0, 320.0),
        plan(GCP.0, GCP.1, 208.47, "Unlimited", 8, 32.0, 320.0),
        plan(AZURE.0, AZURE.1, 121.18, "6", 8, 16.0, 320.0),
    ],
    [
        plan(DO.0, DO.1, 640.0, "9", 32, 64.0, 400.0),
        plan(AWS.0, AWS.1, 834.24, "Unlimited", 32, 64.0, 400.0),
        plan(GCP.0, GCP.1, 746.04, "Unlimited", 32, 64.0, 400.0),
        plan(AZURE.0, AZURE.1, 1310.13, "1", 32, 64.0, 256.0),
    ],
    [
        plan(DO.0, DO.1, 1200.0, "9", 40, 160.0, 500.0),
        plan(AWS.0, AWS.1, 1638.48, "Unlimited", 64, 64.0, 500.0),
        plan(GCP.0, GCP.1, 1914.62, "Unlimited", 60, 240.0, 500.0),
        plan(AZURE.0, AZURE.1, 2688.37, "1", 64, 256.0, 512.0),
    ],
];

fn timestamp(ts: PrimitiveDateTime) -> Value {
    ts.assume_utc()
        .format(&Rfc3339)
        .map(Value::String)
        .unwrap_or(Value::Null)
}

async fn online_nodes_of(
    db: &DatabaseConnection,
    network: Option<Network>,
) -> Result<Vec<node::Model>, DbErr> {
    let mut query = node::Entity::find().filter(node::Column::Online.eq(true));

    if let Some(network) = network {
        query = query.filter(node::Column::Network.eq(network));
    }

    query.order_by_asc(node::Column::Id).all(db).await
}

async fn uptimes(
    db: &DatabaseConnection,
    nodes: &[node::Model],
    now: PrimitiveDateTime,
) -> Result<HashMap<i64, f64>, DbErr> {
    let accounting: Vec<_> = nodes
        .iter()
        .map(|node| (node.id, node.uptime_created_at))
        .collect();

    node_uptimes(db, &accounting, now).await
}

/// Online node counts per network, grouped by uptime range.
pub async fn uptime_donut(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let mut report = Map::new();

    for network in Network::REPORTED {
        let nodes = online_nodes_of(db, Some(network)).await?;
        let uptimes = uptimes(db, &nodes, now).await?;

        let mut buckets = [0u64; 4];

        for uptime in uptimes.values() {
            let bucket = match *uptime {
                uptime if uptime >= 80.0 => 0,
                uptime if uptime >= 50.0 => 1,
                uptime if uptime >= 30.0 => 2,
                _ => 3,
            };

            buckets[bucket] += 1;
        }

        report.insert(
            network.name().to_owned(),
            json!({
                "80_and_over": buckets[0],
                "50_to_79": buckets[1],
                "30_to_49": buckets[2],
                "below_30": buckets[3],
                "totalOnline": nodes.len(),
            }),
        );
    }

    Ok(Value::Object(report))
}

/// Distinct nodes coming online per hour over the past day.
pub async fn online_counts(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let events = node_status_history::Entity::find()
        .filter(node_status_history::Column::IsOnline.eq(true))
        .filter(node_status_history::Column::Timestamp.gte(now - Duration::hours(24)))
        .all(db)
        .await?;

    let mut hours: BTreeMap<PrimitiveDateTime, Vec<i64>> = BTreeMap::new();

    for event in events {
        hours
            .entry(Granularity::Hour.truncate(event.timestamp))
            .or_default()
            .push(event.node_id);
    }

    let points: Vec<(PrimitiveDateTime, usize)> = hours
        .into_iter()
        .take(ONLINE_COUNT_POINTS)
        .map(|(hour, nodes)| (hour, nodes.into_iter().unique().count()))
        .collect();

    let first = points.first().map_or(0, |(_, count)| *count as i64);
    let last = points.last().map_or(0, |(_, count)| *count as i64);

    let change = last - first;
    let percentage = if first == 0 {
        0.0
    } else {
        change as f64 / first as f64 * 100.0
    };

    let online = node::Entity::find()
        .filter(node::Column::Online.eq(true))
        .count(db)
        .await?;

    let data: Vec<Value> = points
        .into_iter()
        .map(|(hour, providers)| json!({ "date": unix_seconds(hour), "providers": providers }))
        .collect();

    Ok(json!({
        "data": data,
        "stats": {
            "change": change.to_string(),
            "percentageChange": format!("{percentage:.2}%"),
            "changeType": if change >= 0 { "positive" } else { "negative" },
            "value": online,
        },
    }))
}

fn reputation_entry(reputation: Option<&ProviderReputation>) -> Value {
    match reputation {
        Some(reputation) => {
            let blacklisted = reputation.is_blacklisted();

            json!({
                "blacklisted": blacklisted,
                "blacklistedReason": blacklisted.then_some(BLACKLISTED_REASON),
                "taskReputation": reputation.success_rate,
            })
        }
        None => json!({
            "blacklisted": false,
            "blacklistedReason": null,
        }),
    }
}

/// Online nodes with their offers, reputation and uptime.
pub async fn online_nodes(
    db: &DatabaseConnection,
    reputation: &HashMap<String, ProviderReputation>,
    now: PrimitiveDateTime,
) -> Result<Value, DbErr> {
    let nodes = online_nodes_of(db, None).await?;
    let uptimes = uptimes(db, &nodes, now).await?;

    let mut offers: HashMap<i64, Vec<offer::Model>> = HashMap::new();

    for chunk in nodes.chunks(500) {
        let found = offer::Entity::find()
            .filter(offer::Column::NodeId.is_in(chunk.iter().map(|node| node.id)))
            .order_by_asc(offer::Column::Runtime)
            .all(db)
            .await?;

        for offer in found {
            offers.entry(offer.node_id).or_default().push(offer);
        }
    }

    let report = nodes
        .iter()
        .map(|node| {
            let runtimes: Map<String, Value> = offers
                .get(&node.id)
                .into_iter()
                .flatten()
                .map(|offer| {
                    (
                        offer.runtime.clone(),
                        json!({
                            "monthly_price_glm": offer.monthly_price_glm,
                            "updated_at": timestamp(offer.updated_at),
                            "properties": offer.properties,
                        }),
                    )
                })
                .collect();

            json!({
                "node_id": node.node_id,
                "wallet": node.wallet,
                "online": node.online,
                "version": node.version,
                "network": node.network,
                "computing_now": node.computing_now,
                "created_at": timestamp(node.created_at),
                "updated_at": timestamp(node.updated_at),
                "runtimes": runtimes,
                "reputation": reputation_entry(reputation.get(&node.node_id)),
                "uptime": uptimes.get(&node.id).copied().unwrap_or_default(),
            })
        })
        .collect();

    Ok(Value::Array(report))
}

/// Cheapest online mainnet `vm` offer matching each reference instance.
///
/// Offers match when their thread count equals the reference vCPU count
/// and they provide at least as much memory.
pub async fn reference_comparison(db: &DatabaseConnection) -> Result<Value, DbErr> {
    let references = reference_instance::Entity::find()
        .order_by_asc(reference_instance::Column::Name)
        .all(db)
        .await?;

    let candidates: Vec<(String, i64, f64, Option<f64>)> = offer::Entity::find()
        .find_also_related(node::Entity)
        .filter(offer::Column::Runtime.eq("vm"))
        .filter(node::Column::Online.eq(true))
        .filter(node::Column::Network.eq(Network::Mainnet))
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(offer, node)| {
            let properties = Properties::from_value(&offer.properties)?;

            Some((
                node?.node_id,
                properties.threads()?,
                properties.memory_gib()?,
                offer.hourly_price_usd,
            ))
        })
        .collect();

    let report = references
        .iter()
        .map(|reference| {
            let cheapest = candidates
                .iter()
                .filter(|(_, threads, memory, _)| {
                    *threads == i64::from(reference.vcpu) && *memory >= reference.memory
                })
                .min_by(|a, b| match (a.3, b.3) {
                    (Some(a), Some(b)) => a.total_cmp(&b),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                });

            let price = cheapest.and_then(|(_, _, _, price)| *price);

            let cheaper = match (cheapest, price) {
                (Some((node_id, ..)), Some(price)) if price != 0.0 && reference.price_usd > 0.0 => {
                    let percentage = (reference.price_usd - price) / reference.price_usd * 100.0;
                    Some((node_id.clone(), round_to(percentage, 2)))
                }
                _ => None,
            };

            json!({
                "ec2_instance_name": reference.name,
                "ec2_vcpu": reference.vcpu,
                "ec2_memory": reference.memory,
                "ec2_hourly_price_usd": reference.price_usd,
                "cheapest_golem_hourly_price_usd": price,
                "golem_node_id": cheaper.as_ref().map(|(node_id, _)| node_id),
                "golem_percentage_cheaper": cheaper.as_ref().map(|(_, percentage)| percentage),
            })
        })
        .collect();

    Ok(Value::Array(report))
}

/// Online nodes with their offers, in offer order.
async fn online_offers(
    db: &DatabaseConnection,
) -> Result<Vec<(offer::Model, node::Model)>, DbErr> {
    Ok(offer::Entity::find()
        .find_also_related(node::Entity)
        .filter(node::Column::Online.eq(true))
        .order_by_asc(offer::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(offer, node)| Some((offer, node?)))
        .collect())
}

/// Count online nodes per value of a CPU property.
///
/// Every node is counted once, using the first of its offers that
/// advertises the property.
async fn count_per_node(
    db: &DatabaseConnection,
    property: fn(&Properties) -> Option<&str>,
    seeded: &[&str],
) -> Result<Value, DbErr> {
    let mut counts: BTreeMap<String, u64> =
        seeded.iter().map(|value| ((*value).to_owned(), 0)).collect();
    let mut counted = HashSet::new();

    for (offer, node) in online_offers(db).await? {
        if counted.contains(&node.id) {
            continue;
        }

        let Some(properties) = Properties::from_value(&offer.properties) else {
            continue;
        };

        if let Some(value) = property(&properties) {
            *counts.entry(value.to_owned()).or_default() += 1;
            counted.insert(node.id);
        }
    }

    Ok(json!(counts))
}

/// Online node count per CPU vendor.
pub async fn cpu_vendors(db: &DatabaseConnection) -> Result<Value, DbErr> {
    count_per_node(db, Properties::cpu_vendor, &[]).await
}

/// Online node count per CPU architecture, always listing `arm64`.
pub async fn cpu_architectures(db: &DatabaseConnection) -> Result<Value, DbErr> {
    count_per_node(db, Properties::cpu_architecture, &["arm64"]).await
}

/// Priced `vm` offers updated within the last five minutes, cheapest first.
pub async fn cheapest_offers(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let offers = offer::Entity::find()
        .find_also_related(node::Entity)
        .filter(offer::Column::Runtime.eq("vm"))
        .filter(offer::Column::MonthlyPriceGlm.is_not_null())
        .filter(offer::Column::UpdatedAt.gte(now - RECENT_OFFER))
        .filter(offer::Column::UpdatedAt.lte(now))
        .order_by_asc(offer::Column::MonthlyPriceGlm)
        .order_by_asc(offer::Column::Id)
        .all(db)
        .await?;

    let report = offers
        .into_iter()
        .filter_map(|(offer, node)| {
            Some(json!({
                "node_id": node?.node_id,
                "runtime": offer.runtime,
                "monthly_price_glm": offer.monthly_price_glm,
                "monthly_price_usd": offer.monthly_price_usd,
                "hourly_price_glm": offer.hourly_price_glm,
                "hourly_price_usd": offer.hourly_price_usd,
                "is_overpriced": offer.is_overpriced,
                "properties": offer.properties,
                "updated_at": timestamp(offer.updated_at),
            }))
        })
        .collect();

    Ok(Value::Array(report))
}

/// Cheapest online mainnet provider of every thread tier, listed among
/// monthly cloud server plans of the same size.
///
/// A tier picks the provider with the fewest threads at or above the tier,
/// the cheapest one among equals. Entries of a tier are sorted by monthly
/// USD price. Prices that need the GLM rate are `null` while it is unknown.
pub async fn cheapest_providers(db: &DatabaseConnection) -> Result<Value, DbErr> {
    let rate = exchange_rate::Entity::find_by_id(exchange_rate::GLM_RATE_ID)
        .one(db)
        .await?
        .map(|rate| rate.current_price)
        .filter(|rate| *rate > 0.0);

    let mut candidates: Vec<(String, Properties, f64)> = online_offers(db)
        .await?
        .into_iter()
        .filter(|(offer, _)| offer.runtime == "vm")
        .filter_map(|(offer, node)| {
            let properties = Properties::from_value(&offer.properties)?;
            let price = offer.monthly_price_glm?;

            let mainnet = properties.payment_network() == PaymentNetwork::Mainnet;

            (mainnet && properties.threads().is_some()).then_some((node.node_id, properties, price))
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.1.threads()
            .cmp(&b.1.threads())
            .then(a.2.total_cmp(&b.2))
    });

    let mut report = Map::new();

    for (tier, plans) in PROVIDER_TIERS.iter().zip(CLOUD_PLANS.iter()) {
        let mut entries: Vec<(Option<f64>, Value)> = plans
            .iter()
            .map(|plan| {
                (
                    Some(plan.usd_monthly),
                    json!({
                        "name": plan.name,
                        "img": plan.img,
                        "usd_monthly": plan.usd_monthly,
                        "bandwidth": plan.bandwidth,
                        "cores": plan.cores,
                        "memory": plan.memory,
                        "disk": plan.disk,
                        "glm": rate.map(|rate| plan.usd_monthly / rate),
                    }),
                )
            })
            .collect();

        let cheapest = candidates.iter().find(|(_, properties, _)| {
            properties
                .threads()
                .map_or(false, |threads| threads >= *tier)
        });

        if let Some((node_id, properties, glm)) = cheapest {
            let resources = properties.resources();
            let usd_monthly = rate.map(|rate| glm * rate);

            entries.push((
                usd_monthly,
                json!({
                    "name": "Golem Network",
                    "node_id": node_id,
                    "img": "/golem.png",
                    "usd_monthly": usd_monthly,
                    "bandwidth": "Unlimited",
                    "cores": resources.threads,
                    "memory": resources.memory_gib,
                    "disk": resources.storage_gib,
                    "glm": glm,
                }),
            ));
        }

        entries.sort_by(|a, b| {
            a.0.unwrap_or(f64::INFINITY)
                .total_cmp(&b.0.unwrap_or(f64::INFINITY))
        });

        report.insert(
            tier.to_string(),
            Value::Array(entries.into_iter().map(|(_, entry)| entry).collect()),
        );
    }

    Ok(Value::Object(report))
}

/// Daily maximum of computing providers within every ledger window.
pub async fn computing_totals(db: &DatabaseConnection, now: PrimitiveDateTime) -> Result<Value, DbErr> {
    let totals = computing_total::Entity::find()
        .filter(computing_total::Column::Date.lte(now.date()))
        .order_by_asc(computing_total::Column::Date)
        .all(db)
        .await?;

    let earliest = totals.first().map(|total| total.date.midnight());

    let windows: Map<String, Value> = LEDGER
        .iter()
        .map(|window| {
            let start = window.start(now, earliest).map(|start| start.date());

            let entries: Vec<Value> = totals
                .iter()
                .filter(|total| start.map_or(false, |start| total.date >= start))
                .map(|total| json!({ "date": total.date.to_string(), "total": total.total }))
                .collect();

            (window.label.to_owned(), Value::Array(entries))
        })
        .collect();

    Ok(Value::Object(windows))
}

/// Payment addresses of online nodes with the count of nodes using each,
/// and the advertised names of online nodes.
pub async fn wallets_and_ids(db: &DatabaseConnection) -> Result<Value, DbErr> {
    let mut wallets: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    let mut providers: BTreeSet<(String, String)> = BTreeSet::new();

    for (offer, node) in online_offers(db).await? {
        let Some(properties) = Properties::from_value(&offer.properties) else {
            continue;
        };

        for address in properties.payment_addresses() {
            wallets
                .entry(address.to_owned())
                .or_default()
                .insert(node.node_id.clone());
        }

        if let Some(name) = properties.node_name().filter(|name| !name.is_empty()) {
            providers.insert((node.node_id.clone(), name.to_owned()));
        }
    }

    let wallets: Vec<Value> = wallets
        .into_iter()
        .map(|(address, nodes)| json!({ "address": address, "provider_count": nodes.len() }))
        .collect();

    let providers: Vec<Value> = providers
        .into_iter()
        .map(|(id, name)| json!({ "provider_name": name, "id": id }))
        .collect();

    Ok(json!({ "wallets": wallets, "providers": providers }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_json::{assert_json, validators};
    use db::{
        computing_total, exchange_rate,
        node::{self, Network},
        offer, reference_instance, ActiveValue, Duration, EntityTrait, PrimitiveDateTime,
    };
    use serde_json::{json, Value};

    use super::{
        cheapest_offers, cheapest_providers, computing_totals, cpu_architectures, cpu_vendors,
        online_counts, online_nodes, reference_comparison, uptime_donut, wallets_and_ids,
    };
    use crate::{
        sources::reputation::ProviderReputation,
        status::{apply_transitions, Observation},
        testing::{create_database, datetime},
    };

    /// Create online nodes one by one, so that their ids follow the given order.
    async fn create_nodes(
        db: &db::DatabaseConnection,
        node_ids: &[&str],
        now: db::PrimitiveDateTime,
    ) {
        for node_id in node_ids {
            apply_transitions(db, &[Observation::online(*node_id)], now)
                .await
                .expect("unable to apply");
        }
    }

    async fn insert_offer(
        db: &db::DatabaseConnection,
        node: i64,
        runtime: &str,
        properties: Value,
        monthly_price_glm: Option<f64>,
        updated_at: PrimitiveDateTime,
    ) {
        offer::Entity::insert(offer::ActiveModel {
            node_id: ActiveValue::Set(node),
            runtime: ActiveValue::Set(runtime.to_owned()),
            properties: ActiveValue::Set(properties),
            monthly_price_glm: ActiveValue::Set(monthly_price_glm),
            is_overpriced: ActiveValue::Set(false),
            created_at: ActiveValue::Set(updated_at),
            updated_at: ActiveValue::Set(updated_at),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert offer");
    }

    async fn set_network(db: &db::DatabaseConnection, network: Network) {
        node::Entity::update_many()
            .col_expr(node::Column::Network, db::sea_query::Expr::value(network))
            .exec(db)
            .await
            .expect("unable to update nodes");
    }

    #[tokio::test]
    async fn donut_buckets() {
        let db = create_database().await;
        let start = datetime(2024, 1, 1, 0);

        apply_transitions(
            &db,
            &[Observation::online("0xa"), Observation::online("0xb")],
            start,
        )
        .await
        .expect("unable to apply");
        apply_transitions(
            &db,
            &[Observation::offline("0xb")],
            start + Duration::hours(1),
        )
        .await
        .expect("unable to apply");
        apply_transitions(
            &db,
            &[Observation::online("0xb")],
            start + Duration::hours(8),
        )
        .await
        .expect("unable to apply");

        set_network(&db, Network::Mainnet).await;

        let report = uptime_donut(&db, start + Duration::hours(10))
            .await
            .expect("unable to build report");

        assert_json!(report, {
            "mainnet": {
                "80_and_over": 1,
                "50_to_79": 0,
                "30_to_49": 1,
                "below_30": 0,
                "totalOnline": 2,
            },
            "testnet": {
                "80_and_over": 0,
                "50_to_79": 0,
                "30_to_49": 0,
                "below_30": 0,
                "totalOnline": 0,
            },
        });
    }

    #[tokio::test]
    async fn hourly_online_counts() {
        let db = create_database().await;
        let now = datetime(2024, 1, 2, 0);

        apply_transitions(
            &db,
            &[Observation::online("0xa"), Observation::online("0xb")],
            now - Duration::hours(5),
        )
        .await
        .expect("unable to apply");
        apply_transitions(
            &db,
            &[Observation::offline("0xa"), Observation::offline("0xb")],
            now - Duration::hours(4),
        )
        .await
        .expect("unable to apply");
        apply_transitions(
            &db,
            &[Observation::online("0xa")],
            now - Duration::hours(2),
        )
        .await
        .expect("unable to apply");

        let report = online_counts(&db, now).await.expect("unable to build report");

        assert_eq!(report["data"][0]["providers"], 2);
        assert_eq!(report["data"][1]["providers"], 1);

        assert_json!(report["stats"].clone(), {
            "change": "-1",
            "percentageChange": "-50.00%",
            "changeType": "negative",
            "value": 1,
        });
    }

    #[tokio::test]
    async fn online_listing() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        create_nodes(&db, &["0xa", "0xb"], now).await;

        offer::Entity::insert(offer::ActiveModel {
            node_id: ActiveValue::Set(1),
            runtime: ActiveValue::Set(String::from("vm")),
            properties: ActiveValue::Set(json!({ "golem.runtime.name": "vm" })),
            monthly_price_glm: ActiveValue::Set(Some(12.0)),
            is_overpriced: ActiveValue::Set(false),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec_without_returning(&db)
        .await
        .expect("unable to insert offer");

        let reputation = HashMap::from([(
            String::from("0xa"),
            ProviderReputation {
                node_id: String::from("0xa"),
                success_rate: Some(0.5),
                is_blacklisted_provider: false,
                is_blacklisted_wallet: true,
            },
        )]);

        let report = online_nodes(&db, &reputation, now + Duration::hours(1))
            .await
            .expect("unable to build report");

        let nodes = report.as_array().expect("report must be a list");

        assert_eq!(nodes.len(), 2);

        let first = nodes
            .iter()
            .find(|node| node["node_id"] == "0xa")
            .expect("node must be listed");

        assert_eq!(first["runtimes"]["vm"]["monthly_price_glm"], 12.0);
        assert_eq!(first["runtimes"]["vm"]["updated_at"], "2024-01-01T00:00:00Z");
        assert_eq!(first["uptime"], 100.0);
        assert_eq!(
            first["reputation"],
            json!({
                "blacklisted": true,
                "blacklistedReason": "Blacklisted by provider or wallet",
                "taskReputation": 0.5,
            })
        );

        let second = nodes
            .iter()
            .find(|node| node["node_id"] == "0xb")
            .expect("node must be listed");

        assert_eq!(
            second["reputation"],
            json!({ "blacklisted": false, "blacklistedReason": null })
        );
        assert_eq!(second["runtimes"], json!({}));
    }

    #[tokio::test]
    async fn reference_matches() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        create_nodes(&db, &["0xa", "0xb"], now).await;
        set_network(&db, Network::Mainnet).await;

        for (node, memory, price) in [(1, 16.0, 0.05), (2, 32.0, 0.025)] {
            offer::Entity::insert(offer::ActiveModel {
                node_id: ActiveValue::Set(node),
                runtime: ActiveValue::Set(String::from("vm")),
                properties: ActiveValue::Set(json!({
                    "golem.inf.cpu.threads": 4,
                    "golem.inf.mem.gib": memory,
                })),
                hourly_price_usd: ActiveValue::Set(Some(price)),
                is_overpriced: ActiveValue::Set(false),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            })
            .exec_without_returning(&db)
            .await
            .expect("unable to insert offer");
        }

        for (name, vcpu, memory) in [("t3.xlarge", 4, 16.0), ("c5.large", 2, 4.0)] {
            reference_instance::Entity::insert(reference_instance::ActiveModel {
                name: ActiveValue::Set(String::from(name)),
                vcpu: ActiveValue::Set(vcpu),
                memory: ActiveValue::Set(memory),
                price_usd: ActiveValue::Set(0.1),
                ..Default::default()
            })
            .exec_without_returning(&db)
            .await
            .expect("unable to insert reference");
        }

        let report = reference_comparison(&db)
            .await
            .expect("unable to build report");

        assert_eq!(
            report,
            json!([
                {
                    "ec2_instance_name": "c5.large",
                    "ec2_vcpu": 2,
                    "ec2_memory": 4.0,
                    "ec2_hourly_price_usd": 0.1,
                    "cheapest_golem_hourly_price_usd": null,
                    "golem_node_id": null,
                    "golem_percentage_cheaper": null,
                },
                {
                    "ec2_instance_name": "t3.xlarge",
                    "ec2_vcpu": 4,
                    "ec2_memory": 16.0,
                    "ec2_hourly_price_usd": 0.1,
                    "cheapest_golem_hourly_price_usd": 0.025,
                    "golem_node_id": "0xb",
                    "golem_percentage_cheaper": 75.0,
                },
            ])
        );
    }

    #[tokio::test]
    async fn cpu_counts_per_node() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        create_nodes(&db, &["0xa", "0xb", "0xc", "0xd"], now).await;
        apply_transitions(&db, &[Observation::offline("0xd")], now + Duration::hours(1))
            .await
            .expect("unable to apply");

        let intel = json!({
            "golem.inf.cpu.vendor": "GenuineIntel",
            "golem.inf.cpu.architecture": "x86_64",
        });
        let amd = json!({
            "golem.inf.cpu.vendor": "AuthenticAMD",
            "golem.inf.cpu.architecture": "x86_64",
        });

        insert_offer(&db, 1, "vm", intel.clone(), None, now).await;
        insert_offer(&db, 1, "vm-nvidia", intel, None, now).await;
        insert_offer(&db, 2, "vm", amd.clone(), None, now).await;
        insert_offer(&db, 3, "vm", json!({ "golem.inf.cpu.threads": 2 }), None, now).await;
        insert_offer(&db, 4, "vm", amd, None, now).await;

        let vendors = cpu_vendors(&db).await.expect("unable to build report");

        assert_json!(vendors, {
            "GenuineIntel": 1,
            "AuthenticAMD": 1,
        });

        let architectures = cpu_architectures(&db)
            .await
            .expect("unable to build report");

        assert_json!(architectures, {
            "arm64": 0,
            "x86_64": 2,
        });
    }

    #[tokio::test]
    async fn recent_offers_cheapest_first() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 12);

        create_nodes(&db, &["0xa", "0xb", "0xc"], now).await;

        let props = json!({ "golem.inf.cpu.threads": 4 });

        insert_offer(&db, 1, "vm", props.clone(), Some(20.0), now - Duration::minutes(1)).await;
        insert_offer(&db, 2, "vm", props.clone(), Some(10.0), now - Duration::minutes(2)).await;
        insert_offer(&db, 3, "vm", props.clone(), Some(5.0), now - Duration::minutes(10)).await;
        insert_offer(&db, 1, "vm-nvidia", props.clone(), Some(1.0), now).await;
        insert_offer(&db, 3, "vm-nvidia", props, None, now).await;

        let report = cheapest_offers(&db, now)
            .await
            .expect("unable to build report");

        assert_json!(report, [
            {
                "node_id": "0xb",
                "runtime": "vm",
                "monthly_price_glm": 10.0,
                "monthly_price_usd": null,
                "hourly_price_glm": null,
                "hourly_price_usd": null,
                "is_overpriced": false,
                "properties": validators::any(),
                "updated_at": "2024-01-01T11:58:00Z",
            },
            {
                "node_id": "0xa",
                "runtime": "vm",
                "monthly_price_glm": 20.0,
                "monthly_price_usd": null,
                "hourly_price_glm": null,
                "hourly_price_usd": null,
                "is_overpriced": false,
                "properties": validators::any(),
                "updated_at": "2024-01-01T11:59:00Z",
            },
        ]);
    }

    #[tokio::test]
    async fn cheapest_provider_per_tier() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        create_nodes(&db, &["0xa", "0xb", "0xc"], now).await;

        exchange_rate::Entity::insert(exchange_rate::ActiveModel {
            id: ActiveValue::Set(exchange_rate::GLM_RATE_ID),
            current_price: ActiveValue::Set(0.5),
            updated_at: ActiveValue::Set(now),
        })
        .exec_without_returning(&db)
        .await
        .expect("unable to insert rate");

        let offer = |threads: i64, platform: &str| {
            let mut properties = json!({
                "golem.inf.cpu.threads": threads,
                "golem.inf.mem.gib": 8.0,
                "golem.inf.storage.gib": 100.0,
            });

            properties[format!("golem.com.payment.platform.{platform}.address")] =
                json!("0xwallet");

            properties
        };

        insert_offer(&db, 1, "vm", offer(4, "erc20-polygon-glm"), Some(10.0), now).await;
        insert_offer(&db, 2, "vm", offer(8, "erc20-polygon-glm"), Some(30.0), now).await;
        insert_offer(&db, 3, "vm", offer(2, "erc20-holesky-tglm"), Some(1.0), now).await;

        let report = cheapest_providers(&db)
            .await
            .expect("unable to build report");

        let names = |tier: &str| -> Vec<String> {
            report[tier]
                .as_array()
                .expect("tier must be a list")
                .iter()
                .map(|entry| entry["name"].as_str().unwrap_or_default().to_owned())
                .collect()
        };

        assert_eq!(
            names("2"),
            [
                "Golem Network",
                "Google Cloud Platform",
                "Digital Ocean",
                "Azure",
                "Amazon Web Services",
            ]
        );
        assert_eq!(
            names("8"),
            [
                "Golem Network",
                "Digital Ocean",
                "Azure",
                "Amazon Web Services",
                "Google Cloud Platform",
            ]
        );
        assert_eq!(names("32").len(), 4);
        assert_eq!(names("64").len(), 4);

        assert_json!(report["2"][0].clone(), {
            "name": "Golem Network",
            "node_id": "0xa",
            "img": "/golem.png",
            "usd_monthly": 5.0,
            "bandwidth": "Unlimited",
            "cores": 4,
            "memory": 8.0,
            "disk": 100.0,
            "glm": 10.0,
        });
        assert_json!(report["2"][2].clone(), {
            "name": "Digital Ocean",
            "img": "/do-logo.svg",
            "usd_monthly": 15.0,
            "bandwidth": "3",
            "cores": 2,
            "memory": 1.0,
            "disk": 25.0,
            "glm": 30.0,
        });
    }

    #[tokio::test]
    async fn computing_totals_per_window() {
        let db = create_database().await;
        let now = datetime(2024, 3, 10, 12);

        for (days, total) in [(40, 3), (3, 5), (0, 7)] {
            computing_total::Entity::insert(computing_total::ActiveModel {
                total: ActiveValue::Set(total),
                date: ActiveValue::Set((now - Duration::days(days)).date()),
                ..Default::default()
            })
            .exec_without_returning(&db)
            .await
            .expect("unable to insert total");
        }

        let report = computing_totals(&db, now)
            .await
            .expect("unable to build report");

        assert_json!(report["7d"].clone(), [
            { "date": "2024-03-07", "total": 5 },
            { "date": "2024-03-10", "total": 7 },
        ]);
        assert_eq!(report["1m"], report["7d"]);
        assert_json!(report["All"].clone(), [
            { "date": "2024-01-30", "total": 3 },
            { "date": "2024-03-07", "total": 5 },
            { "date": "2024-03-10", "total": 7 },
        ]);
    }

    #[tokio::test]
    async fn wallets_of_online_nodes() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        create_nodes(&db, &["0xa", "0xb", "0xc"], now).await;
        apply_transitions(&db, &[Observation::offline("0xc")], now + Duration::hours(1))
            .await
            .expect("unable to apply");

        let alpha = json!({
            "golem.com.payment.platform.erc20-polygon-glm.address": "0xw1",
            "golem.node.id.name": "alpha",
        });

        insert_offer(&db, 1, "vm", alpha.clone(), None, now).await;
        insert_offer(&db, 1, "vm-nvidia", alpha, None, now).await;
        insert_offer(
            &db,
            2,
            "vm",
            json!({
                "golem.com.payment.platform.erc20-polygon-glm.address": "0xw1",
                "golem.com.payment.platform.zksync-mainnet-glm.address": "0xw2",
                "golem.node.id.name": "",
            }),
            None,
            now,
        )
        .await;
        insert_offer(
            &db,
            3,
            "vm",
            json!({
                "golem.com.payment.platform.erc20-polygon-glm.address": "0xw3",
                "golem.node.id.name": "gamma",
            }),
            None,
            now,
        )
        .await;

        let report = wallets_and_ids(&db).await.expect("unable to build report");

        assert_json!(report, {
            "wallets": [
                { "address": "0xw1", "provider_count": 2 },
                { "address": "0xw2", "provider_count": 1 },
            ],
            "providers": [
                { "provider_name": "alpha", "id": "0xa" },
            ],
        });
    }
}
