//! Offer reconciliation.
//!
//! A scan produces a batch of flattened offers. Reconciliation converges
//! stored nodes and offers with that batch using a fixed pipeline: nodes are
//! created first, then offers are priced and compared with their stored
//! state, and finally staged changes are written in chunks of
//! [`WRITE_CHUNK`] rows per statement. Offers whose derived state did not
//! change are never written.

use std::collections::HashMap;

use db::{
    exchange_rate, node, offer, reference_instance,
    sea_query::OnConflict,
    ActiveValue, ColumnTrait, DatabaseConnection, Date, DbErr, EntityTrait, PrimitiveDateTime,
    QueryFilter,
};
use offers::{
    flatten::flatten,
    pricing::{closest_reference, compare, price_offer, Comparison, MonthClock, ReferenceSpec},
    properties::PaymentNetwork,
    Properties,
};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Row count of a single bulk statement.
const WRITE_CHUNK: usize = 200;

/// Flattened offer of a single provider.
#[derive(Debug, Clone)]
pub struct ScannedOffer {
    pub node_id: String,
    pub properties: Properties,
}

impl ScannedOffer {
    /// Flatten a raw upstream offer.
    ///
    /// Returns [`None`] if the record can not be used.
    pub fn from_raw(node_id: &str, raw: &Value) -> Option<Self> {
        let node_id = node_id.trim().to_lowercase();

        if node_id.is_empty() {
            return None;
        }

        let properties = flatten(raw)?;

        Some(Self {
            node_id,
            properties,
        })
    }
}

/// Values required to price offers.
#[derive(Debug, Clone)]
pub struct PricingContext {
    pub clock: MonthClock,
    pub glm_usd: f64,
    pub references: Vec<ReferenceSpec>,
}

impl PricingContext {
    /// Load the exchange rate and the reference instance catalog.
    pub async fn load(db: &DatabaseConnection, today: Date) -> Result<Self, DbErr> {
        let glm_usd = match exchange_rate::Entity::find_by_id(exchange_rate::GLM_RATE_ID)
            .one(db)
            .await?
        {
            Some(rate) => rate.current_price,
            None => {
                warn!("exchange rate is not known yet, USD prices will be zero");
                0.0
            }
        };

        let references = reference_instance::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|instance| ReferenceSpec {
                id: instance.id,
                vcpu: instance.vcpu.into(),
                memory: instance.memory,
                price_usd: instance.price_usd,
            })
            .collect();

        Ok(Self {
            clock: MonthClock::for_date(today),
            glm_usd,
            references,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created_nodes: usize,
    pub updated_nodes: usize,
    pub created_offers: usize,
    pub updated_offers: usize,
    pub unchanged_offers: usize,
    pub skipped: usize,
}

/// Map an advertised payment network to the stored one.
pub fn network_of(properties: &Properties) -> node::Network {
    match properties.payment_network() {
        PaymentNetwork::Mainnet => node::Network::Mainnet,
        PaymentNetwork::Testnet => node::Network::Testnet,
        PaymentNetwork::Unknown => node::Network::Unknown,
    }
}

fn network_rank(network: node::Network) -> u8 {
    match network {
        node::Network::Mainnet => 2,
        node::Network::Testnet => 1,
        node::Network::Unknown => 0,
    }
}

/// Node identity derived from all offers of a node in a batch.
#[derive(Debug, Clone, PartialEq)]
struct NodeIdentity {
    wallet: Option<String>,
    network: node::Network,
}

impl NodeIdentity {
    fn merge(&mut self, properties: &Properties) {
        if self.wallet.is_none() {
            self.wallet = properties.wallet().map(str::to_owned);
        }

        let network = network_of(properties);

        if network_rank(network) > network_rank(self.network) {
            self.network = network;
        }
    }
}

/// Derived offer fields.
#[derive(Debug, Clone, PartialEq)]
struct Derived {
    monthly_price_glm: Option<f64>,
    monthly_price_usd: Option<f64>,
    hourly_price_glm: Option<f64>,
    hourly_price_usd: Option<f64>,
    comparison: Comparison,
}

impl Derived {
    fn stored(model: &offer::Model) -> Self {
        Self {
            monthly_price_glm: model.monthly_price_glm,
            monthly_price_usd: model.monthly_price_usd,
            hourly_price_glm: model.hourly_price_glm,
            hourly_price_usd: model.hourly_price_usd,
            comparison: Comparison {
                is_overpriced: model.is_overpriced,
                overpriced_compared_to: model.overpriced_compared_to,
                times_more_expensive: model.times_more_expensive,
                cheaper_than: model.cheaper_than,
                times_cheaper: model.times_cheaper,
                suggest_env_per_hour_price: model.suggest_env_per_hour_price,
            },
        }
    }

    fn empty() -> Self {
        Self {
            monthly_price_glm: None,
            monthly_price_usd: None,
            hourly_price_glm: None,
            hourly_price_usd: None,
            comparison: Comparison::default(),
        }
    }
}

/// Compute derived fields of an offer, starting from its previous state.
///
/// Fields that can not be derived keep their previous values.
fn derive(
    node_id: &str,
    properties: &Properties,
    previous: Derived,
    ctx: &PricingContext,
) -> Derived {
    let pricing = match price_offer(properties, ctx.clock, ctx.glm_usd) {
        Ok(Some(pricing)) => pricing,
        Ok(None) => return previous,
        Err(error) => {
            warn!(%node_id, %error, "unable to price offer");
            return previous;
        }
    };

    let vcpu = properties.threads().unwrap_or_default() as f64;
    let memory = properties.memory_gib().unwrap_or_default();

    let comparison = match closest_reference(&ctx.references, vcpu, memory) {
        Some(reference) => match compare(pricing.monthly_usd, reference, ctx.clock, ctx.glm_usd) {
            Some(comparison) => comparison,
            None => {
                debug!(%node_id, reference = reference.id, "reference instance has no price");
                previous.comparison
            }
        },
        None => Comparison::default(),
    };

    Derived {
        monthly_price_glm: Some(pricing.monthly_glm),
        monthly_price_usd: Some(pricing.monthly_usd),
        hourly_price_glm: Some(pricing.hourly_glm),
        hourly_price_usd: Some(pricing.hourly_usd),
        comparison,
    }
}

fn offer_model(
    node: i64,
    runtime: String,
    properties: Value,
    derived: Derived,
    created_at: PrimitiveDateTime,
    updated_at: PrimitiveDateTime,
) -> offer::ActiveModel {
    offer::ActiveModel {
        node_id: ActiveValue::Set(node),
        runtime: ActiveValue::Set(runtime),
        properties: ActiveValue::Set(properties),
        monthly_price_glm: ActiveValue::Set(derived.monthly_price_glm),
        monthly_price_usd: ActiveValue::Set(derived.monthly_price_usd),
        hourly_price_glm: ActiveValue::Set(derived.hourly_price_glm),
        hourly_price_usd: ActiveValue::Set(derived.hourly_price_usd),
        is_overpriced: ActiveValue::Set(derived.comparison.is_overpriced),
        overpriced_compared_to: ActiveValue::Set(derived.comparison.overpriced_compared_to),
        times_more_expensive: ActiveValue::Set(derived.comparison.times_more_expensive),
        cheaper_than: ActiveValue::Set(derived.comparison.cheaper_than),
        times_cheaper: ActiveValue::Set(derived.comparison.times_cheaper),
        suggest_env_per_hour_price: ActiveValue::Set(derived.comparison.suggest_env_per_hour_price),
        created_at: ActiveValue::Set(created_at),
        updated_at: ActiveValue::Set(updated_at),
        ..Default::default()
    }
}

async fn nodes_by_id(
    db: &DatabaseConnection,
    ids: &[String],
) -> Result<HashMap<String, node::Model>, DbErr> {
    let mut nodes = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(WRITE_CHUNK) {
        let found = node::Entity::find()
            .filter(node::Column::NodeId.is_in(chunk.iter().cloned()))
            .all(db)
            .await?;

        nodes.extend(found.into_iter().map(|node| (node.node_id.clone(), node)));
    }

    Ok(nodes)
}

async fn offers_by_key(
    db: &DatabaseConnection,
    nodes: &[i64],
) -> Result<HashMap<(i64, String), offer::Model>, DbErr> {
    let mut offers = HashMap::new();

    for chunk in nodes.chunks(WRITE_CHUNK) {
        let found = offer::Entity::find()
            .filter(offer::Column::NodeId.is_in(chunk.iter().copied()))
            .all(db)
            .await?;

        offers.extend(
            found
                .into_iter()
                .map(|offer| ((offer.node_id, offer.runtime.clone()), offer)),
        );
    }

    Ok(offers)
}

/// Converge stored nodes and offers with a scanned batch.
///
/// Created and changed offers are upserted with one statement per
/// [`WRITE_CHUNK`] rows, so a large batch issues several statements.
pub async fn reconcile(
    db: &DatabaseConnection,
    batch: Vec<ScannedOffer>,
    ctx: &PricingContext,
    now: PrimitiveDateTime,
) -> Result<ReconcileReport, DbErr> {
    let mut report = ReconcileReport::default();

    // Last offer of a (node, runtime) pair within a batch wins.
    let mut scanned: HashMap<(String, String), Properties> = HashMap::new();

    for offer in batch {
        match offer.properties.runtime_name() {
            Some(runtime) if !runtime.is_empty() => {
                let key = (offer.node_id, runtime.to_owned());
                scanned.insert(key, offer.properties);
            }
            _ => {
                debug!(node_id = %offer.node_id, "skipping offer without runtime");
                report.skipped += 1;
            }
        }
    }

    let mut identities: HashMap<String, NodeIdentity> = HashMap::new();

    for ((node_id, _), properties) in &scanned {
        identities
            .entry(node_id.clone())
            .or_insert_with(|| NodeIdentity {
                wallet: None,
                network: node::Network::Unknown,
            })
            .merge(properties);
    }

    let ids: Vec<String> = identities.keys().cloned().collect();
    let mut nodes = nodes_by_id(db, &ids).await?;

    let new_nodes: Vec<node::ActiveModel> = identities
        .iter()
        .filter(|(node_id, _)| !nodes.contains_key(*node_id))
        .map(|(node_id, identity)| node::ActiveModel {
            node_id: ActiveValue::Set(node_id.clone()),
            wallet: ActiveValue::Set(identity.wallet.clone()),
            online: ActiveValue::Set(false),
            computing_now: ActiveValue::Set(false),
            version: ActiveValue::Set(None),
            network: ActiveValue::Set(identity.network),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            uptime_created_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .collect();

    if !new_nodes.is_empty() {
        report.created_nodes = new_nodes.len();

        for chunk in chunked(new_nodes) {
            node::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::column(node::Column::NodeId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }

        nodes = nodes_by_id(db, &ids).await?;
    }

    let changed_nodes: Vec<node::ActiveModel> = nodes
        .values()
        .filter_map(|node| {
            let identity = identities.get(&node.node_id)?;
            let wallet = identity.wallet.clone().or_else(|| node.wallet.clone());
            let network = match identity.network {
                node::Network::Unknown => node.network,
                network => network,
            };

            (wallet != node.wallet || network != node.network).then(|| node::ActiveModel {
                node_id: ActiveValue::Set(node.node_id.clone()),
                wallet: ActiveValue::Set(wallet),
                online: ActiveValue::Set(node.online),
                computing_now: ActiveValue::Set(node.computing_now),
                version: ActiveValue::Set(node.version.clone()),
                network: ActiveValue::Set(network),
                created_at: ActiveValue::Set(node.created_at),
                updated_at: ActiveValue::Set(now),
                uptime_created_at: ActiveValue::Set(node.uptime_created_at),
                ..Default::default()
            })
        })
        .collect();

    if !changed_nodes.is_empty() {
        report.updated_nodes = changed_nodes.len();

        for chunk in chunked(changed_nodes) {
            node::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::column(node::Column::NodeId)
                        .update_columns([
                            node::Column::Wallet,
                            node::Column::Network,
                            node::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
    }

    let node_pks: Vec<i64> = nodes.values().map(|node| node.id).collect();
    let stored = offers_by_key(db, &node_pks).await?;

    let mut created = Vec::new();
    let mut updated = Vec::new();

    for ((node_id, runtime), properties) in scanned {
        let Some(node) = nodes.get(&node_id) else {
            report.skipped += 1;
            continue;
        };

        match stored.get(&(node.id, runtime.clone())) {
            Some(existing) => {
                let previous = Derived::stored(existing);
                let derived = derive(&node_id, &properties, previous.clone(), ctx);

                if derived == previous && properties.same_as(&existing.properties) {
                    report.unchanged_offers += 1;
                    continue;
                }

                updated.push(offer_model(
                    node.id,
                    runtime,
                    properties.to_value(),
                    derived,
                    existing.created_at,
                    now,
                ));
            }
            None => {
                let derived = derive(&node_id, &properties, Derived::empty(), ctx);

                created.push(offer_model(
                    node.id,
                    runtime,
                    properties.to_value(),
                    derived,
                    now,
                    now,
                ));
            }
        }
    }

    report.created_offers = created.len();
    report.updated_offers = updated.len();

    for chunk in chunked(created) {
        offer::Entity::insert_many(chunk)
            .on_conflict(
                OnConflict::columns([offer::Column::NodeId, offer::Column::Runtime])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    for chunk in chunked(updated) {
        offer::Entity::insert_many(chunk)
            .on_conflict(
                OnConflict::columns([offer::Column::NodeId, offer::Column::Runtime])
                    .update_columns([
                        offer::Column::Properties,
                        offer::Column::MonthlyPriceGlm,
                        offer::Column::MonthlyPriceUsd,
                        offer::Column::HourlyPriceGlm,
                        offer::Column::HourlyPriceUsd,
                        offer::Column::IsOverpriced,
                        offer::Column::OverpricedComparedTo,
                        offer::Column::TimesMoreExpensive,
                        offer::Column::CheaperThan,
                        offer::Column::TimesCheaper,
                        offer::Column::SuggestEnvPerHourPrice,
                        offer::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    info!(
        created_nodes = report.created_nodes,
        updated_nodes = report.updated_nodes,
        created_offers = report.created_offers,
        updated_offers = report.updated_offers,
        unchanged_offers = report.unchanged_offers,
        skipped = report.skipped,
        "offers reconciled"
    );

    Ok(report)
}

fn chunked<T>(mut items: Vec<T>) -> Vec<Vec<T>> {
    let mut chunks = Vec::new();

    while items.len() > WRITE_CHUNK {
        let rest = items.split_off(WRITE_CHUNK);
        chunks.push(items);
        items = rest;
    }

    if !items.is_empty() {
        chunks.push(items);
    }

    chunks
}
