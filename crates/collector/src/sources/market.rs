//! Requestor daemon market API.
//!
//! A scan subscribes a demand matching every offer of a subnet and then
//! collects proposal events until the wall-clock limit elapses. Reaching the
//! limit is the normal end of a scan, everything collected until then is kept.

use std::time::Duration;

use db::OffsetDateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::{http, HttpError, NotConfigured};

/// Long-poll timeout of a single event request, in seconds.
const POLL_TIMEOUT: f64 = 5.0;

const MAX_EVENTS: u32 = 100;

const PROPOSAL_EVENT: &str = "ProposalEvent";

/// Offer observed on the market.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOffer {
    pub issuer_id: String,
    pub properties: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketEvent {
    event_type: String,
    proposal: Option<Proposal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Proposal {
    issuer_id: String,
    properties: Value,
}

fn offers(events: Vec<MarketEvent>) -> impl Iterator<Item = MarketOffer> {
    events
        .into_iter()
        .filter(|event| event.event_type == PROPOSAL_EVENT)
        .filter_map(|event| event.proposal)
        .map(|proposal| MarketOffer {
            issuer_id: proposal.issuer_id,
            properties: proposal.properties,
        })
}

/// Requestor daemon market client.
pub struct MarketClient {
    client: reqwest::Client,
    url: String,
    key: String,
}

impl MarketClient {
    pub fn new(
        client: reqwest::Client,
        config: &common::config::Market,
    ) -> Result<Self, NotConfigured> {
        let key = config
            .key
            .clone()
            .ok_or_else(|| NotConfigured::new("market"))?;

        Ok(Self {
            client,
            url: format!("{}/market-api/v1", config.url.trim_end_matches('/')),
            key,
        })
    }

    async fn subscribe(&self, subnet: &str, lifetime: Duration) -> Result<String, HttpError> {
        let expiration =
            (OffsetDateTime::now_utc() + lifetime).unix_timestamp_nanos() / 1_000_000;

        let demand = json!({
            "properties": {
                "golem.node.id.name": "market scanner",
                "golem.node.debug.subnet": subnet,
                "golem.srv.comp.expiration": expiration as i64,
            },
            "constraints": format!("(golem.node.debug.subnet={subnet})"),
        });

        http::json(
            self.client
                .post(format!("{}/demands", self.url))
                .bearer_auth(&self.key)
                .json(&demand),
        )
        .await
    }

    async fn poll(&self, subscription: &str) -> Result<Vec<MarketEvent>, HttpError> {
        http::json(
            self.client
                .get(format!("{}/demands/{subscription}/events", self.url))
                .bearer_auth(&self.key)
                .query(&[
                    ("timeout", POLL_TIMEOUT.to_string()),
                    ("maxEvents", MAX_EVENTS.to_string()),
                ]),
        )
        .await
    }

    async fn unsubscribe(&self, subscription: &str) {
        let response = self
            .client
            .delete(format!("{}/demands/{subscription}", self.url))
            .bearer_auth(&self.key)
            .send()
            .await
            .map_err(HttpError::from)
            .and_then(http::check);

        if let Err(error) = response {
            warn!(%subscription, %error, "unable to unsubscribe demand");
        }
    }

    /// Collect offers of the provided subnet for at most `limit`.
    ///
    /// Event polling failures end the scan early, keeping collected offers.
    pub async fn scan(&self, subnet: &str, limit: Duration) -> Result<Vec<MarketOffer>, HttpError> {
        let subscription = self.subscribe(subnet, limit).await?;
        info!(%subnet, %subscription, "demand subscribed, collecting offers");

        let deadline = Instant::now() + limit;
        let mut collected = Vec::new();

        loop {
            match timeout_at(deadline, self.poll(&subscription)).await {
                Ok(Ok(events)) => {
                    let before = collected.len();
                    collected.extend(offers(events));
                    debug!(received = collected.len() - before, "received market events");
                }
                Ok(Err(error)) => {
                    warn!(%subnet, %error, "market polling failed, ending scan early");
                    break;
                }
                Err(_) => break,
            }
        }

        self.unsubscribe(&subscription).await;

        info!(%subnet, offers = collected.len(), "market scan finished");

        Ok(collected)
    }
}
