use std::{collections::HashSet, time::Duration};

use common::config::Config;
use db::{
    node, relay_node, sea_query::OnConflict, ActiveValue, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, PrimitiveDateTime, QueryFilter, QuerySelect,
};
use derive_more::{Display, Error, From};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    retry::RetryPolicy,
    sources::{
        self,
        relay::{RelayClient, RelayEvent, RelayEventKind, RelayNode},
        HttpError,
    },
    status::{apply_transitions, Observation, TransitionReport},
};

const EVENT_BUFFER: usize = 1024;

const WRITE_CHUNK: usize = 200;

#[derive(Debug, Display, Error, From)]
pub enum RelayMonitorError {
    DatabaseError(DbErr),

    #[display(fmt = "relay request failed: {}", _0)]
    Upstream(HttpError),
}

impl From<RelayEvent> for Observation {
    fn from(event: RelayEvent) -> Self {
        match event.kind {
            RelayEventKind::NewNode => Observation::online(event.node_id),
            RelayEventKind::LostNode => Observation::offline(event.node_id),
        }
    }
}

/// Apply the relay listing, then follow relay events forever.
pub async fn relay_monitor(
    database: &DatabaseConnection,
    config: &Config,
) -> Result<(), RelayMonitorError> {
    let retry = RetryPolicy::from(&config.retry);
    let client = RelayClient::new(sources::client()?, &config.relay);

    let mut listed = Vec::new();
    let mut complete = true;

    for prefix in 0..=u8::MAX {
        match retry.run("relay listing", || client.nodes(prefix)).await {
            Ok(nodes) => listed.extend(nodes),
            Err(error) => {
                warn!(prefix, %error, "unable to list relay nodes");
                complete = false;
            }
        }
    }

    let report = apply_listing(database, &listed, complete, db::utc_now()).await?;
    info!(listed = listed.len(), ?report, "relay listing applied");

    let (sender, mut receiver) = mpsc::channel(EVENT_BUFFER);
    let streaming = sources::streaming_client()?;
    let reconnect = Duration::from_secs(config.relay.reconnect);

    for url in config.relay.events.iter().cloned() {
        let client = RelayClient::new(streaming.clone(), &config.relay);
        let sender = sender.clone();

        tokio::spawn(async move {
            loop {
                info!(%url, "listening for relay events");

                match client.listen(&url, &sender).await {
                    Ok(()) => info!(%url, "relay event stream closed"),
                    Err(error) => warn!(%url, %error, "relay event stream failed"),
                }

                if sender.is_closed() {
                    break;
                }

                tokio::time::sleep(reconnect).await;
            }
        });
    }

    drop(sender);

    while let Some(event) = receiver.recv().await {
        let mut batch = vec![Observation::from(event)];

        while let Ok(event) = receiver.try_recv() {
            batch.push(event.into());
        }

        if let Err(error) = apply_transitions(database, &batch, db::utc_now()).await {
            error!(%error, events = batch.len(), "unable to apply relay events");
        }
    }

    Ok(())
}

/// Store relay addresses and node statuses of a relay listing.
///
/// Online nodes that are absent from a complete listing are marked offline.
/// After a partial listing, nodes that were not listed keep their status.
async fn apply_listing(
    database: &DatabaseConnection,
    listed: &[RelayNode],
    complete: bool,
    now: PrimitiveDateTime,
) -> Result<TransitionReport, DbErr> {
    let addresses: Vec<_> = listed
        .iter()
        .filter_map(|node| {
            let (ip, port) = node.address.clone()?;

            Some(relay_node::ActiveModel {
                node_id: ActiveValue::Set(node.node_id.clone()),
                ip_address: ActiveValue::Set(ip),
                port: ActiveValue::Set(port),
            })
        })
        .collect();

    for chunk in addresses.chunks(WRITE_CHUNK) {
        relay_node::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::column(relay_node::Column::NodeId)
                    .update_columns([relay_node::Column::IpAddress, relay_node::Column::Port])
                    .to_owned(),
            )
            .exec_without_returning(database)
            .await?;
    }

    let mut observations: Vec<_> = listed
        .iter()
        .map(|node| Observation {
            node_id: node.node_id.clone(),
            online: node.online,
        })
        .collect();

    if complete {
        let seen: HashSet<&str> = listed.iter().map(|node| node.node_id.as_str()).collect();

        let absent = node::Entity::find()
            .select_only()
            .column(node::Column::NodeId)
            .filter(node::Column::Online.eq(true))
            .into_tuple::<String>()
            .all(database)
            .await?
            .into_iter()
            .filter(|node_id| !seen.contains(node_id.as_str()))
            .map(Observation::offline);

        observations.extend(absent);
    } else {
        warn!("relay listing is incomplete, absent nodes are left unchanged");
    }

    apply_transitions(database, &observations, now).await
}

#[cfg(test)]
mod tests {
    use db::{node, relay_node, ColumnTrait, Duration, EntityTrait, QueryFilter};

    use super::apply_listing;
    use crate::{
        sources::relay::RelayNode,
        status::{apply_transitions, Observation},
        testing::{create_database, datetime},
    };

    fn listed(node_id: &str, online: bool, address: Option<(&str, i32)>) -> RelayNode {
        RelayNode {
            node_id: node_id.to_owned(),
            online,
            address: address.map(|(ip, port)| (ip.to_owned(), port)),
        }
    }

    async fn online(db: &db::DatabaseConnection, node_id: &str) -> bool {
        node::Entity::find()
            .filter(node::Column::NodeId.eq(node_id))
            .one(db)
            .await
            .expect("unable to query node")
            .expect("node must exist")
            .online
    }

    #[tokio::test]
    async fn complete_listing_marks_absent_offline() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        apply_transitions(&db, &[Observation::online("0xgone")], now)
            .await
            .expect("unable to apply");

        let nodes = [
            listed("0xa", true, Some(("10.0.0.1", 11500))),
            listed("0xb", false, None),
        ];

        apply_listing(&db, &nodes, true, now + Duration::minutes(1))
            .await
            .expect("unable to apply listing");

        assert!(online(&db, "0xa").await);
        assert!(!online(&db, "0xb").await);
        assert!(!online(&db, "0xgone").await);

        let addresses = relay_node::Entity::find()
            .all(&db)
            .await
            .expect("unable to query relay nodes");

        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].node_id, "0xa");
        assert_eq!(addresses[0].ip_address, "10.0.0.1");
        assert_eq!(addresses[0].port, 11500);
    }

    #[tokio::test]
    async fn incomplete_listing_keeps_absent_nodes() {
        let db = create_database().await;
        let now = datetime(2024, 1, 1, 0);

        apply_transitions(&db, &[Observation::online("0xkept")], now)
            .await
            .expect("unable to apply");

        apply_listing(
            &db,
            &[listed("0xa", true, Some(("10.0.0.1", 11500)))],
            false,
            now,
        )
        .await
        .expect("unable to apply listing");

        apply_listing(
            &db,
            &[listed("0xa", true, Some(("10.0.0.2", 11501)))],
            false,
            now,
        )
        .await
        .expect("unable to apply listing");

        assert!(online(&db, "0xkept").await);

        let address = relay_node::Entity::find_by_id(String::from("0xa"))
            .one(&db)
            .await
            .expect("unable to query relay node")
            .expect("relay node must exist");

        assert_eq!(address.ip_address, "10.0.0.2");
        assert_eq!(address.port, 11501);
    }
}
