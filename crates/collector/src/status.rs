//! Node online status transitions.
//!
//! Observations may come from market scans, relay listings and relay
//! events. Only observations that flip a node's stored status produce a
//! history row, which keeps consecutive history entries of one node
//! alternating.

use std::collections::{HashMap, HashSet};

use db::{
    computing_total,
    node::{self, Network},
    node_status_history,
    sea_query::{Expr, OnConflict},
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    PrimitiveDateTime, QueryFilter, TransactionErrorExt, TransactionTrait,
};
use tracing::info;

/// Row count of a single bulk statement.
const WRITE_CHUNK: usize = 200;

/// Observed online status of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub node_id: String,
    pub online: bool,
}

impl Observation {
    pub fn online(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            online: true,
        }
    }

    pub fn offline(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            online: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    /// Previously unknown nodes.
    pub created: usize,

    /// Known nodes with a changed status.
    pub flipped: usize,
}

/// Apply a batch of observations.
///
/// The last observation of a node within the batch wins. Unknown nodes are
/// created with the observed status. Nodes going offline always stop computing.
/// Lookups and writes are issued per [`WRITE_CHUNK`] nodes within a single
/// transaction.
pub async fn apply_transitions(
    db: &DatabaseConnection,
    observations: &[Observation],
    now: PrimitiveDateTime,
) -> Result<TransitionReport, DbErr> {
    let observed: HashMap<String, bool> = observations
        .iter()
        .map(|observation| (observation.node_id.clone(), observation.online))
        .collect();

    if observed.is_empty() {
        return Ok(TransitionReport::default());
    }

    let report = db
        .transaction::<_, _, DbErr>(|txn| {
            Box::pin(async move {
                let node_ids: Vec<String> = observed.keys().cloned().collect();

                let mut existing = Vec::with_capacity(node_ids.len());

                for chunk in node_ids.chunks(WRITE_CHUNK) {
                    existing.extend(
                        node::Entity::find()
                            .filter(node::Column::NodeId.is_in(chunk.iter().cloned()))
                            .all(txn)
                            .await?,
                    );
                }

                let known: HashSet<&str> =
                    existing.iter().map(|node| node.node_id.as_str()).collect();

                let unknown: Vec<(&String, bool)> = observed
                    .iter()
                    .filter(|(node_id, _)| !known.contains(node_id.as_str()))
                    .map(|(node_id, online)| (node_id, *online))
                    .collect();

                for chunk in unknown.chunks(WRITE_CHUNK) {
                    let created = chunk.iter().map(|(node_id, online)| node::ActiveModel {
                        node_id: ActiveValue::Set((*node_id).clone()),
                        wallet: ActiveValue::Set(None),
                        online: ActiveValue::Set(*online),
                        computing_now: ActiveValue::Set(false),
                        version: ActiveValue::Set(None),
                        network: ActiveValue::Set(Network::Unknown),
                        created_at: ActiveValue::Set(now),
                        updated_at: ActiveValue::Set(now),
                        uptime_created_at: ActiveValue::Set(now),
                        ..Default::default()
                    });

                    node::Entity::insert_many(created)
                        .on_conflict(
                            OnConflict::column(node::Column::NodeId)
                                .do_nothing()
                                .to_owned(),
                        )
                        .exec_without_returning(txn)
                        .await?;
                }

                let flipped: Vec<(i64, bool)> = existing
                    .iter()
                    .filter_map(|node| {
                        let online = *observed.get(&node.node_id)?;
                        (node.online != online).then_some((node.id, online))
                    })
                    .collect();

                for online in [true, false] {
                    let ids: Vec<i64> = flipped
                        .iter()
                        .filter(|(_, status)| *status == online)
                        .map(|(id, _)| *id)
                        .collect();

                    for chunk in ids.chunks(WRITE_CHUNK) {
                        let mut update = node::Entity::update_many()
                            .col_expr(node::Column::Online, Expr::value(online))
                            .col_expr(node::Column::UpdatedAt, Expr::value(now));

                        if !online {
                            update =
                                update.col_expr(node::Column::ComputingNow, Expr::value(false));
                        }

                        update
                            .filter(node::Column::Id.is_in(chunk.iter().copied()))
                            .exec(txn)
                            .await?;
                    }
                }

                let mut created_nodes = Vec::with_capacity(unknown.len());

                for chunk in unknown.chunks(WRITE_CHUNK) {
                    created_nodes.extend(
                        node::Entity::find()
                            .filter(
                                node::Column::NodeId
                                    .is_in(chunk.iter().map(|(node_id, _)| (*node_id).clone())),
                            )
                            .filter(node::Column::CreatedAt.eq(now))
                            .all(txn)
                            .await?,
                    );
                }

                let history: Vec<_> = flipped
                    .iter()
                    .copied()
                    .chain(created_nodes.iter().map(|node| (node.id, node.online)))
                    .map(|(id, online)| node_status_history::ActiveModel {
                        node_id: ActiveValue::Set(id),
                        is_online: ActiveValue::Set(online),
                        timestamp: ActiveValue::Set(now),
                        ..Default::default()
                    })
                    .collect();

                for chunk in history.chunks(WRITE_CHUNK) {
                    node_status_history::Entity::insert_many(chunk.to_vec())
                        .exec_without_returning(txn)
                        .await?;
                }

                Ok(TransitionReport {
                    created: created_nodes.len(),
                    flipped: flipped.len(),
                })
            })
        })
        .await
        .into_raw_result()?;

    if report != TransitionReport::default() {
        info!(
            created = report.created,
            flipped = report.flipped,
            "node status transitions applied"
        );
    }

    Ok(report)
}

/// Set computing flags from the list of providers running an activity.
///
/// Only online nodes are marked as computing, every other node is reset.
pub async fn set_computing(db: &DatabaseConnection, computing: Vec<String>) -> Result<(), DbErr> {
    db.transaction::<_, _, DbErr>(|txn| {
        Box::pin(async move {
            node::Entity::update_many()
                .col_expr(node::Column::ComputingNow, Expr::value(true))
                .filter(node::Column::NodeId.is_in(computing.iter().cloned()))
                .filter(node::Column::Online.eq(true))
                .exec(txn)
                .await?;

            node::Entity::update_many()
                .col_expr(node::Column::ComputingNow, Expr::value(false))
                .filter(
                    node::Column::NodeId
                        .is_not_in(computing)
                        .or(node::Column::Online.eq(false)),
                )
                .exec(txn)
                .await?;

            Ok(())
        })
    })
    .await
    .into_raw_result()
}

/// Raise the computing provider total of the current day to the count of
/// nodes computing right now.
///
/// Returns the current count.
pub async fn record_computing_total(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<i32, DbErr> {
    db.transaction::<_, _, DbErr>(|txn| {
        Box::pin(async move {
            let computing = node::Entity::find()
                .filter(node::Column::ComputingNow.eq(true))
                .count(txn)
                .await?;
            let computing = i32::try_from(computing).unwrap_or(i32::MAX);

            let today = computing_total::Entity::find()
                .filter(computing_total::Column::Date.eq(now.date()))
                .one(txn)
                .await?;

            match today {
                Some(today) if today.total >= computing => {}
                Some(today) => {
                    computing_total::Entity::update_many()
                        .col_expr(computing_total::Column::Total, Expr::value(computing))
                        .filter(computing_total::Column::Id.eq(today.id))
                        .exec(txn)
                        .await?;
                }
                None => {
                    computing_total::Entity::insert(computing_total::ActiveModel {
                        total: ActiveValue::Set(computing),
                        date: ActiveValue::Set(now.date()),
                        ..Default::default()
                    })
                    .exec_without_returning(txn)
                    .await?;
                }
            }

            Ok(computing)
        })
    })
    .await
    .into_raw_result()
}
