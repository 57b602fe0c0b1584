use std::collections::HashSet;

use db::{
    requestor, sea_query::OnConflict, ActiveValue, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QuerySelect,
};
use tracing::info;

/// Outcome of a requestor registration.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Registration {
    pub created: usize,

    /// Already known identifiers, including duplicates within the input.
    pub existing: usize,

    /// Count of non-empty identifiers received.
    pub received: usize,
}

/// Register requestor node identifiers as known network participants.
pub async fn register_requestors(
    database: &DatabaseConnection,
    node_ids: Vec<String>,
) -> Result<(), DbErr> {
    let registration = register(database, node_ids).await?;

    info!(
        created = registration.created,
        existing = registration.existing,
        received = registration.received,
        "requestors registered"
    );

    Ok(())
}

async fn register(
    database: &DatabaseConnection,
    node_ids: Vec<String>,
) -> Result<Registration, DbErr> {
    let cleaned: Vec<String> = node_ids
        .iter()
        .map(|node_id| node_id.trim().to_lowercase())
        .filter(|node_id| !node_id.is_empty())
        .collect();

    let unique: HashSet<String> = cleaned.iter().cloned().collect();

    if unique.is_empty() {
        return Ok(Registration::default());
    }

    let known: HashSet<String> = requestor::Entity::find()
        .select_only()
        .column(requestor::Column::NodeId)
        .filter(requestor::Column::NodeId.is_in(unique.iter().cloned()))
        .into_tuple::<String>()
        .all(database)
        .await?
        .into_iter()
        .collect();

    let created: Vec<_> = unique
        .difference(&known)
        .map(|node_id| requestor::ActiveModel {
            node_id: ActiveValue::Set(node_id.clone()),
        })
        .collect();

    let registration = Registration {
        created: created.len(),
        existing: cleaned.len() - created.len(),
        received: cleaned.len(),
    };

    if !created.is_empty() {
        requestor::Entity::insert_many(created)
            .on_conflict(
                OnConflict::column(requestor::Column::NodeId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(database)
            .await?;
    }

    Ok(registration)
}
