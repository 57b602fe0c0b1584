//! Published aggregate store.

use async_trait::async_trait;
use db::{
    sea_query::OnConflict, snapshot, ActiveValue, DatabaseConnection, DbErr, EntityTrait,
};
use serde_json::{json, Value};
use tracing::debug;

/// Key-value store that serves published aggregates to read endpoints.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, key: &str, value: Value) -> Result<(), DbErr>;

    async fn get(&self, key: &str) -> Result<Option<Value>, DbErr>;
}

#[async_trait]
impl SnapshotStore for DatabaseConnection {
    async fn put(&self, key: &str, value: Value) -> Result<(), DbErr> {
        snapshot::Entity::insert(snapshot::ActiveModel {
            key: ActiveValue::Set(key.to_owned()),
            value: ActiveValue::Set(value),
            updated_at: ActiveValue::Set(db::utc_now()),
        })
        .on_conflict(
            OnConflict::column(snapshot::Column::Key)
                .update_columns([snapshot::Column::Value, snapshot::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(self)
        .await?;

        debug!(%key, "snapshot published");

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, DbErr> {
        Ok(snapshot::Entity::find_by_id(key.to_owned())
            .one(self)
            .await?
            .map(|model| model.value))
    }
}

/// Key of an integration availability snapshot.
pub fn integration_key(integration: &str) -> String {
    format!("integrations:{integration}")
}

/// Publish whether an optional integration is configured.
pub async fn integration_status<S: SnapshotStore + ?Sized>(
    store: &S,
    integration: &str,
    configured: bool,
) -> Result<(), DbErr> {
    store
        .put(
            &integration_key(integration),
            json!({ "configured": configured }),
        )
        .await
}
