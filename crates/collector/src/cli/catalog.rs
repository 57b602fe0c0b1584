use common::config::Config;
use db::{
    reference_instance, sea_query::OnConflict, ActiveValue, DatabaseConnection, DbErr,
    EntityTrait,
};
use derive_more::{Display, Error, From};
use tracing::{info, warn};

use crate::{
    retry::RetryPolicy,
    snapshot::integration_status,
    sources::{
        self,
        catalog::{CatalogClient, CatalogInstance},
        HttpError,
    },
};

const WRITE_CHUNK: usize = 200;

#[derive(Debug, Display, Error, From)]
pub enum CatalogError {
    DatabaseError(DbErr),

    #[display(fmt = "catalog request failed: {}", _0)]
    Upstream(HttpError),
}

/// Synchronize reference instances with the pricing catalog.
pub async fn catalog(database: &DatabaseConnection, config: &Config) -> Result<(), CatalogError> {
    let retry = RetryPolicy::from(&config.retry);

    let catalog = match CatalogClient::new(sources::client()?, &config.catalog, retry) {
        Ok(catalog) => catalog,
        Err(error) => {
            warn!(%error, "skipping catalog synchronization");
            integration_status(database, error.integration, false).await?;
            return Ok(());
        }
    };

    let instances = catalog.instances().await?;

    let stored = store_instances(database, &instances).await?;
    integration_status(database, "catalog", true).await?;

    info!(instances = stored, "reference instances synchronized");

    Ok(())
}

/// Upsert instances by name.
async fn store_instances(
    database: &DatabaseConnection,
    instances: &[CatalogInstance],
) -> Result<usize, DbErr> {
    let models: Vec<_> = instances
        .iter()
        .map(|instance| reference_instance::ActiveModel {
            name: ActiveValue::Set(instance.name.clone()),
            vcpu: ActiveValue::Set(instance.vcpu),
            memory: ActiveValue::Set(instance.memory),
            price_usd: ActiveValue::Set(instance.price_usd),
            ..Default::default()
        })
        .collect();

    for chunk in models.chunks(WRITE_CHUNK) {
        reference_instance::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::column(reference_instance::Column::Name)
                    .update_columns([
                        reference_instance::Column::Vcpu,
                        reference_instance::Column::Memory,
                        reference_instance::Column::PriceUsd,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(database)
            .await?;
    }

    Ok(models.len())
}
