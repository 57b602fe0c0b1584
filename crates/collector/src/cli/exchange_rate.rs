use common::config::Config;
use db::{
    exchange_rate, sea_query::OnConflict, ActiveValue, DatabaseConnection, DbErr, EntityTrait,
    PrimitiveDateTime,
};
use derive_more::{Display, Error, From};
use tracing::info;

use crate::{
    retry::RetryPolicy,
    sources::{self, exchange::ExchangeClient, HttpError},
};

#[derive(Debug, Display, Error, From)]
pub enum ExchangeRateError {
    DatabaseError(DbErr),

    #[display(fmt = "exchange rate request failed: {}", _0)]
    Upstream(HttpError),
}

/// Fetch the current GLM price and store it.
pub async fn exchange_rate(
    database: &DatabaseConnection,
    config: &Config,
) -> Result<(), ExchangeRateError> {
    let exchange = ExchangeClient::new(sources::client()?, &config.exchange);

    let price = RetryPolicy::from(&config.retry)
        .run("exchange rate", || exchange.glm_usd())
        .await?;

    store_rate(database, price, db::utc_now()).await?;

    info!(price, "exchange rate updated");

    Ok(())
}

async fn store_rate(
    database: &DatabaseConnection,
    price: f64,
    now: PrimitiveDateTime,
) -> Result<(), DbErr> {
    exchange_rate::Entity::insert(exchange_rate::ActiveModel {
        id: ActiveValue::Set(exchange_rate::GLM_RATE_ID),
        current_price: ActiveValue::Set(price),
        updated_at: ActiveValue::Set(now),
    })
    .on_conflict(
        OnConflict::column(exchange_rate::Column::Id)
            .update_columns([
                exchange_rate::Column::CurrentPrice,
                exchange_rate::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec_without_returning(database)
    .await?;

    Ok(())
}
