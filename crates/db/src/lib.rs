pub mod computing_total;
pub mod exchange_rate;
pub mod golem_transaction;
pub mod network_stats;
pub mod network_stats_max;
pub mod node;
pub mod node_status_history;
pub mod offer;
pub mod pricing_sample;
pub mod pricing_snapshot;
pub mod reference_instance;
pub mod relay_node;
pub mod requestor;
pub mod scraper_cursor;
pub mod snapshot;

use std::error::Error;

use async_trait::async_trait;
pub use sea_orm::{
    sea_query, ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, Database,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait, RelationTrait, StatementBuilder,
    TransactionError, TransactionTrait, TryGetableMany,
};
pub use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

/// Current UTC time, in the representation used by all timestamp columns.
pub fn utc_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Convert a unix timestamp into a timestamp column value.
pub fn from_unix(seconds: i64) -> Option<PrimitiveDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .map(|ts| PrimitiveDateTime::new(ts.date(), ts.time()))
}

pub trait TransactionErrorExt<T, E> {
    /// Convert transaction [`Result`] into a [`Result`] with
    /// a custom error.
    fn into_raw_result(self) -> Result<T, E>;
}

impl<T, E> TransactionErrorExt<T, E> for Result<T, TransactionError<E>>
where
    E: Error + From<DbErr>,
{
    fn into_raw_result(self) -> Result<T, E> {
        match self {
            Ok(val) => Ok(val),
            Err(TransactionError::Connection(err)) => Err(err.into()),
            Err(TransactionError::Transaction(err)) => Err(err),
        }
    }
}

#[async_trait]
pub trait SelectExt {
    /// Check if at least one record that satisfies a query.
    async fn exists<C: ConnectionTrait + Send>(self, db: &C) -> Result<bool, DbErr>;
}

#[async_trait]
impl<T> SelectExt for T
where
    T: QueryTrait<QueryStatement = sea_query::SelectStatement> + Send,
{
    async fn exists<C: ConnectionTrait + Send>(self, db: &C) -> Result<bool, DbErr> {
        use sea_query::{Expr, Query};

        let mut query = self.into_query();

        // SQLite requires at least one selected expression inside of EXISTS.
        query.expr(1);

        let stmt = StatementBuilder::build(
            Query::select().expr(Expr::exists(query)),
            &db.get_database_backend(),
        );

        db.query_one(stmt)
            .await?
            .ok_or_else(|| DbErr::Custom(String::from("exists query returned no rows")))?
            .try_get_by_index(0)
    }
}
