use db::{DatabaseConnection, DbErr};

use crate::{aggregate, snapshot::SnapshotStore};

/// Sample resources of online offers and publish network totals.
pub async fn network_stats(database: &DatabaseConnection) -> Result<(), DbErr> {
    let by_runtime = aggregate::sample_network_stats(database, db::utc_now()).await?;
    database.put("online_stats_by_runtime", by_runtime).await?;

    let online = aggregate::network_online_stats(database).await?;
    database.put("v2_network_online_stats", online).await?;

    Ok(())
}

/// Fill missing daily maxima for the provided count of full days before today.
pub async fn max_stats(database: &DatabaseConnection, days: i64) -> Result<(), DbErr> {
    aggregate::materialize_daily_max(database, db::utc_now().date(), days).await?;

    Ok(())
}
