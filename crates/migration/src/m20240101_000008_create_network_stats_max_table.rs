use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NetworkStatsMax::Table)
                    .col(
                        ColumnDef::new(NetworkStatsMax::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NetworkStatsMax::Runtime).string().not_null())
                    .col(ColumnDef::new(NetworkStatsMax::Online).integer().not_null())
                    .col(ColumnDef::new(NetworkStatsMax::Cores).integer().not_null())
                    .col(ColumnDef::new(NetworkStatsMax::Memory).double().not_null())
                    .col(ColumnDef::new(NetworkStatsMax::Disk).double().not_null())
                    .col(ColumnDef::new(NetworkStatsMax::Gpus).integer().not_null())
                    .col(ColumnDef::new(NetworkStatsMax::Date).date().not_null())
                    .index(
                        Index::create()
                            .name("runtime_date_network_stats_max_idx")
                            .col(NetworkStatsMax::Runtime)
                            .col(NetworkStatsMax::Date)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NetworkStatsMax::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum NetworkStatsMax {
    Table,
    Id,
    Runtime,
    Online,
    Cores,
    Memory,
    Disk,
    Gpus,
    Date,
}
