use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NetworkStats::Table)
                    .col(
                        ColumnDef::new(NetworkStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NetworkStats::Runtime).string().not_null())
                    .col(ColumnDef::new(NetworkStats::Online).integer().not_null())
                    .col(ColumnDef::new(NetworkStats::Cores).integer().not_null())
                    .col(ColumnDef::new(NetworkStats::Threads).integer().not_null())
                    .col(ColumnDef::new(NetworkStats::Memory).double().not_null())
                    .col(ColumnDef::new(NetworkStats::Disk).double().not_null())
                    .col(ColumnDef::new(NetworkStats::Gpus).integer().not_null())
                    .col(ColumnDef::new(NetworkStats::CudaCores).integer().not_null())
                    .col(ColumnDef::new(NetworkStats::GpuMemory).double().not_null())
                    .col(ColumnDef::new(NetworkStats::GpuModels).json().not_null())
                    .col(
                        ColumnDef::new(NetworkStats::Date)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("runtime_date_network_stats_idx")
                    .table(NetworkStats::Table)
                    .col(NetworkStats::Runtime)
                    .col(NetworkStats::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NetworkStats::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum NetworkStats {
    Table,
    Id,
    Runtime,
    Online,
    Cores,
    Threads,
    Memory,
    Disk,
    Gpus,
    CudaCores,
    GpuMemory,
    GpuModels,
    Date,
}
