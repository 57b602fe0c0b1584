use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PricingSnapshots::Table)
                    .col(
                        ColumnDef::new(PricingSnapshots::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::Network)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PricingSnapshots::Date).date().not_null())
                    .col(
                        ColumnDef::new(PricingSnapshots::AverageCpuPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::MedianCpuPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::AverageEnvPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::MedianEnvPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::AverageStartPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::MedianStartPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSnapshots::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .index(
                        Index::create()
                            .name("network_date_pricing_snapshots_idx")
                            .col(PricingSnapshots::Network)
                            .col(PricingSnapshots::Date)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PricingSnapshots::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum PricingSnapshots {
    Table,
    Id,
    Network,
    Date,
    AverageCpuPrice,
    MedianCpuPrice,
    AverageEnvPrice,
    MedianEnvPrice,
    AverageStartPrice,
    MedianStartPrice,
    CreatedAt,
}
