use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PricingSamples::Table)
                    .col(
                        ColumnDef::new(PricingSamples::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PricingSamples::NodeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSamples::OfferId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PricingSamples::CpuPerHour).double())
                    .col(ColumnDef::new(PricingSamples::EnvPerHour).double())
                    .col(ColumnDef::new(PricingSamples::StartPrice).double())
                    .col(
                        ColumnDef::new(PricingSamples::Network)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricingSamples::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PricingSamples::Table, PricingSamples::NodeId)
                            .to(crate::Nodes::Table, crate::Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PricingSamples::Table, PricingSamples::OfferId)
                            .to(crate::Offers::Table, crate::Offers::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PricingSamples::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum PricingSamples {
    Table,
    Id,
    NodeId,
    OfferId,
    CpuPerHour,
    EnvPerHour,
    StartPrice,
    Network,
    CreatedAt,
}
