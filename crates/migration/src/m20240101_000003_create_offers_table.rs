use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .col(
                        ColumnDef::new(Offers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Offers::NodeId).big_integer().not_null())
                    .col(ColumnDef::new(Offers::Runtime).string().not_null())
                    .col(ColumnDef::new(Offers::Properties).json().not_null())
                    .col(ColumnDef::new(Offers::MonthlyPriceGlm).double())
                    .col(ColumnDef::new(Offers::MonthlyPriceUsd).double())
                    .col(ColumnDef::new(Offers::HourlyPriceGlm).double())
                    .col(ColumnDef::new(Offers::HourlyPriceUsd).double())
                    .col(
                        ColumnDef::new(Offers::IsOverpriced)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Offers::OverpricedComparedTo).big_integer())
                    .col(ColumnDef::new(Offers::TimesMoreExpensive).double())
                    .col(ColumnDef::new(Offers::CheaperThan).big_integer())
                    .col(ColumnDef::new(Offers::TimesCheaper).double())
                    .col(ColumnDef::new(Offers::SuggestEnvPerHourPrice).double())
                    .col(
                        ColumnDef::new(Offers::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(
                        ColumnDef::new(Offers::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Offers::Table, Offers::NodeId)
                            .to(crate::Nodes::Table, crate::Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Offers::Table, Offers::OverpricedComparedTo)
                            .to(crate::ReferenceInstances::Table, crate::ReferenceInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Offers::Table, Offers::CheaperThan)
                            .to(crate::ReferenceInstances::Table, crate::ReferenceInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("node_id_runtime_offers_idx")
                            .col(Offers::NodeId)
                            .col(Offers::Runtime)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Offers {
    Table,
    Id,
    NodeId,
    Runtime,
    Properties,
    MonthlyPriceGlm,
    MonthlyPriceUsd,
    HourlyPriceGlm,
    HourlyPriceUsd,
    IsOverpriced,
    OverpricedComparedTo,
    TimesMoreExpensive,
    CheaperThan,
    TimesCheaper,
    SuggestEnvPerHourPrice,
    CreatedAt,
    UpdatedAt,
}
