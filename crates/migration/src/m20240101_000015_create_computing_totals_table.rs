use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ComputingTotals::Table)
                    .col(
                        ColumnDef::new(ComputingTotals::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ComputingTotals::Total).integer().not_null())
                    .col(ColumnDef::new(ComputingTotals::Date).date().not_null())
                    .index(
                        Index::create()
                            .name("date_computing_totals_idx")
                            .col(ComputingTotals::Date)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ComputingTotals::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum ComputingTotals {
    Table,
    Id,
    Total,
    Date,
}
