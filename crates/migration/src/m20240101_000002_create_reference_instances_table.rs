use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReferenceInstances::Table)
                    .col(
                        ColumnDef::new(ReferenceInstances::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReferenceInstances::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ReferenceInstances::Vcpu)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferenceInstances::Memory)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferenceInstances::PriceUsd)
                            .double()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReferenceInstances::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum ReferenceInstances {
    Table,
    Id,
    Name,
    Vcpu,
    Memory,
    PriceUsd,
}
