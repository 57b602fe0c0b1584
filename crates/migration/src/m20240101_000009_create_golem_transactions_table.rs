use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GolemTransactions::Table)
                    .col(
                        ColumnDef::new(GolemTransactions::ScannerId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GolemTransactions::Txhash).string().not_null())
                    .col(ColumnDef::new(GolemTransactions::Amount).double().not_null())
                    .col(
                        ColumnDef::new(GolemTransactions::Timestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GolemTransactions::Sender).string().not_null())
                    .col(
                        ColumnDef::new(GolemTransactions::Receiver)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GolemTransactions::TransactionType).small_integer())
                    .col(
                        ColumnDef::new(GolemTransactions::TxFromGolem)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("timestamp_golem_transactions_idx")
                    .table(GolemTransactions::Table)
                    .col(GolemTransactions::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GolemTransactions::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum GolemTransactions {
    Table,
    ScannerId,
    Txhash,
    Amount,
    Timestamp,
    Sender,
    Receiver,
    TransactionType,
    TxFromGolem,
}
