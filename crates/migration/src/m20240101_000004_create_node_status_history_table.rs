use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NodeStatusHistory::Table)
                    .col(
                        ColumnDef::new(NodeStatusHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NodeStatusHistory::NodeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NodeStatusHistory::IsOnline)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NodeStatusHistory::Timestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(NodeStatusHistory::Table, NodeStatusHistory::NodeId)
                            .to(crate::Nodes::Table, crate::Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("node_id_timestamp_node_status_history_idx")
                    .table(NodeStatusHistory::Table)
                    .col(NodeStatusHistory::NodeId)
                    .col(NodeStatusHistory::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NodeStatusHistory::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum NodeStatusHistory {
    Table,
    Id,
    NodeId,
    IsOnline,
    Timestamp,
}
