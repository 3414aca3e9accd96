use sea_orm_migration::prelude::*;

use crate::database::entity::datafile::*;
use crate::database::entity::dataset;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000002_create_datafile_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Column::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Column::DatasetId).string_len(36).not_null())
                    .col(ColumnDef::new(Column::Name).string().not_null())
                    .col(ColumnDef::new(Column::Description).text().not_null())
                    .col(ColumnDef::new(Column::Owner).string().not_null())
                    .col(ColumnDef::new(Column::Status).text().not_null())
                    .col(
                        ColumnDef::new(Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKeyCreateStatement::new()
                            .name("fk_datafile_dataset")
                            .from_tbl(Entity)
                            .from_col(Column::DatasetId)
                            .to_tbl(dataset::Entity)
                            .to_col(dataset::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-datafile-dataset-name")
                    .table(Entity)
                    .col(Column::DatasetId)
                    .col(Column::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-datafile-dataset")
                    .table(Entity)
                    .col(Column::DatasetId)
                    .to_owned(),
            )
            .await
    }
}
