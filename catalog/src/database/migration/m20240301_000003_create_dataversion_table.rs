use sea_orm_migration::prelude::*;

use crate::database::entity::datafile;
use crate::database::entity::dataversion::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000003_create_dataversion_table"
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
                    .col(ColumnDef::new(Column::DatafileId).string_len(36).not_null())
                    .col(ColumnDef::new(Column::VersionOrdinal).integer().not_null())
                    .col(ColumnDef::new(Column::HashValue).string().not_null())
                    .col(ColumnDef::new(Column::HashAlgorithm).string().not_null())
                    .col(ColumnDef::new(Column::StorageAddress).text().not_null())
                    .col(ColumnDef::new(Column::StorageKind).text().not_null())
                    .col(ColumnDef::new(Column::Status).text().not_null())
                    .col(ColumnDef::new(Column::SourceVersionId).string_len(36))
                    .col(ColumnDef::new(Column::Transformer).text().not_null())
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
                    .col(ColumnDef::new(Column::Metadata).text().not_null())
                    .foreign_key(
                        ForeignKeyCreateStatement::new()
                            .name("fk_dataversion_datafile")
                            .from_tbl(Entity)
                            .from_col(Column::DatafileId)
                            .to_tbl(datafile::Entity)
                            .to_col(datafile::Column::Id),
                    )
                    .foreign_key(
                        ForeignKeyCreateStatement::new()
                            .name("fk_dataversion_source")
                            .from_tbl(Entity)
                            .from_col(Column::SourceVersionId)
                            .to_tbl(Entity)
                            .to_col(Column::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-dataversion-datafile-ordinal")
                    .table(Entity)
                    .col(Column::DatafileId)
                    .col(Column::VersionOrdinal)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-dataversion-datafile")
                    .table(Entity)
                    .col(Column::DatafileId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-dataversion-source")
                    .table(Entity)
                    .col(Column::SourceVersionId)
                    .to_owned(),
            )
            .await
    }
}
