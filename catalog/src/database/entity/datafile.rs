//! A named logical file within a data set.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use super::EntityStatus;

pub type DataFileModel = Model;

/// A named logical file within a data set.
///
/// The content of a data file lives in its versions. Names are unique
/// within the data set, deleted files included.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "datafile")]
pub struct Model {
    /// Unique ID of the data file (UUID v4).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// ID of the data set containing the file.
    #[sea_orm(indexed)]
    pub dataset_id: String,

    /// Name of the file, unique within the data set.
    pub name: String,

    pub description: String,

    /// Owner of the data file.
    pub owner: String,

    /// Lifecycle status.
    pub status: EntityStatus,

    /// Timestamp when the data file was created.
    pub created_at: ChronoDateTimeUtc,

    /// Timestamp when the data file was last modified.
    ///
    /// Adding a version also bumps this.
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dataset::Entity",
        from = "Column::DatasetId",
        to = "super::dataset::Column::Id"
    )]
    DataSet,

    #[sea_orm(has_many = "super::dataversion::Entity")]
    DataVersion,
}

impl Model {
    /// Returns an active model with every column set.
    pub fn to_active_model(&self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id.clone()),
            dataset_id: Set(self.dataset_id.clone()),
            name: Set(self.name.clone()),
            description: Set(self.description.clone()),
            owner: Set(self.owner.clone()),
            status: Set(self.status),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == EntityStatus::Deleted
    }
}

impl Related<super::dataset::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataSet.def()
    }
}

impl Related<super::dataversion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataVersion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
