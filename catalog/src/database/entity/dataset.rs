//! A named collection of data files.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use super::{EntityStatus, Json, Metadata};

pub type DataSetModel = Model;

/// A named collection of data files.
///
/// Data set names are unique across the whole catalog. Since data sets
/// are only ever soft-deleted, the name of a deleted data set cannot be
/// taken by a new one.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dataset")]
pub struct Model {
    /// Unique ID of the data set (UUID v4).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unique name of the data set.
    #[sea_orm(unique)]
    pub name: String,

    pub description: String,

    /// The project the data set belongs to.
    pub project: String,

    /// Owner of the data set.
    pub owner: String,

    /// Lifecycle status.
    pub status: EntityStatus,

    /// Timestamp when the data set was created.
    pub created_at: ChronoDateTimeUtc,

    /// Timestamp when the data set was last modified.
    pub updated_at: ChronoDateTimeUtc,

    /// Metadata shared by all files in the data set.
    pub shared_metadata: Json<Metadata>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::datafile::Entity")]
    DataFile,
}

impl Model {
    /// Returns an active model with every column set.
    pub fn to_active_model(&self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id.clone()),
            name: Set(self.name.clone()),
            description: Set(self.description.clone()),
            project: Set(self.project.clone()),
            owner: Set(self.owner.clone()),
            status: Set(self.status),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
            shared_metadata: Set(self.shared_metadata.clone()),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == EntityStatus::Deleted
    }
}

impl Related<super::datafile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
