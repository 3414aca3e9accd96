//! An immutable snapshot of a data file's content.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use super::{Json, Metadata};
use crate::error::{CatalogError, CatalogResult, EntityKind};
use quarry::address::StorageAddress;
use quarry::hash::ContentHash;
use quarry::version::VersionOrdinal;

pub type DataVersionModel = Model;

/// The lifecycle status of a version.
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum VersionStatus {
    /// The version is registered but has no content yet.
    ///
    /// Drafts have an empty content hash.
    #[sea_orm(string_value = "DRAFT")]
    Draft,

    /// The content has been uploaded and hashed.
    #[sea_orm(string_value = "COMMITTED")]
    Committed,

    /// The version has been soft-deleted.
    #[sea_orm(string_value = "DELETED")]
    Deleted,
}

/// The kind of backend holding a version's content.
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum StorageKind {
    #[sea_orm(string_value = "S3")]
    S3,

    #[sea_orm(string_value = "GCS")]
    Gcs,

    #[sea_orm(string_value = "AZURE")]
    Azure,

    #[sea_orm(string_value = "LOCAL")]
    Local,
}

/// An immutable snapshot of a data file's content.
///
/// Versions are numbered per data file, starting at 1 and without gaps
/// at the time of creation. A version may point at the version it was
/// derived from, which can belong to a different data file.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dataversion")]
pub struct Model {
    /// Unique ID of the version (UUID v4).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// ID of the data file the version belongs to.
    #[sea_orm(indexed)]
    pub datafile_id: String,

    /// Position of the version within its data file.
    pub version_ordinal: i32,

    /// Digest of the content, empty for drafts.
    pub hash_value: String,

    /// Algorithm label of the content digest.
    pub hash_algorithm: String,

    /// Where the content is stored. May be empty.
    pub storage_address: String,

    /// The kind of backend holding the content.
    pub storage_kind: StorageKind,

    /// Lifecycle status.
    pub status: VersionStatus,

    /// ID of the version this one was derived from.
    #[sea_orm(indexed)]
    pub source_version_id: Option<String>,

    /// Free-form description of the process that produced the content.
    pub transformer: String,

    /// Timestamp when the version was created.
    pub created_at: ChronoDateTimeUtc,

    /// Timestamp when the version was last modified.
    pub updated_at: ChronoDateTimeUtc,

    pub metadata: Json<Metadata>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::datafile::Entity",
        from = "Column::DatafileId",
        to = "super::datafile::Column::Id"
    )]
    DataFile,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Committed => "COMMITTED",
            Self::Deleted => "DELETED",
        }
    }

    /// Checks a status change, returning the new status.
    ///
    /// A draft may be committed once. Any version may be deleted, and
    /// deleting again is a no-op. Nothing leaves `Deleted`.
    pub fn transition_to(self, target: Self) -> CatalogResult<Self> {
        match (self, target) {
            (Self::Draft, Self::Committed) | (_, Self::Deleted) => Ok(target),
            _ => Err(CatalogError::InvalidStatusTransition {
                kind: EntityKind::DataVersion,
                from: self.as_str(),
                to: target.as_str(),
            }),
        }
    }
}

impl StorageKind {
    /// Infers the backend kind from the scheme of an address.
    ///
    /// Addresses without a recognized scheme are treated as local paths.
    pub fn from_address(address: &StorageAddress) -> Self {
        match address.scheme().as_str() {
            "s3" | "s3a" | "s3n" => Self::S3,
            "gs" | "gcs" => Self::Gcs,
            "az" | "azure" | "abfs" | "abfss" | "wasb" | "wasbs" => Self::Azure,
            _ => Self::Local,
        }
    }
}

impl Model {
    /// Returns an active model with every column set.
    pub fn to_active_model(&self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id.clone()),
            datafile_id: Set(self.datafile_id.clone()),
            version_ordinal: Set(self.version_ordinal),
            hash_value: Set(self.hash_value.clone()),
            hash_algorithm: Set(self.hash_algorithm.clone()),
            storage_address: Set(self.storage_address.clone()),
            storage_kind: Set(self.storage_kind),
            status: Set(self.status),
            source_version_id: Set(self.source_version_id.clone()),
            transformer: Set(self.transformer.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
            metadata: Set(self.metadata.clone()),
        }
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::new(self.hash_value.clone(), self.hash_algorithm.clone())
    }

    pub fn storage_address(&self) -> StorageAddress {
        StorageAddress::new(self.storage_address.clone())
    }

    pub fn ordinal(&self) -> CatalogResult<VersionOrdinal> {
        Ok(VersionOrdinal::new(i64::from(self.version_ordinal))?)
    }

    pub fn is_deleted(&self) -> bool {
        self.status == VersionStatus::Deleted
    }
}

impl Related<super::datafile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
