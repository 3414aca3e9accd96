//! Record factories.
//!
//! Factories turn caller-supplied parameters into fully populated records,
//! filling in IDs, timestamps, and configured defaults. They never touch
//! the database.

use std::path::Path;

use uuid::Uuid;

use crate::config::DefaultsConfig;
use crate::database::entity::datafile::DataFileModel;
use crate::database::entity::dataset::DataSetModel;
use crate::database::entity::dataversion::{DataVersionModel, StorageKind, VersionStatus};
use crate::database::entity::{timestamp, EntityStatus, Json, Metadata};
use crate::error::{CatalogError, CatalogResult};
use crate::storage::{push_content, StorageGateway, TransferOptions};
use quarry::address::StorageAddress;
use quarry::hash::ContentHash;
use quarry::name::validate_name;
use quarry::version::VersionOrdinal;

/// Parameters of a new data set.
#[derive(Debug, Clone, Default)]
pub struct NewDataSet {
    pub name: String,
    pub description: String,
    pub project: String,

    /// Owner of the data set. The configured default owner if unset.
    pub owner: Option<String>,

    pub shared_metadata: Metadata,
}

/// Parameters of a new data file.
#[derive(Debug, Clone, Default)]
pub struct NewDataFile {
    pub name: String,
    pub description: String,

    /// Owner of the data file. The data set's owner if unset.
    pub owner: Option<String>,
}

/// Where the content of a new version comes from.
#[derive(Debug)]
pub enum VersionSource<'a> {
    /// Content that is already stored and hashed.
    Hash(ContentHash),

    /// A local file to push through a gateway.
    Upload {
        path: &'a Path,
        gateway: &'a dyn StorageGateway,
    },

    /// No content yet. The version is created as a draft.
    Draft,
}

/// Parameters of a new version.
#[derive(Debug)]
pub struct NewDataVersion<'a> {
    pub source: VersionSource<'a>,

    /// Where the content lives. For uploads, this is only passed to the
    /// gateway as a target hint, and the address the gateway reports is
    /// recorded instead.
    pub storage_address: Option<StorageAddress>,

    /// Backend kind. Inferred from the address if unset, and always
    /// inferred for uploads.
    pub storage_kind: Option<StorageKind>,

    /// The version this one was derived from.
    pub source_version_id: Option<String>,

    pub transformer: String,
    pub metadata: Metadata,

    /// Options for the upload, if any.
    pub transfer: TransferOptions,
}

/// A version's content and attributes once any upload has finished.
#[derive(Debug, Clone)]
pub struct VersionTemplate {
    pub hash: ContentHash,
    pub address: StorageAddress,
    pub kind: StorageKind,
    pub status: VersionStatus,
    pub source_version_id: Option<String>,
    pub transformer: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct DataSetFactory {
    default_owner: String,
}

#[derive(Debug, Clone, Default)]
pub struct DataFileFactory;

#[derive(Debug, Clone)]
pub struct DataVersionFactory {
    default_algorithm: String,
}

impl NewDataSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.shared_metadata.insert(key.into(), value);
        self
    }
}

impl NewDataFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl<'a> NewDataVersion<'a> {
    fn with_source(source: VersionSource<'a>) -> Self {
        Self {
            source,
            storage_address: None,
            storage_kind: None,
            source_version_id: None,
            transformer: String::new(),
            metadata: Metadata::new(),
            transfer: TransferOptions::default(),
        }
    }

    /// A committed version of content that is already stored.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self::with_source(VersionSource::Hash(hash))
    }

    /// A committed version of a local file, pushed through `gateway`.
    pub fn upload(path: &'a Path, gateway: &'a dyn StorageGateway) -> Self {
        Self::with_source(VersionSource::Upload { path, gateway })
    }

    /// A draft version without content.
    pub fn draft() -> Self {
        Self::with_source(VersionSource::Draft)
    }

    pub fn address(mut self, address: impl Into<StorageAddress>) -> Self {
        self.storage_address = Some(address.into());
        self
    }

    pub fn kind(mut self, kind: StorageKind) -> Self {
        self.storage_kind = Some(kind);
        self
    }

    pub fn derived_from(mut self, version_id: impl Into<String>) -> Self {
        self.source_version_id = Some(version_id.into());
        self
    }

    pub fn transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = transformer.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn transfer_options(mut self, options: TransferOptions) -> Self {
        self.transfer = options;
        self
    }
}

impl DataSetFactory {
    pub fn new(defaults: &DefaultsConfig) -> Self {
        Self {
            default_owner: defaults.owner.clone(),
        }
    }

    pub fn build(&self, new: NewDataSet) -> CatalogResult<DataSetModel> {
        validate_name(&new.name)?;

        let now = timestamp();

        Ok(DataSetModel {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            project: new.project,
            owner: new.owner.unwrap_or_else(|| self.default_owner.clone()),
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
            shared_metadata: Json(new.shared_metadata),
        })
    }
}

impl DataFileFactory {
    pub fn build(&self, dataset: &DataSetModel, new: NewDataFile) -> CatalogResult<DataFileModel> {
        validate_name(&new.name)?;

        let now = timestamp();

        Ok(DataFileModel {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset.id.clone(),
            name: new.name,
            description: new.description,
            owner: new.owner.unwrap_or_else(|| dataset.owner.clone()),
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }
}

impl DataVersionFactory {
    pub fn new(defaults: &DefaultsConfig) -> Self {
        Self {
            default_algorithm: defaults.hash_algorithm.clone(),
        }
    }

    /// Resolves the content of a new version, pushing it if needed.
    pub async fn prepare(&self, new: NewDataVersion<'_>) -> CatalogResult<VersionTemplate> {
        let (hash, address, status, kind) = match new.source {
            VersionSource::Hash(hash) => {
                if hash.is_empty() {
                    return Err(CatalogError::invalid_argument(
                        "A committed version needs a content hash",
                    ));
                }

                (
                    hash,
                    new.storage_address.unwrap_or_default(),
                    VersionStatus::Committed,
                    new.storage_kind,
                )
            }
            VersionSource::Upload { path, gateway } => {
                let target = new.storage_address.unwrap_or_default();
                let (hash, address) = push_content(gateway, path, &target, &new.transfer).await?;

                // The kind follows where the bytes went.
                let kind = StorageKind::from_address(&address);
                (hash, address, VersionStatus::Committed, Some(kind))
            }
            VersionSource::Draft => (
                ContentHash::empty(self.default_algorithm.clone()),
                new.storage_address.unwrap_or_default(),
                VersionStatus::Draft,
                new.storage_kind,
            ),
        };

        Ok(VersionTemplate {
            kind: kind.unwrap_or_else(|| StorageKind::from_address(&address)),
            hash,
            address,
            status,
            source_version_id: new.source_version_id,
            transformer: new.transformer,
            metadata: new.metadata,
        })
    }

    pub fn build(
        &self,
        datafile_id: &str,
        ordinal: VersionOrdinal,
        template: &VersionTemplate,
    ) -> DataVersionModel {
        let now = timestamp();

        DataVersionModel {
            id: Uuid::new_v4().to_string(),
            datafile_id: datafile_id.to_owned(),
            version_ordinal: ordinal.as_i32(),
            hash_value: template.hash.value().to_owned(),
            hash_algorithm: template.hash.algorithm().to_owned(),
            storage_address: template.address.to_string(),
            storage_kind: template.kind,
            status: template.status,
            source_version_id: template.source_version_id.clone(),
            transformer: template.transformer.clone(),
            created_at: now,
            updated_at: now,
            metadata: Json(template.metadata.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_defaults() {
        let defaults = DefaultsConfig {
            owner: "data-eng".to_owned(),
            hash_algorithm: "md5".to_owned(),
        };
        let factory = DataSetFactory::new(&defaults);

        let dataset = factory.build(NewDataSet::new("cifar10")).unwrap();
        assert_eq!("data-eng", dataset.owner);
        assert_eq!(EntityStatus::Active, dataset.status);
        assert_eq!(dataset.created_at, dataset.updated_at);
        assert_eq!(36, dataset.id.len());

        let explicit = factory
            .build(NewDataSet::new("mnist").owner("alice"))
            .unwrap();
        assert_eq!("alice", explicit.owner);
        assert_ne!(dataset.id, explicit.id);
    }

    #[test]
    fn test_datafile_inherits_owner() {
        let dataset = DataSetFactory::new(&DefaultsConfig::default())
            .build(NewDataSet::new("cifar10").owner("bob"))
            .unwrap();

        let datafile = DataFileFactory
            .build(&dataset, NewDataFile::new("train.csv"))
            .unwrap();
        assert_eq!("bob", datafile.owner);
        assert_eq!(dataset.id, datafile.dataset_id);
    }

    #[test]
    fn test_invalid_names() {
        let factory = DataSetFactory::new(&DefaultsConfig::default());

        assert!(matches!(
            factory.build(NewDataSet::new("")),
            Err(CatalogError::InvalidArgument(_))
        ));
        assert!(matches!(
            factory.build(NewDataSet::new("trailing ")),
            Err(CatalogError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_draft() {
        let defaults = DefaultsConfig {
            owner: String::new(),
            hash_algorithm: "md5".to_owned(),
        };
        let factory = DataVersionFactory::new(&defaults);

        let template = factory.prepare(NewDataVersion::draft()).await.unwrap();
        assert_eq!(VersionStatus::Draft, template.status);
        assert!(template.hash.is_empty());
        assert_eq!("md5", template.hash.algorithm());
        assert_eq!(StorageKind::Local, template.kind);
    }

    #[tokio::test]
    async fn test_prepare_from_hash() {
        let factory = DataVersionFactory::new(&DefaultsConfig::default());

        let template = factory
            .prepare(NewDataVersion::from_hash(ContentHash::new("abc123", "md5")).address("s3://bucket/key"))
            .await
            .unwrap();
        assert_eq!(VersionStatus::Committed, template.status);
        assert_eq!(StorageKind::S3, template.kind);

        let version = factory.build("file-id", VersionOrdinal::FIRST, &template);
        assert_eq!(1, version.version_ordinal);
        assert_eq!("abc123", version.hash_value);
        assert_eq!("s3://bucket/key", version.storage_address);

        assert!(matches!(
            factory.prepare(NewDataVersion::from_hash(ContentHash::empty("md5"))).await,
            Err(CatalogError::InvalidArgument(_))
        ));
    }
}
