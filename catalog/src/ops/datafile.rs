//! Data file operations.

use tracing::instrument;

use super::VersionLookup;
use crate::database::entity::datafile::DataFileModel;
use crate::database::entity::dataset::DataSetModel;
use crate::database::entity::dataversion::{DataVersionModel, VersionStatus};
use crate::database::entity::{timestamp, EntityStatus};
use crate::database::{CatalogDatabase, CatalogStore};
use crate::error::{CatalogError, CatalogResult, EntityKind};
use crate::factory::{DataVersionFactory, NewDataVersion};

impl DataFileModel {
    /// Adds a version, numbered after the highest existing one.
    ///
    /// Uploads happen before the transaction, so a failed push leaves the
    /// catalog untouched. Concurrent callers on the same file always get
    /// distinct ordinals.
    #[instrument(skip_all, fields(datafile = %self.name))]
    pub async fn add_version(
        &self,
        store: &CatalogStore,
        new: NewDataVersion<'_>,
    ) -> CatalogResult<DataVersionModel> {
        let factory = DataVersionFactory::new(store.defaults());
        self.add_version_with(store, &factory, new).await
    }

    pub(crate) async fn add_version_with(
        &self,
        store: &CatalogStore,
        factory: &DataVersionFactory,
        new: NewDataVersion<'_>,
    ) -> CatalogResult<DataVersionModel> {
        self.ensure_live()?;

        if let Some(source_id) = new.source_version_id.as_deref() {
            if store.find_version(source_id).await?.is_none() {
                return Err(CatalogError::not_found(EntityKind::DataVersion, source_id));
            }
        }

        let template = factory.prepare(new).await?;

        let version = store
            .with_transaction::<_, DataVersionModel>(|txn| {
                let factory = factory.clone();
                let template = template.clone();
                let datafile_id = self.id.clone();
                Box::pin(async move {
                    // Serializes numbering against other writers of this file.
                    txn.touch_datafile(&datafile_id, timestamp()).await?;

                    let current = txn
                        .find_datafile(&datafile_id)
                        .await?
                        .ok_or_else(|| CatalogError::not_found(EntityKind::DataFile, &datafile_id))?;
                    current.ensure_live()?;

                    let ordinal = txn.next_version_ordinal(&datafile_id).await?;
                    let version = factory.build(&datafile_id, ordinal, &template);
                    txn.save_version(&version).await?;

                    Ok(version)
                })
            })
            .await?;

        tracing::info!(
            "Added version {} ({})",
            version.version_ordinal,
            version.status.as_str()
        );

        Ok(version)
    }

    /// Finds a version of this file, deleted or not.
    pub async fn get_version(
        &self,
        store: &CatalogStore,
        lookup: VersionLookup<'_>,
    ) -> CatalogResult<DataVersionModel> {
        let found = match lookup {
            VersionLookup::Ordinal(ordinal) => {
                store.find_version_by_ordinal(&self.id, ordinal).await?
            }
            VersionLookup::Id(id) => store
                .find_version(id)
                .await?
                .filter(|version| version.datafile_id == self.id),
        };

        found.ok_or_else(|| CatalogError::not_found(EntityKind::DataVersion, lookup.identifier()))
    }

    /// Returns the committed version with the highest ordinal.
    ///
    /// Drafts and deleted versions are skipped.
    pub async fn get_latest_version(&self, store: &CatalogStore) -> CatalogResult<DataVersionModel> {
        store
            .find_latest_committed_version(&self.id)
            .await?
            .ok_or_else(|| {
                CatalogError::not_found(
                    EntityKind::DataVersion,
                    format!("latest committed version of {}", self.name),
                )
            })
    }

    /// Lists the versions of this file in ordinal order.
    pub async fn list_versions(
        &self,
        store: &CatalogStore,
        include_deleted: bool,
    ) -> CatalogResult<Vec<DataVersionModel>> {
        store.list_versions(&self.id, include_deleted).await
    }

    /// Soft-deletes a version, returning it.
    pub async fn delete_version(
        &self,
        store: &CatalogStore,
        lookup: VersionLookup<'_>,
    ) -> CatalogResult<DataVersionModel> {
        let mut version = self.get_version(store, lookup).await?;
        version.delete(store).await?;

        Ok(version)
    }

    /// Soft-deletes every live version of this file at once.
    #[instrument(skip_all, fields(datafile = %self.name))]
    pub async fn delete_all_versions(&self, store: &CatalogStore) -> CatalogResult<u64> {
        let deleted = store
            .with_transaction::<_, u64>(|txn| {
                let datafile_id = self.id.clone();
                Box::pin(async move {
                    let now = timestamp();
                    let mut count = 0;

                    for mut version in txn.list_versions(&datafile_id, false).await? {
                        version.status = version.status.transition_to(VersionStatus::Deleted)?;
                        version.updated_at = now;
                        txn.save_version(&version).await?;
                        count += 1;
                    }

                    Ok(count)
                })
            })
            .await?;

        tracing::info!("Deleted {} versions", deleted);

        Ok(deleted)
    }

    /// Returns whether the file has no live versions left.
    pub async fn can_delete(&self, store: &CatalogStore) -> CatalogResult<bool> {
        Ok(store.count_live_versions(&self.id).await? == 0)
    }

    /// Soft-deletes the file.
    ///
    /// Fails with `DeleteBlocked` while live versions remain. Deleting a
    /// deleted file does nothing.
    #[instrument(skip_all, fields(datafile = %self.name))]
    pub async fn delete(&mut self, store: &CatalogStore) -> CatalogResult<()> {
        if self.is_deleted() {
            return Ok(());
        }

        let mut deleted = self.clone();
        deleted.status = self
            .status
            .transition_to(EntityKind::DataFile, EntityStatus::Deleted)?;
        deleted.updated_at = timestamp();

        store
            .with_transaction::<_, ()>(|txn| {
                let deleted = deleted.clone();
                Box::pin(async move {
                    if txn.count_live_versions(&deleted.id).await? > 0 {
                        return Err(CatalogError::DeleteBlocked {
                            kind: EntityKind::DataFile,
                            identifier: deleted.name.clone(),
                        });
                    }

                    txn.save_datafile(&deleted).await
                })
            })
            .await?;

        *self = deleted;
        tracing::info!("Deleted data file");

        Ok(())
    }

    /// Returns the data set containing this file.
    pub async fn dataset(&self, store: &CatalogStore) -> CatalogResult<DataSetModel> {
        store
            .find_dataset(&self.dataset_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(EntityKind::DataSet, &self.dataset_id))
    }

    pub(crate) fn ensure_live(&self) -> CatalogResult<()> {
        if self.is_deleted() {
            return Err(CatalogError::invalid_argument(format!(
                "Data file {:?} is deleted",
                self.name
            )));
        }

        Ok(())
    }
}
