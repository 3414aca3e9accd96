//! Data set operations.

use tracing::instrument;

use super::FileLookup;
use crate::database::entity::datafile::DataFileModel;
use crate::database::entity::dataset::DataSetModel;
use crate::database::entity::{timestamp, EntityStatus};
use crate::database::{CatalogDatabase, CatalogStore};
use crate::error::{CatalogError, CatalogResult, EntityKind};
use crate::factory::{DataFileFactory, NewDataFile};
use quarry::name::validate_name;

impl DataSetModel {
    /// Adds a file to the data set.
    ///
    /// File names are unique within a data set, and the names of deleted
    /// files stay taken.
    #[instrument(skip_all, fields(dataset = %self.name))]
    pub async fn add_file(
        &self,
        store: &CatalogStore,
        new: NewDataFile,
    ) -> CatalogResult<DataFileModel> {
        self.add_file_with(store, &DataFileFactory, new).await
    }

    pub(crate) async fn add_file_with(
        &self,
        store: &CatalogStore,
        factory: &DataFileFactory,
        new: NewDataFile,
    ) -> CatalogResult<DataFileModel> {
        self.ensure_live()?;

        let datafile = factory.build(self, new)?;

        store
            .with_transaction::<_, ()>(|txn| {
                let datafile = datafile.clone();
                Box::pin(async move {
                    let dataset = txn
                        .find_dataset(&datafile.dataset_id)
                        .await?
                        .ok_or_else(|| {
                            CatalogError::not_found(EntityKind::DataSet, &datafile.dataset_id)
                        })?;
                    dataset.ensure_live()?;

                    let existing = txn
                        .find_datafile_by_name(&datafile.dataset_id, &datafile.name)
                        .await?;

                    if existing.is_some() {
                        return Err(CatalogError::DuplicateName {
                            kind: EntityKind::DataFile,
                            name: datafile.name.clone(),
                        });
                    }

                    txn.save_datafile(&datafile).await
                })
            })
            .await?;

        tracing::info!("Added file {:?}", datafile.name);

        Ok(datafile)
    }

    /// Finds a file of this data set, deleted or not.
    pub async fn get_file(
        &self,
        store: &CatalogStore,
        lookup: FileLookup<'_>,
    ) -> CatalogResult<DataFileModel> {
        let found = match lookup {
            FileLookup::Name(name) => store.find_datafile_by_name(&self.id, name).await?,
            FileLookup::Id(id) => store
                .find_datafile(id)
                .await?
                .filter(|datafile| datafile.dataset_id == self.id),
        };

        found.ok_or_else(|| CatalogError::not_found(EntityKind::DataFile, lookup.identifier()))
    }

    /// Lists the files of this data set ordered by name.
    pub async fn list_files(
        &self,
        store: &CatalogStore,
        include_deleted: bool,
    ) -> CatalogResult<Vec<DataFileModel>> {
        store.list_datafiles(&self.id, include_deleted).await
    }

    /// Soft-deletes a file by name, returning it.
    pub async fn delete_file(&self, store: &CatalogStore, name: &str) -> CatalogResult<DataFileModel> {
        let mut datafile = self.get_file(store, FileLookup::Name(name)).await?;
        datafile.delete(store).await?;

        Ok(datafile)
    }

    /// Soft-deletes every live file of this data set at once.
    ///
    /// If any file still has live versions, nothing is deleted.
    #[instrument(skip_all, fields(dataset = %self.name))]
    pub async fn delete_all_files(&self, store: &CatalogStore) -> CatalogResult<u64> {
        let deleted = store
            .with_transaction::<_, u64>(|txn| {
                let dataset_id = self.id.clone();
                Box::pin(async move {
                    let now = timestamp();
                    let mut count = 0;

                    for mut datafile in txn.list_datafiles(&dataset_id, false).await? {
                        if txn.count_live_versions(&datafile.id).await? > 0 {
                            return Err(CatalogError::DeleteBlocked {
                                kind: EntityKind::DataFile,
                                identifier: datafile.name,
                            });
                        }

                        datafile.status = datafile
                            .status
                            .transition_to(EntityKind::DataFile, EntityStatus::Deleted)?;
                        datafile.updated_at = now;
                        txn.save_datafile(&datafile).await?;
                        count += 1;
                    }

                    Ok(count)
                })
            })
            .await?;

        tracing::info!("Deleted {} files", deleted);

        Ok(deleted)
    }

    /// Returns whether the data set has no live files left.
    pub async fn can_delete(&self, store: &CatalogStore) -> CatalogResult<bool> {
        Ok(store.count_live_files(&self.id).await? == 0)
    }

    /// Soft-deletes the data set.
    ///
    /// Fails with `DeleteBlocked` while live files remain. Deleting a
    /// deleted data set does nothing.
    #[instrument(skip_all, fields(dataset = %self.name))]
    pub async fn delete(&mut self, store: &CatalogStore) -> CatalogResult<()> {
        if self.is_deleted() {
            return Ok(());
        }

        let mut deleted = self.clone();
        deleted.status = self
            .status
            .transition_to(EntityKind::DataSet, EntityStatus::Deleted)?;
        deleted.updated_at = timestamp();

        store
            .with_transaction::<_, ()>(|txn| {
                let deleted = deleted.clone();
                Box::pin(async move {
                    if txn.count_live_files(&deleted.id).await? > 0 {
                        return Err(CatalogError::DeleteBlocked {
                            kind: EntityKind::DataSet,
                            identifier: deleted.name.clone(),
                        });
                    }

                    txn.save_dataset(&deleted).await
                })
            })
            .await?;

        *self = deleted;
        tracing::info!("Deleted data set");

        Ok(())
    }

    /// Persists changes made to the data set's attributes.
    ///
    /// The status cannot be changed this way. It must match the stored
    /// status, so a stale copy cannot bring back a deleted data set.
    #[instrument(skip_all, fields(dataset = %self.name))]
    pub async fn save(&mut self, store: &CatalogStore) -> CatalogResult<()> {
        validate_name(&self.name)?;

        let mut updated = self.clone();
        updated.updated_at = timestamp();

        store
            .with_transaction::<_, ()>(|txn| {
                let updated = updated.clone();
                Box::pin(async move {
                    let current = txn.find_dataset(&updated.id).await?.ok_or_else(|| {
                        CatalogError::not_found(EntityKind::DataSet, &updated.id)
                    })?;
                    current
                        .status
                        .transition_to(EntityKind::DataSet, updated.status)?;

                    // Deleting goes through `delete`, which checks for live files.
                    if current.status != updated.status {
                        return Err(CatalogError::InvalidStatusTransition {
                            kind: EntityKind::DataSet,
                            from: current.status.as_str(),
                            to: updated.status.as_str(),
                        });
                    }

                    txn.save_dataset(&updated).await
                })
            })
            .await?;

        *self = updated;

        Ok(())
    }

    pub(crate) fn ensure_live(&self) -> CatalogResult<()> {
        if self.is_deleted() {
            return Err(CatalogError::invalid_argument(format!(
                "Data set {:?} is deleted",
                self.name
            )));
        }

        Ok(())
    }
}
