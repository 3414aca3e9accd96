//! Version operations.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::database::entity::datafile::DataFileModel;
use crate::database::entity::dataversion::{DataVersionModel, StorageKind, VersionStatus};
use crate::database::entity::timestamp;
use crate::database::{CatalogDatabase, CatalogStore};
use crate::error::{CatalogError, CatalogResult, EntityKind};
use crate::storage::{push_content, StorageGateway, TransferOptions};
use quarry::hash::ContentHash;

impl DataVersionModel {
    /// Uploads content for a draft and marks it committed.
    ///
    /// The record is only updated once the push has succeeded, so a failed
    /// upload leaves the draft as it was.
    #[instrument(skip_all, fields(version = %self.id))]
    pub async fn commit(
        &mut self,
        store: &CatalogStore,
        source: &Path,
        gateway: &dyn StorageGateway,
        options: &TransferOptions,
    ) -> CatalogResult<()> {
        let status = self.status.transition_to(VersionStatus::Committed)?;

        let target = self.storage_address();
        let (hash, address) = push_content(gateway, source, &target, options).await?;

        let mut committed = self.clone();
        committed.storage_kind = StorageKind::from_address(&address);
        committed.storage_address = address.to_string();
        committed.hash_value = hash.value().to_owned();
        committed.hash_algorithm = hash.algorithm().to_owned();
        committed.status = status;
        committed.updated_at = timestamp();

        store
            .with_transaction::<_, ()>(|txn| {
                let committed = committed.clone();
                Box::pin(async move {
                    // Another writer may have moved the version on during the upload.
                    let current = txn.find_version(&committed.id).await?.ok_or_else(|| {
                        CatalogError::not_found(EntityKind::DataVersion, &committed.id)
                    })?;
                    current.status.transition_to(VersionStatus::Committed)?;

                    txn.save_version(&committed).await
                })
            })
            .await?;

        *self = committed;
        tracing::info!("Committed as {}", hash);

        Ok(())
    }

    /// Downloads the content to `dest`, returning the path written.
    pub async fn fetch(
        &self,
        gateway: &dyn StorageGateway,
        dest: &Path,
        options: &TransferOptions,
    ) -> CatalogResult<PathBuf> {
        let hash = self.require_content()?;
        gateway.pull(&hash, dest, options).await
    }

    /// Checks that the content is stored and intact.
    ///
    /// A version without content is never intact. The gateway is not
    /// consulted for it.
    pub async fn verify(
        &self,
        gateway: &dyn StorageGateway,
        options: &TransferOptions,
    ) -> CatalogResult<bool> {
        let hash = self.content_hash();
        if hash.is_empty() {
            return Ok(false);
        }

        gateway.verify(&hash, options).await
    }

    /// Copies the content between two remotes of a gateway.
    pub async fn transfer(
        &self,
        gateway: &dyn StorageGateway,
        from: &str,
        to: &str,
        options: &TransferOptions,
    ) -> CatalogResult<bool> {
        let hash = self.require_content()?;
        gateway.transfer(&hash, from, to, options).await
    }

    /// Soft-deletes the version. Deleting a deleted version does nothing.
    #[instrument(skip_all, fields(version = %self.id))]
    pub async fn delete(&mut self, store: &CatalogStore) -> CatalogResult<()> {
        if self.is_deleted() {
            return Ok(());
        }

        let mut deleted = self.clone();
        deleted.status = self.status.transition_to(VersionStatus::Deleted)?;
        deleted.updated_at = timestamp();

        store
            .with_transaction::<_, ()>(|txn| {
                let deleted = deleted.clone();
                Box::pin(async move { txn.save_version(&deleted).await })
            })
            .await?;

        *self = deleted;
        tracing::info!("Deleted version");

        Ok(())
    }

    /// Returns the data file this version belongs to.
    pub async fn datafile(&self, store: &CatalogStore) -> CatalogResult<DataFileModel> {
        store
            .find_datafile(&self.datafile_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(EntityKind::DataFile, &self.datafile_id))
    }

    fn require_content(&self) -> CatalogResult<ContentHash> {
        let hash = self.content_hash();
        if hash.is_empty() {
            return Err(CatalogError::invalid_argument(format!(
                "Version {} has no content",
                self.id
            )));
        }

        Ok(hash)
    }
}
