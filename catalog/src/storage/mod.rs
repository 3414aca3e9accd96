//! Content storage.
//!
//! The catalog only records where content lives. Moving bytes is the job
//! of a [`StorageGateway`], which is handed to the operations that need it.

mod local;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::{CatalogError, CatalogResult};
use quarry::address::StorageAddress;
use quarry::hash::ContentHash;

pub use self::local::{LocalGateway, LocalStorageConfig};

/// Options for a single gateway call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Name of the remote to use instead of the default one.
    pub remote: Option<String>,

    /// Maximum number of parallel jobs the gateway may use.
    pub jobs: Option<usize>,
}

/// A content storage gateway.
#[async_trait]
pub trait StorageGateway: Send + Sync + std::fmt::Debug {
    /// Uploads local content, returning its hash.
    ///
    /// `target` is a hint for where to put the content and may be empty.
    /// Pushing the same bytes again succeeds and yields the same hash.
    async fn push(
        &self,
        source: &Path,
        target: &StorageAddress,
        options: &TransferOptions,
    ) -> CatalogResult<ContentHash>;

    /// Downloads content to `dest`, returning the path written.
    ///
    /// Fails with `NotFoundRemote` if the content is not stored, and with
    /// `IntegrityMismatch` if the stored bytes no longer match the hash.
    async fn pull(
        &self,
        hash: &ContentHash,
        dest: &Path,
        options: &TransferOptions,
    ) -> CatalogResult<PathBuf>;

    /// Checks that content is stored and intact.
    async fn verify(&self, hash: &ContentHash, options: &TransferOptions) -> CatalogResult<bool>;

    /// Copies content from one remote to another.
    ///
    /// Returns `false` if the content is not stored in `from`.
    async fn transfer(
        &self,
        hash: &ContentHash,
        from: &str,
        to: &str,
        options: &TransferOptions,
    ) -> CatalogResult<bool>;

    /// Returns the address content with the given hash is stored at.
    fn address_for(
        &self,
        hash: &ContentHash,
        options: &TransferOptions,
    ) -> CatalogResult<StorageAddress>;
}

/// Pushes local content, returning its hash and the address the gateway
/// stored it at.
///
/// `target` is only a hint. The recorded address always comes from the
/// gateway.
pub(crate) async fn push_content(
    gateway: &dyn StorageGateway,
    source: &Path,
    target: &StorageAddress,
    options: &TransferOptions,
) -> CatalogResult<(ContentHash, StorageAddress)> {
    let hash = gateway.push(source, target, options).await?;

    if hash.is_empty() {
        return Err(CatalogError::StorageError(anyhow!(
            "Gateway returned no content hash for {:?}",
            source
        )));
    }

    let address = gateway.address_for(&hash, options)?;

    Ok((hash, address))
}
