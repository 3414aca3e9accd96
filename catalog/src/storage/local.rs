//! Local content-addressed storage.
//!
//! Objects are stored at `<path>/<remote>/<algorithm>/<xx>/<rest>`, where
//! `xx` is the first two digits of the hash. Every remote is a separate
//! directory under the configured path.

use std::path::{Component, Path, PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt, BufReader};
use uuid::Uuid;

use super::{StorageGateway, TransferOptions};
use crate::error::{CatalogError, CatalogResult};
use quarry::address::StorageAddress;
use quarry::hash::{self, ContentHash, DEFAULT_ALGORITHM};
use quarry::stream::HashingReader;
use quarry::QuarryError;

/// Name of the remote used when none is requested.
pub const DEFAULT_REMOTE: &str = "default";

#[derive(Debug)]
pub struct LocalGateway {
    config: LocalStorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// The directory to store all objects under.
    pub path: PathBuf,
}

impl LocalGateway {
    pub async fn new(config: LocalStorageConfig) -> CatalogResult<Self> {
        fs::create_dir_all(&config.path)
            .await
            .map_err(CatalogError::storage_error)?;

        Ok(Self { config })
    }

    fn remote_path(&self, remote: Option<&str>) -> CatalogResult<PathBuf> {
        let remote = remote.unwrap_or(DEFAULT_REMOTE);
        let mut components = Path::new(remote).components();

        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.config.path.join(remote)),
            _ => Err(CatalogError::invalid_argument(format!(
                "Invalid remote name {:?}",
                remote
            ))),
        }
    }

    fn object_path(&self, remote: Option<&str>, hash: &ContentHash) -> CatalogResult<PathBuf> {
        if hash.algorithm() != DEFAULT_ALGORITHM {
            let error = hash::Error::UnsupportedHashAlgorithm(hash.algorithm().to_owned());
            return Err(QuarryError::from(error).into());
        }

        if !hash.is_hex_digest(32) {
            return Err(CatalogError::invalid_argument(format!(
                "Malformed hash {}",
                hash
            )));
        }

        let value = hash.value().to_ascii_lowercase();
        let (prefix, rest) = value.split_at(2);

        Ok(self
            .remote_path(remote)?
            .join(hash.algorithm())
            .join(prefix)
            .join(rest))
    }

    /// Hashes the file at a path.
    async fn hash_file(path: &Path) -> io::Result<(ContentHash, u64)> {
        let file = File::open(path).await?;
        let mut reader = HashingReader::new(BufReader::new(file), Sha256::new(), DEFAULT_ALGORITHM);
        io::copy(&mut reader, &mut io::sink()).await?;

        reader
            .finalize()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "Stream was not finalized"))
    }

    /// Copies a file to a sibling staging path, then renames it into place.
    async fn copy_into_place(source: &Path, dest: &Path) -> io::Result<()> {
        let parent = dest
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Destination has no parent"))?;
        fs::create_dir_all(parent).await?;

        let staging = parent.join(format!(".staging-{}", Uuid::new_v4()));
        if let Err(e) = fs::copy(source, &staging).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }

        fs::rename(&staging, dest).await
    }
}

#[async_trait]
impl StorageGateway for LocalGateway {
    async fn push(
        &self,
        source: &Path,
        _target: &StorageAddress,
        options: &TransferOptions,
    ) -> CatalogResult<ContentHash> {
        let remote = self.remote_path(options.remote.as_deref())?;
        fs::create_dir_all(&remote)
            .await
            .map_err(CatalogError::storage_error)?;

        let file = File::open(source)
            .await
            .map_err(CatalogError::storage_error)?;

        let staging = remote.join(format!(".upload-{}", Uuid::new_v4()));
        let mut staged = File::create(&staging)
            .await
            .map_err(CatalogError::storage_error)?;

        let mut reader = HashingReader::new(BufReader::new(file), Sha256::new(), DEFAULT_ALGORITHM);
        let copied = async {
            io::copy(&mut reader, &mut staged).await?;
            staged.flush().await?;
            staged.sync_all().await
        }
        .await;

        if let Err(e) = copied {
            let _ = fs::remove_file(&staging).await;
            return Err(CatalogError::storage_error(e));
        }

        let (hash, size) = reader
            .finalize()
            .ok_or_else(|| CatalogError::StorageError(anyhow!("Upload stream was not finalized")))?;

        let path = self.object_path(options.remote.as_deref(), &hash)?;
        let placed = async {
            fs::create_dir_all(path.parent().unwrap_or(remote.as_path())).await?;
            fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = placed {
            let _ = fs::remove_file(&staging).await;
            return Err(CatalogError::storage_error(e));
        }

        tracing::debug!("Pushed {:?} as {} ({} bytes)", source, hash, size);

        Ok(hash)
    }

    async fn pull(
        &self,
        hash: &ContentHash,
        dest: &Path,
        options: &TransferOptions,
    ) -> CatalogResult<PathBuf> {
        let path = self.object_path(options.remote.as_deref(), hash)?;

        let (actual, _) = match Self::hash_file(&path).await {
            Ok(hashed) => hashed,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFoundRemote { hash: hash.clone() });
            }
            Err(e) => return Err(CatalogError::storage_error(e)),
        };

        if !actual.matches(hash) {
            return Err(CatalogError::IntegrityMismatch {
                hash: hash.clone(),
                reason: format!("Stored object hashes to {}", actual),
            });
        }

        Self::copy_into_place(&path, dest)
            .await
            .map_err(CatalogError::storage_error)?;

        tracing::debug!("Pulled {} to {:?}", hash, dest);

        Ok(dest.to_owned())
    }

    async fn verify(&self, hash: &ContentHash, options: &TransferOptions) -> CatalogResult<bool> {
        let path = self.object_path(options.remote.as_deref(), hash)?;

        match Self::hash_file(&path).await {
            Ok((actual, _)) => Ok(actual.matches(hash)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CatalogError::storage_error(e)),
        }
    }

    async fn transfer(
        &self,
        hash: &ContentHash,
        from: &str,
        to: &str,
        _options: &TransferOptions,
    ) -> CatalogResult<bool> {
        let source = self.object_path(Some(from), hash)?;
        let dest = self.object_path(Some(to), hash)?;

        if fs::metadata(&source).await.is_err() {
            return Ok(false);
        }

        if fs::metadata(&dest).await.is_ok() {
            return Ok(true);
        }

        Self::copy_into_place(&source, &dest)
            .await
            .map_err(CatalogError::storage_error)?;

        tracing::debug!("Transferred {} from {} to {}", hash, from, to);

        Ok(true)
    }

    fn address_for(
        &self,
        hash: &ContentHash,
        options: &TransferOptions,
    ) -> CatalogResult<StorageAddress> {
        let path = self.object_path(options.remote.as_deref(), hash)?;
        Ok(StorageAddress::new(path.display().to_string()))
    }
}
