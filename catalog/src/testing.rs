//! Test utilities.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::{DatabaseConfig, DefaultsConfig};
use crate::database::CatalogStore;
use crate::error::{CatalogError, CatalogResult};
use crate::storage::{StorageGateway, TransferOptions};
use quarry::address::StorageAddress;
use quarry::hash::ContentHash;

/// Connects to a fresh in-memory catalog.
pub async fn memory_store() -> CatalogStore {
    let mut config = DatabaseConfig::new("sqlite::memory:");
    config.max_connections = Some(1);

    CatalogStore::connect(&config)
        .await
        .expect("Failed to open in-memory catalog")
        .with_defaults(DefaultsConfig {
            owner: "tester".to_owned(),
            hash_algorithm: "md5".to_owned(),
        })
}

/// Connects to a catalog in a SQLite file, which supports concurrent writers.
pub async fn file_store(path: &Path, max_connections: u32) -> CatalogStore {
    let mut config = DatabaseConfig::new(format!("sqlite://{}?mode=rwc", path.display()));
    config.max_connections = Some(max_connections);
    config.busy_retries = 20;

    CatalogStore::connect(&config)
        .await
        .expect("Failed to open catalog file")
}

/// A gateway that records calls and keeps "stored" hashes in memory.
///
/// Pushed content is labelled `md5` so tests can tell gateway hashes
/// apart from ones computed locally.
#[derive(Debug, Default)]
pub struct MockGateway {
    pub pushes: AtomicUsize,
    pub pulls: AtomicUsize,
    pub verifies: AtomicUsize,
    pub transfers: AtomicUsize,

    /// Makes every push fail.
    pub fail_push: bool,

    /// Makes every push succeed without reporting a hash.
    pub empty_hash: bool,

    stored: Mutex<HashSet<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_push: true,
            ..Self::default()
        }
    }

    pub fn hashless() -> Self {
        Self {
            empty_hash: true,
            ..Self::default()
        }
    }

    /// Marks content as stored without a push.
    pub fn insert(&self, hash: &ContentHash) {
        self.stored.lock().unwrap().insert(hash.value().to_owned());
    }

    /// Forgets stored content.
    pub fn remove(&self, hash: &ContentHash) {
        self.stored.lock().unwrap().remove(hash.value());
    }

    pub fn calls(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
            + self.pulls.load(Ordering::SeqCst)
            + self.verifies.load(Ordering::SeqCst)
            + self.transfers.load(Ordering::SeqCst)
    }

    fn is_stored(&self, hash: &ContentHash) -> bool {
        self.stored.lock().unwrap().contains(hash.value())
    }
}

#[async_trait]
impl StorageGateway for MockGateway {
    async fn push(
        &self,
        source: &Path,
        _target: &StorageAddress,
        _options: &TransferOptions,
    ) -> CatalogResult<ContentHash> {
        self.pushes.fetch_add(1, Ordering::SeqCst);

        if self.fail_push {
            return Err(CatalogError::StorageError(anyhow::anyhow!("Remote unavailable")));
        }

        if self.empty_hash {
            return Ok(ContentHash::empty("md5"));
        }

        let content = tokio::fs::read(source)
            .await
            .map_err(CatalogError::storage_error)?;
        let hash = ContentHash::new(ContentHash::sha256_from_bytes(&content).value(), "md5");
        self.insert(&hash);

        Ok(hash)
    }

    async fn pull(
        &self,
        hash: &ContentHash,
        dest: &Path,
        _options: &TransferOptions,
    ) -> CatalogResult<PathBuf> {
        self.pulls.fetch_add(1, Ordering::SeqCst);

        if !self.is_stored(hash) {
            return Err(CatalogError::NotFoundRemote { hash: hash.clone() });
        }

        Ok(dest.to_owned())
    }

    async fn verify(&self, hash: &ContentHash, _options: &TransferOptions) -> CatalogResult<bool> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        Ok(self.is_stored(hash))
    }

    async fn transfer(
        &self,
        hash: &ContentHash,
        _from: &str,
        _to: &str,
        _options: &TransferOptions,
    ) -> CatalogResult<bool> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        Ok(self.is_stored(hash))
    }

    fn address_for(
        &self,
        hash: &ContentHash,
        _options: &TransferOptions,
    ) -> CatalogResult<StorageAddress> {
        Ok(StorageAddress::new(format!("s3://mock-bucket/{}", hash.value())))
    }
}
