//! Content integrity checks.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::database::entity::dataversion::DataVersionModel;
use crate::error::{CatalogError, CatalogResult};
use crate::storage::{StorageGateway, TransferOptions};

#[derive(Debug, Clone)]
pub struct IntegrityService {
    storage: Arc<dyn StorageGateway>,
    concurrency: usize,
    options: TransferOptions,
}

impl IntegrityService {
    pub fn new(storage: Arc<dyn StorageGateway>, concurrency: usize) -> Self {
        Self {
            storage,
            concurrency: concurrency.max(1),
            options: TransferOptions::default(),
        }
    }

    /// Uses the given options for every gateway call.
    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks one version. Versions without content are never intact.
    pub async fn verify_one(&self, version: &DataVersionModel) -> CatalogResult<bool> {
        version.verify(self.storage.as_ref(), &self.options).await
    }

    /// Checks many versions, keyed by version ID.
    ///
    /// A version whose check fails with an error is reported as not intact.
    #[instrument(skip_all, fields(versions = versions.len()))]
    pub async fn verify_batch(&self, versions: &[DataVersionModel]) -> HashMap<String, bool> {
        let limit = Arc::new(Semaphore::new(self.concurrency));

        let futures: Vec<_> = versions
            .iter()
            .map(|version| {
                let limit = limit.clone();
                async move {
                    let intact = match limit.acquire().await {
                        Ok(_permit) => self.verify_one(version).await,
                        Err(e) => Err(CatalogError::storage_error(e)),
                    };

                    let intact = intact.unwrap_or_else(|e| {
                        tracing::warn!("Verification of {} failed: {}", version.id, e);
                        false
                    });

                    (version.id.clone(), intact)
                }
            })
            .collect();

        let results: HashMap<_, _> = join_all(futures).await.into_iter().collect();

        tracing::info!(
            "{} of {} versions intact",
            results.values().filter(|intact| **intact).count(),
            results.len()
        );

        results
    }

    /// Fails with `IntegrityMismatch` unless the version is intact.
    pub async fn ensure_intact(&self, version: &DataVersionModel) -> CatalogResult<()> {
        if self.verify_one(version).await? {
            return Ok(());
        }

        Err(CatalogError::IntegrityMismatch {
            hash: version.content_hash(),
            reason: "Content is missing or does not match its hash".to_owned(),
        })
    }
}
