//! Lineage queries.
//!
//! Versions form a forest through `source_version_id`. Walking towards the
//! root gives a version's lineage, and walking away from it gives its
//! descendants. Links may cross data files.

use std::collections::{HashSet, VecDeque};

use tracing::instrument;

use crate::database::entity::dataversion::DataVersionModel;
use crate::database::{CatalogDatabase, CatalogStore};
use crate::error::{CatalogError, CatalogResult, EntityKind};

/// The default number of entries in a lineage chain.
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct LineageService {
    store: CatalogStore,
}

impl LineageService {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Returns the chain of versions from `version_id` back to its oldest ancestor.
    ///
    /// The chain starts with the version itself and holds at most
    /// `max_depth` entries.
    #[instrument(skip(self))]
    pub async fn get_lineage(
        &self,
        version_id: &str,
        max_depth: usize,
    ) -> CatalogResult<Vec<DataVersionModel>> {
        self.ensure_exists(version_id).await?;
        self.store.lineage_chain(version_id, max_depth).await
    }

    /// Returns the versions derived from `version_id`.
    ///
    /// With `recursive`, descendants of descendants are included, nearest
    /// generation first.
    #[instrument(skip(self))]
    pub async fn get_descendants(
        &self,
        version_id: &str,
        recursive: bool,
    ) -> CatalogResult<Vec<DataVersionModel>> {
        self.ensure_exists(version_id).await?;

        let mut descendants = Vec::new();
        let mut seen = HashSet::from([version_id.to_owned()]);
        let mut queue = VecDeque::from([version_id.to_owned()]);

        while let Some(id) = queue.pop_front() {
            for derived in self.store.find_derived_versions(&id).await? {
                if !seen.insert(derived.id.clone()) {
                    continue;
                }

                if recursive {
                    queue.push_back(derived.id.clone());
                }

                descendants.push(derived);
            }
        }

        tracing::debug!("Found {} descendants", descendants.len());

        Ok(descendants)
    }

    async fn ensure_exists(&self, version_id: &str) -> CatalogResult<()> {
        match self.store.find_version(version_id).await? {
            Some(_) => Ok(()),
            None => Err(CatalogError::not_found(EntityKind::DataVersion, version_id)),
        }
    }
}
