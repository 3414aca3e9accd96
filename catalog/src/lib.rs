//! The Quarry data catalog.
//!
//! Quarry tracks data sets, the files in them, and immutable versions of
//! those files, along with where each version's content is stored and which
//! version it was derived from. Content itself is moved by a
//! [`StorageGateway`](storage::StorageGateway).
//!
//! [`Catalog`] is the entry point. It connects lazily and hands out the
//! store, the factories, and the services.

#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]
#![cfg_attr(
    not(debug_assertions),
    deny(unused_imports, unused_mut, unused_variables,)
)]

pub mod config;
pub mod database;
pub mod error;
pub mod factory;
pub mod ops;
pub mod services;
pub mod storage;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OnceCell;
use tracing::instrument;

use config::{Config, StorageConfig};
use database::entity::datafile::DataFileModel;
use database::entity::dataset::DataSetModel;
use database::entity::dataversion::DataVersionModel;
use database::migration::{Migrator, MigratorTrait};
use database::{CatalogDatabase, CatalogStore};
use error::{CatalogError, CatalogResult, EntityKind};
use factory::{
    DataFileFactory, DataSetFactory, DataVersionFactory, NewDataFile, NewDataSet, NewDataVersion,
};
use services::{IntegrityService, LineageService};
use storage::{LocalGateway, StorageGateway};

/// A data catalog.
///
/// Everything is set up on first use. [`Catalog::close`] releases the
/// connection pool, and the next call sets things up again.
#[derive(Debug)]
pub struct Catalog {
    /// The catalog configuration.
    config: Config,

    /// A gateway supplied by the caller, used instead of the configured one.
    gateway_override: Option<Arc<dyn StorageGateway>>,

    /// Handle to the database.
    store: OnceCell<CatalogStore>,

    /// Handle to the storage gateway.
    storage: OnceCell<Arc<dyn StorageGateway>>,

    dataset_factory: OnceCell<DataSetFactory>,
    datafile_factory: OnceCell<DataFileFactory>,
    version_factory: OnceCell<DataVersionFactory>,
    lineage: OnceCell<LineageService>,
    integrity: OnceCell<IntegrityService>,
}

impl Catalog {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            gateway_override: None,
            store: OnceCell::new(),
            storage: OnceCell::new(),
            dataset_factory: OnceCell::new(),
            datafile_factory: OnceCell::new(),
            version_factory: OnceCell::new(),
            lineage: OnceCell::new(),
            integrity: OnceCell::new(),
        }
    }

    /// Creates a catalog that moves content through the given gateway.
    pub fn with_gateway(config: Config, gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway_override: Some(gateway),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a handle to the catalog store.
    pub async fn store(&self) -> CatalogResult<&CatalogStore> {
        self.store
            .get_or_try_init(|| async {
                tracing::debug!("Connecting to the catalog database");

                let store = CatalogStore::connect(&self.config.database).await?;
                Ok(store.with_defaults(self.config.defaults.clone()))
            })
            .await
    }

    /// Returns a handle to the storage gateway.
    pub async fn storage(&self) -> CatalogResult<&Arc<dyn StorageGateway>> {
        self.storage
            .get_or_try_init(|| async {
                if let Some(gateway) = &self.gateway_override {
                    return Ok(gateway.clone());
                }

                match &self.config.storage {
                    StorageConfig::Local(local_config) => {
                        let local = LocalGateway::new(local_config.clone()).await?;
                        let gateway: Arc<dyn StorageGateway> = Arc::new(local);
                        Ok(gateway)
                    }
                }
            })
            .await
    }

    pub async fn dataset_factory(&self) -> &DataSetFactory {
        self.dataset_factory
            .get_or_init(|| async { DataSetFactory::new(&self.config.defaults) })
            .await
    }

    pub async fn datafile_factory(&self) -> &DataFileFactory {
        self.datafile_factory
            .get_or_init(|| async { DataFileFactory })
            .await
    }

    pub async fn version_factory(&self) -> &DataVersionFactory {
        self.version_factory
            .get_or_init(|| async { DataVersionFactory::new(&self.config.defaults) })
            .await
    }

    pub async fn lineage(&self) -> CatalogResult<&LineageService> {
        self.lineage
            .get_or_try_init(|| async { Ok(LineageService::new(self.store().await?.clone())) })
            .await
    }

    pub async fn integrity(&self) -> CatalogResult<&IntegrityService> {
        self.integrity
            .get_or_try_init(|| async {
                let storage = self.storage().await?.clone();
                Ok(IntegrityService::new(storage, self.config.integrity.concurrency))
            })
            .await
    }

    /// Creates a data set.
    ///
    /// Fails with `DuplicateName` if the name is taken, even by a deleted
    /// data set.
    #[instrument(skip_all, fields(dataset = %new.name))]
    pub async fn create_dataset(&self, new: NewDataSet) -> CatalogResult<DataSetModel> {
        let dataset = self.dataset_factory().await.build(new)?;
        let store = self.store().await?;

        store
            .with_transaction::<_, ()>(|txn| {
                let dataset = dataset.clone();
                Box::pin(async move {
                    if txn.find_dataset_by_name(&dataset.name).await?.is_some() {
                        return Err(CatalogError::DuplicateName {
                            kind: EntityKind::DataSet,
                            name: dataset.name.clone(),
                        });
                    }

                    txn.save_dataset(&dataset).await
                })
            })
            .await?;

        tracing::info!("Created data set {}", dataset.id);

        Ok(dataset)
    }

    /// Adds a file to a data set, using the catalog's file factory.
    pub async fn add_file(
        &self,
        dataset: &DataSetModel,
        new: NewDataFile,
    ) -> CatalogResult<DataFileModel> {
        let store = self.store().await?;
        let factory = self.datafile_factory().await;

        dataset.add_file_with(store, factory, new).await
    }

    /// Adds a version to a data file, using the catalog's version factory.
    ///
    /// Configured defaults such as the hash algorithm of drafts come from
    /// the catalog configuration.
    pub async fn add_version(
        &self,
        datafile: &DataFileModel,
        new: NewDataVersion<'_>,
    ) -> CatalogResult<DataVersionModel> {
        let store = self.store().await?;
        let factory = self.version_factory().await;

        datafile.add_version_with(store, factory, new).await
    }

    /// Finds a data set by name, deleted or not.
    pub async fn get_dataset(&self, name: &str) -> CatalogResult<DataSetModel> {
        self.store()
            .await?
            .find_dataset_by_name(name)
            .await?
            .ok_or_else(|| CatalogError::not_found(EntityKind::DataSet, name))
    }

    pub async fn get_dataset_by_id(&self, id: &str) -> CatalogResult<DataSetModel> {
        self.store()
            .await?
            .find_dataset(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(EntityKind::DataSet, id))
    }

    /// Lists data sets ordered by name.
    pub async fn list_datasets(&self, include_deleted: bool) -> CatalogResult<Vec<DataSetModel>> {
        self.store().await?.list_datasets(include_deleted).await
    }

    pub async fn get_datafile(&self, id: &str) -> CatalogResult<DataFileModel> {
        self.store()
            .await?
            .find_datafile(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(EntityKind::DataFile, id))
    }

    pub async fn get_version(&self, id: &str) -> CatalogResult<DataVersionModel> {
        self.store()
            .await?
            .find_version(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(EntityKind::DataVersion, id))
    }

    /// Releases the connection pool and every cached component.
    ///
    /// A gateway passed to [`Catalog::with_gateway`] is kept.
    pub async fn close(&mut self) -> CatalogResult<()> {
        self.lineage.take();
        self.integrity.take();
        self.dataset_factory.take();
        self.datafile_factory.take();
        self.version_factory.take();
        self.storage.take();

        if let Some(store) = self.store.take() {
            store.close().await?;
            tracing::debug!("Closed the catalog database");
        }

        Ok(())
    }
}

/// Runs database migrations.
pub async fn run_migrations(config: Config) -> Result<()> {
    eprintln!("Running migrations...");

    let mut database = config.database.clone();
    database.auto_migrate = false;

    let store = CatalogStore::connect(&database).await?;
    Migrator::up(&*store, None).await?;
    store.close().await?;

    Ok(())
}
