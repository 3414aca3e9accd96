//! The catalog store.
//!
//! All queries are written once against [`ConnectionTrait`], so the same
//! [`CatalogDatabase`] methods work on a pooled connection and inside a
//! transaction.

pub mod entity;
pub mod migration;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::query::{QueryOrder, QuerySelect};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction,
    FromQueryResult, PaginatorTrait, TransactionError, TransactionTrait,
};
use tokio::time;

use crate::config::{DatabaseConfig, DefaultsConfig};
use crate::error::{is_unique_violation, CatalogError, CatalogResult, EntityKind};
use entity::datafile::{self, DataFileModel, Entity as DataFile};
use entity::dataset::{self, DataSetModel, Entity as DataSet};
use entity::dataversion::{self, DataVersionModel, Entity as DataVersion, VersionStatus};
use entity::EntityStatus;
use migration::{Migrator, MigratorTrait};
use quarry::version::VersionOrdinal;

/// A boxed future borrowing a transaction.
pub type TransactionFuture<'c, T> = Pin<Box<dyn Future<Output = CatalogResult<T>> + Send + 'c>>;

#[async_trait]
pub trait CatalogDatabase: Send + Sync {
    /// Inserts or updates a data set.
    ///
    /// Fails with `DuplicateName` if another data set has the same name.
    async fn save_dataset(&self, dataset: &DataSetModel) -> CatalogResult<()>;

    async fn find_dataset(&self, id: &str) -> CatalogResult<Option<DataSetModel>>;

    async fn find_dataset_by_name(&self, name: &str) -> CatalogResult<Option<DataSetModel>>;

    /// Lists data sets ordered by name.
    async fn list_datasets(&self, include_deleted: bool) -> CatalogResult<Vec<DataSetModel>>;

    /// Counts the data files of a data set that are not deleted.
    async fn count_live_files(&self, dataset_id: &str) -> CatalogResult<u64>;

    /// Inserts or updates a data file.
    ///
    /// Fails with `DuplicateName` if the data set already has a file with
    /// the same name, and with `ConstraintViolation` if the data set does
    /// not exist.
    async fn save_datafile(&self, datafile: &DataFileModel) -> CatalogResult<()>;

    async fn find_datafile(&self, id: &str) -> CatalogResult<Option<DataFileModel>>;

    async fn find_datafile_by_name(
        &self,
        dataset_id: &str,
        name: &str,
    ) -> CatalogResult<Option<DataFileModel>>;

    /// Lists the files of a data set ordered by name.
    async fn list_datafiles(
        &self,
        dataset_id: &str,
        include_deleted: bool,
    ) -> CatalogResult<Vec<DataFileModel>>;

    /// Bumps the modification time of a data file.
    ///
    /// Inside a transaction, this takes the write lock that serializes
    /// version numbering for the file.
    async fn touch_datafile(&self, id: &str, at: DateTime<Utc>) -> CatalogResult<()>;

    /// Counts the versions of a data file that are not deleted.
    async fn count_live_versions(&self, datafile_id: &str) -> CatalogResult<u64>;

    /// Inserts or updates a version.
    ///
    /// Fails with `OrdinalConflict` if the ordinal is already taken.
    async fn save_version(&self, version: &DataVersionModel) -> CatalogResult<()>;

    async fn find_version(&self, id: &str) -> CatalogResult<Option<DataVersionModel>>;

    async fn find_version_by_ordinal(
        &self,
        datafile_id: &str,
        ordinal: VersionOrdinal,
    ) -> CatalogResult<Option<DataVersionModel>>;

    /// Returns the committed version with the highest ordinal.
    async fn find_latest_committed_version(
        &self,
        datafile_id: &str,
    ) -> CatalogResult<Option<DataVersionModel>>;

    /// Lists the versions of a data file in ordinal order.
    async fn list_versions(
        &self,
        datafile_id: &str,
        include_deleted: bool,
    ) -> CatalogResult<Vec<DataVersionModel>>;

    /// Returns the ordinal the next version of a data file would get.
    ///
    /// Deleted versions count, so ordinals are never handed out twice.
    async fn next_version_ordinal(&self, datafile_id: &str) -> CatalogResult<VersionOrdinal>;

    /// Walks `source_version_id` links starting at a version.
    ///
    /// The chain starts with the version itself and holds at most
    /// `max_depth` entries. An unknown start yields an empty chain.
    async fn lineage_chain(
        &self,
        version_id: &str,
        max_depth: usize,
    ) -> CatalogResult<Vec<DataVersionModel>>;

    /// Lists versions whose source is the given version, oldest first.
    async fn find_derived_versions(&self, version_id: &str) -> CatalogResult<Vec<DataVersionModel>>;
}

/// How transactions react to lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay. The n-th retry waits n times this long.
    pub backoff: Duration,
}

/// A handle to the catalog database.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    database: DatabaseConnection,
    retry: RetryPolicy,
    defaults: DefaultsConfig,
}

#[derive(Debug, FromQueryResult)]
struct MaxOrdinal {
    max_ordinal: Option<i32>,
}

impl CatalogStore {
    /// Connects to the database, migrating the schema if configured to.
    pub async fn connect(config: &DatabaseConfig) -> CatalogResult<Self> {
        let mut options = ConnectOptions::new(config.url.to_owned());
        options.sqlx_logging(false);

        if let Some(max_connections) = config.max_connections {
            options.max_connections(max_connections);
        }

        let database = Database::connect(options)
            .await
            .map_err(CatalogError::database_error)?;

        if config.auto_migrate {
            Migrator::up(&database, None)
                .await
                .map_err(CatalogError::database_error)?;
        }

        Ok(Self::from_connection(database, config.retry_policy()))
    }

    pub fn from_connection(database: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self {
            database,
            retry,
            defaults: DefaultsConfig::default(),
        }
    }

    /// Sets the defaults applied to records created through this store.
    pub fn with_defaults(mut self, defaults: DefaultsConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &DefaultsConfig {
        &self.defaults
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs a unit of work atomically.
    ///
    /// Either every write made through the transaction handle is committed
    /// or none is. When the work fails because of lock contention, it is run
    /// again up to the configured number of retries, after which `Busy` is
    /// returned. Other errors roll back and are returned as they are.
    ///
    /// The work may run more than once, so it must not have side effects
    /// outside the transaction.
    pub async fn with_transaction<F, T>(&self, work: F) -> CatalogResult<T>
    where
        F: for<'c> Fn(&'c DatabaseTransaction) -> TransactionFuture<'c, T> + Send + Sync,
        T: Send,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let result = self
                .database
                .transaction::<_, T, CatalogError>(&work)
                .await
                .map_err(|e| match e {
                    TransactionError::Connection(e) => CatalogError::database_error(e),
                    TransactionError::Transaction(e) => e,
                });

            match result {
                Err(e) if e.is_retryable() => {
                    if attempts > self.retry.max_retries {
                        tracing::warn!("Giving up after {} attempts: {}", attempts, e);
                        return Err(CatalogError::Busy { attempts });
                    }

                    let delay = self.retry.backoff * attempts;
                    tracing::debug!(
                        "Transaction attempt {} failed, retrying in {}: {}",
                        attempts,
                        humantime::format_duration(delay),
                        e
                    );
                    time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Closes the connection pool.
    pub async fn close(self) -> CatalogResult<()> {
        self.database
            .close()
            .await
            .map_err(CatalogError::database_error)
    }
}

impl Deref for CatalogStore {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.database
    }
}

#[async_trait]
impl<C> CatalogDatabase for C
where
    C: ConnectionTrait + Send + Sync,
{
    async fn save_dataset(&self, dataset: &DataSetModel) -> CatalogResult<()> {
        DataSet::insert(dataset.to_active_model())
            .on_conflict(
                OnConflict::column(dataset::Column::Id)
                    .update_columns([
                        dataset::Column::Name,
                        dataset::Column::Description,
                        dataset::Column::Project,
                        dataset::Column::Owner,
                        dataset::Column::Status,
                        dataset::Column::UpdatedAt,
                        dataset::Column::SharedMetadata,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CatalogError::DuplicateName {
                        kind: EntityKind::DataSet,
                        name: dataset.name.clone(),
                    }
                } else {
                    CatalogError::database_error(e)
                }
            })?;

        Ok(())
    }

    async fn find_dataset(&self, id: &str) -> CatalogResult<Option<DataSetModel>> {
        DataSet::find_by_id(id.to_owned())
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn find_dataset_by_name(&self, name: &str) -> CatalogResult<Option<DataSetModel>> {
        DataSet::find()
            .filter(dataset::Column::Name.eq(name))
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn list_datasets(&self, include_deleted: bool) -> CatalogResult<Vec<DataSetModel>> {
        let mut query = DataSet::find().order_by_asc(dataset::Column::Name);

        if !include_deleted {
            query = query.filter(dataset::Column::Status.ne(EntityStatus::Deleted));
        }

        query.all(self).await.map_err(CatalogError::database_error)
    }

    async fn count_live_files(&self, dataset_id: &str) -> CatalogResult<u64> {
        DataFile::find()
            .filter(datafile::Column::DatasetId.eq(dataset_id))
            .filter(datafile::Column::Status.ne(EntityStatus::Deleted))
            .count(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn save_datafile(&self, datafile: &DataFileModel) -> CatalogResult<()> {
        DataFile::insert(datafile.to_active_model())
            .on_conflict(
                OnConflict::column(datafile::Column::Id)
                    .update_columns([
                        datafile::Column::Name,
                        datafile::Column::Description,
                        datafile::Column::Owner,
                        datafile::Column::Status,
                        datafile::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CatalogError::DuplicateName {
                        kind: EntityKind::DataFile,
                        name: datafile.name.clone(),
                    }
                } else {
                    CatalogError::database_error(e)
                }
            })?;

        Ok(())
    }

    async fn find_datafile(&self, id: &str) -> CatalogResult<Option<DataFileModel>> {
        DataFile::find_by_id(id.to_owned())
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn find_datafile_by_name(
        &self,
        dataset_id: &str,
        name: &str,
    ) -> CatalogResult<Option<DataFileModel>> {
        DataFile::find()
            .filter(datafile::Column::DatasetId.eq(dataset_id))
            .filter(datafile::Column::Name.eq(name))
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn list_datafiles(
        &self,
        dataset_id: &str,
        include_deleted: bool,
    ) -> CatalogResult<Vec<DataFileModel>> {
        let mut query = DataFile::find()
            .filter(datafile::Column::DatasetId.eq(dataset_id))
            .order_by_asc(datafile::Column::Name);

        if !include_deleted {
            query = query.filter(datafile::Column::Status.ne(EntityStatus::Deleted));
        }

        query.all(self).await.map_err(CatalogError::database_error)
    }

    async fn touch_datafile(&self, id: &str, at: DateTime<Utc>) -> CatalogResult<()> {
        let update = DataFile::update_many()
            .col_expr(datafile::Column::UpdatedAt, Expr::value(at))
            .filter(datafile::Column::Id.eq(id))
            .exec(self)
            .await
            .map_err(CatalogError::database_error)?;

        if update.rows_affected == 0 {
            return Err(CatalogError::not_found(EntityKind::DataFile, id));
        }

        Ok(())
    }

    async fn count_live_versions(&self, datafile_id: &str) -> CatalogResult<u64> {
        DataVersion::find()
            .filter(dataversion::Column::DatafileId.eq(datafile_id))
            .filter(dataversion::Column::Status.ne(VersionStatus::Deleted))
            .count(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn save_version(&self, version: &DataVersionModel) -> CatalogResult<()> {
        DataVersion::insert(version.to_active_model())
            .on_conflict(
                OnConflict::column(dataversion::Column::Id)
                    .update_columns([
                        dataversion::Column::HashValue,
                        dataversion::Column::HashAlgorithm,
                        dataversion::Column::StorageAddress,
                        dataversion::Column::StorageKind,
                        dataversion::Column::Status,
                        dataversion::Column::Transformer,
                        dataversion::Column::UpdatedAt,
                        dataversion::Column::Metadata,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CatalogError::OrdinalConflict {
                        datafile_id: version.datafile_id.clone(),
                        ordinal: version.version_ordinal,
                    }
                } else {
                    CatalogError::database_error(e)
                }
            })?;

        Ok(())
    }

    async fn find_version(&self, id: &str) -> CatalogResult<Option<DataVersionModel>> {
        DataVersion::find_by_id(id.to_owned())
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn find_version_by_ordinal(
        &self,
        datafile_id: &str,
        ordinal: VersionOrdinal,
    ) -> CatalogResult<Option<DataVersionModel>> {
        DataVersion::find()
            .filter(dataversion::Column::DatafileId.eq(datafile_id))
            .filter(dataversion::Column::VersionOrdinal.eq(ordinal.as_i32()))
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn find_latest_committed_version(
        &self,
        datafile_id: &str,
    ) -> CatalogResult<Option<DataVersionModel>> {
        DataVersion::find()
            .filter(dataversion::Column::DatafileId.eq(datafile_id))
            .filter(dataversion::Column::Status.eq(VersionStatus::Committed))
            .order_by_desc(dataversion::Column::VersionOrdinal)
            .one(self)
            .await
            .map_err(CatalogError::database_error)
    }

    async fn list_versions(
        &self,
        datafile_id: &str,
        include_deleted: bool,
    ) -> CatalogResult<Vec<DataVersionModel>> {
        let mut query = DataVersion::find()
            .filter(dataversion::Column::DatafileId.eq(datafile_id))
            .order_by_asc(dataversion::Column::VersionOrdinal);

        if !include_deleted {
            query = query.filter(dataversion::Column::Status.ne(VersionStatus::Deleted));
        }

        query.all(self).await.map_err(CatalogError::database_error)
    }

    async fn next_version_ordinal(&self, datafile_id: &str) -> CatalogResult<VersionOrdinal> {
        let max = DataVersion::find()
            .select_only()
            .column_as(
                Expr::col(dataversion::Column::VersionOrdinal).max(),
                "max_ordinal",
            )
            .filter(dataversion::Column::DatafileId.eq(datafile_id))
            .into_model::<MaxOrdinal>()
            .one(self)
            .await
            .map_err(CatalogError::database_error)?
            .and_then(|row| row.max_ordinal);

        match max {
            Some(max) => Ok(VersionOrdinal::new(i64::from(max))?.next()?),
            None => Ok(VersionOrdinal::FIRST),
        }
    }

    async fn lineage_chain(
        &self,
        version_id: &str,
        max_depth: usize,
    ) -> CatalogResult<Vec<DataVersionModel>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(version_id.to_owned());

        while let Some(id) = next.take() {
            if chain.len() >= max_depth || !visited.insert(id.clone()) {
                break;
            }

            match self.find_version(&id).await? {
                Some(version) => {
                    next = version.source_version_id.clone();
                    chain.push(version);
                }
                None => break,
            }
        }

        Ok(chain)
    }

    async fn find_derived_versions(&self, version_id: &str) -> CatalogResult<Vec<DataVersionModel>> {
        DataVersion::find()
            .filter(dataversion::Column::SourceVersionId.eq(version_id))
            .order_by_asc(dataversion::Column::CreatedAt)
            .order_by_asc(dataversion::Column::Id)
            .all(self)
            .await
            .map_err(CatalogError::database_error)
    }
}
