//! Database entities.
//!
//! We use SeaORM and target SQLite (embedded catalogs) and PostgreSQL
//! (shared catalogs).
//!
//! The models double as the in-memory records handed out by the catalog.
//! Their lifecycle operations live in [`crate::ops`].

pub mod datafile;
pub mod dataset;
pub mod dataversion;

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::entity::Value;
use sea_orm::sea_query::{ArrayType, ColumnType, ValueType, ValueTypeErr};
use sea_orm::{QueryResult, TryGetError, TryGetable};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult, EntityKind};

/// Free-form metadata attached to records.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A value that is stored in the database as JSON text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json<T>(pub T);

/// Lifecycle status of data sets and data files.
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum EntityStatus {
    /// The record is live.
    #[sea_orm(string_value = "ACTIVE")]
    Active,

    /// The record has been soft-deleted.
    ///
    /// Deleted records stay in the catalog so that history and lineage
    /// remain resolvable, and their names stay taken.
    #[sea_orm(string_value = "DELETED")]
    Deleted,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Deleted => "DELETED",
        }
    }

    /// Checks a status change, returning the new status.
    ///
    /// Deleting is idempotent. Nothing leaves `Deleted`.
    pub fn transition_to(self, kind: EntityKind, target: Self) -> CatalogResult<Self> {
        match (self, target) {
            (Self::Active, _) | (Self::Deleted, Self::Deleted) => Ok(target),
            (Self::Deleted, Self::Active) => Err(CatalogError::InvalidStatusTransition {
                kind,
                from: self.as_str(),
                to: target.as_str(),
            }),
        }
    }
}

/// Returns the current time at the precision the database round-trips.
pub(crate) fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl<T: Serialize + DeserializeOwned> From<Json<T>> for Value {
    fn from(value: Json<T>) -> Self {
        let opt = serde_json::to_string(&value).ok().map(Box::new);

        Value::String(opt)
    }
}

impl<T: Serialize + DeserializeOwned> TryGetable for Json<T> {
    fn try_get_by<I: sea_orm::ColIdx>(res: &QueryResult, idx: I) -> Result<Self, TryGetError> {
        let json_str: String = res.try_get_by(idx).map_err(TryGetError::DbErr)?;

        serde_json::from_str(&json_str).map_err(|e| TryGetError::DbErr(DbErr::Json(e.to_string())))
    }
}

impl<T: Serialize + DeserializeOwned> ValueType for Json<T> {
    fn try_from(v: Value) -> Result<Self, ValueTypeErr> {
        match v {
            Value::String(Some(x)) => Ok(Json(serde_json::from_str(&x).map_err(|_| ValueTypeErr)?)),
            _ => Err(ValueTypeErr),
        }
    }

    fn type_name() -> String {
        stringify!(Json<T>).to_owned()
    }

    fn column_type() -> ColumnType {
        ColumnType::Text
    }

    fn array_type() -> ArrayType {
        ArrayType::String
    }
}
