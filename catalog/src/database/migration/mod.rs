//! Database migrations.

pub use sea_orm_migration::*;

mod m20240301_000001_create_dataset_table;
mod m20240301_000002_create_datafile_table;
mod m20240301_000003_create_dataversion_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_dataset_table::Migration),
            Box::new(m20240301_000002_create_datafile_table::Migration),
            Box::new(m20240301_000003_create_dataversion_table::Migration),
        ]
    }
}
