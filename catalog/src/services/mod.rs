//! Catalog-wide services.

mod integrity;
mod lineage;


pub use self::integrity::IntegrityService;
pub use self::lineage::LineageService;
