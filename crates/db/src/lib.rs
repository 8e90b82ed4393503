pub mod api;
pub mod backfill;
pub mod config;
pub mod entities;

pub use api::DbApi;
pub use backfill::{BackfillError, BackfillReport, TenantBackfill};
pub use config::DatabaseConfig;
