pub use sea_orm_migration::prelude::*;

pub mod order;
mod schema;
pub mod tenant;

mod m1704067200000_initial_hospital_schema;
mod m1709251200000_create_organizations;
mod m1709251300000_add_organization_id_to_tenant_tables;
mod m1711929600000_extend_organization_status;
mod m1714521600000_create_rbac;
mod m1714521700000_rename_refresh_token_to_hash;
mod m1719792000000_create_subscription_schema;
mod m1719792100000_rename_usage_tracking_to_organization_usage;
mod m1719792200000_seed_trial_plan;
mod m1727740800000_add_tenant_composite_indexes;

pub use order::{MigrationId, OrderError};
pub use tenant::{
    ensure_tenant_column, SchemaError, SqlTenantSchema, TenantColumnOutcome, TenantSchema,
    DEFAULT_ORGANIZATION_NAME, DEFAULT_ORGANIZATION_SLUG, TENANT_SCOPED_TABLES,
};

pub struct Migrator;

impl Migrator {
    /// Every unit this build ships, declared in any order.
    fn units() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m1704067200000_initial_hospital_schema::Migration),
            Box::new(m1709251200000_create_organizations::Migration),
            Box::new(m1709251300000_add_organization_id_to_tenant_tables::Migration),
            Box::new(m1711929600000_extend_organization_status::Migration),
            Box::new(m1714521600000_create_rbac::Migration),
            Box::new(m1714521700000_rename_refresh_token_to_hash::Migration),
            Box::new(m1719792000000_create_subscription_schema::Migration),
            Box::new(m1719792100000_rename_usage_tracking_to_organization_usage::Migration),
            Box::new(m1719792200000_seed_trial_plan::Migration),
            Box::new(m1727740800000_add_tenant_composite_indexes::Migration),
        ]
    }

    /// Unit names in application order.
    pub fn names() -> Vec<String> {
        Self::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        let mut units = Self::units();
        // names are checked by unit tests, an invalid one keeps declaration order
        if let Err(e) = order::sort_by_id(&mut units, |m| m.name()) {
            tracing::error!("migration list is not orderable: {e}");
        }
        units
    }
}
