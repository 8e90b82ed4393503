use sea_orm_migration::prelude::*;
use tracing::info;

use crate::tenant::{
    ensure_tenant_column, SqlTenantSchema, TenantSchema, DEFAULT_ORGANIZATION_SLUG,
};

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1709251300000-AddOrganizationIdToTenantTables"
    }
}

/// Tenant-scoped tables that exist at this point of the history. Billing tables
/// are created later with the column already in place.
pub const TABLES: &[&str] = &[
    "patients",
    "doctors",
    "appointments",
    "medical_records",
    "invoices",
    "lab_tests",
    "medicines",
    "staff",
    "inventory",
    "wards",
    "beds",
    "admissions",
    "operation_theaters",
    "surgeries",
    "radiology_requests",
    "expenses",
    "revenue",
    "compliance_records",
    "data_access_logs",
    "users",
    "audit_logs",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = SqlTenantSchema::new(manager.get_connection());
        let organization_id = schema
            .organization_id_by_slug(DEFAULT_ORGANIZATION_SLUG)
            .await?
            .ok_or_else(|| {
                DbErr::Custom(format!(
                    "default organization `{DEFAULT_ORGANIZATION_SLUG}` does not exist"
                ))
            })?;

        for table in TABLES {
            let outcome = ensure_tenant_column(&schema, table, organization_id).await?;
            info!(
                "{table}: tenant column ready, {} rows assigned to {DEFAULT_ORGANIZATION_SLUG}",
                outcome.rows_backfilled
            );
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = SqlTenantSchema::new(manager.get_connection());
        for table in TABLES.iter().rev() {
            schema.drop_tenant_column(table).await?;
        }
        Ok(())
    }
}
