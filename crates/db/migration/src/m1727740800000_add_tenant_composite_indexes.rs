use sea_orm_migration::prelude::*;

use crate::schema;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1727740800000-AddTenantCompositeIndexes"
    }
}

/// Tenant-leading indexes for the hot listing queries.
pub const INDEXES: &[(&str, &[&str])] = &[
    ("appointments", &["organizationId", "appointmentDate"]),
    ("patients", &["organizationId", "createdAt"]),
    ("invoices", &["organizationId", "status"]),
    ("audit_logs", &["organizationId", "createdAt"]),
    ("data_access_logs", &["organizationId", "accessedAt"]),
    ("compliance_records", &["organizationId", "dueDate"]),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, columns) in INDEXES {
            manager
                .create_index(schema::index(table, columns))
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for (table, columns) in INDEXES.iter().rev() {
            conn.execute_unprepared(&format!(
                r#"DROP INDEX IF EXISTS "IDX_{table}_{}""#,
                columns.join("_")
            ))
            .await?;
        }
        Ok(())
    }
}
