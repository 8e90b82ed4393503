use sea_orm_migration::prelude::*;

use crate::m1709251200000_create_organizations::STATUS_ENUM;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1711929600000-ExtendOrganizationStatus"
    }
}

pub const ADDED_STATUSES: &[&str] = &["trial", "expired"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for status in ADDED_STATUSES {
            conn.execute_unprepared(&format!(
                r#"ALTER TYPE "public"."{STATUS_ENUM}" ADD VALUE IF NOT EXISTS '{status}'"#
            ))
            .await?;
        }
        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // PostgreSQL cannot drop a value from an enum type, `trial` and
        // `expired` stay in organizations_status_enum.
        Ok(())
    }
}
