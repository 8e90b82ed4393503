use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "1719792100000-RenameUsageTrackingToOrganizationUsage"
    }
}

const FROM: &str = "usage_tracking";
const TO: &str = "organization_usage";

fn rename_statements(from: &str, to: &str) -> Vec<String> {
    vec![
        format!(r#"ALTER TABLE "{from}" RENAME TO "{to}""#),
        format!(
            r#"ALTER INDEX IF EXISTS "UQ_{from}_organizationId_featureKey" RENAME TO "UQ_{to}_organizationId_featureKey""#
        ),
        format!(
            r#"ALTER INDEX IF EXISTS "IDX_{from}_organizationId" RENAME TO "IDX_{to}_organizationId""#
        ),
        format!(
            r#"ALTER TABLE "{to}" RENAME CONSTRAINT "FK_{from}_organizationId" TO "FK_{to}_organizationId""#
        ),
    ]
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in rename_statements(FROM, TO) {
            conn.execute_unprepared(&sql).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in rename_statements(TO, FROM) {
            conn.execute_unprepared(&sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_table_before_its_constraints() {
        let up = rename_statements(FROM, TO);
        assert_eq!(
            up[0],
            r#"ALTER TABLE "usage_tracking" RENAME TO "organization_usage""#
        );
        assert!(up[3].starts_with(r#"ALTER TABLE "organization_usage" RENAME CONSTRAINT"#));
        assert!(up[3].ends_with(r#"TO "FK_organization_usage_organizationId""#));
    }
}
