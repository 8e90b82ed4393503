use aarogentix_db_migration::{
    ensure_tenant_column, SchemaError, TenantColumnOutcome, TenantSchema,
    DEFAULT_ORGANIZATION_SLUG, TENANT_SCOPED_TABLES,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("default organization `{0}` does not exist, run the migrations first")]
    MissingDefaultOrganization(String),
    #[error("failed to look up the default organization")]
    Lookup(#[source] SchemaError),
    #[error("failed to backfill `{table}`")]
    Table {
        table: String,
        #[source]
        source: SchemaError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub organization_id: Uuid,
    pub tables: Vec<(String, TenantColumnOutcome)>,
    /// Listed tables that do not exist in this database.
    pub skipped: Vec<String>,
}

impl BackfillReport {
    pub fn changed_tables(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .filter(|(_, outcome)| outcome.changed())
            .map(|(table, _)| table.as_str())
    }

    pub fn rows_backfilled(&self) -> u64 {
        self.tables
            .iter()
            .map(|(_, outcome)| outcome.rows_backfilled)
            .sum()
    }
}

/// Assigns every row without a tenant to the default organization and brings
/// each tenant-scoped table to its final shape. Runs outside the migration
/// history and can be repeated.
pub struct TenantBackfill<'a, S: ?Sized> {
    schema: &'a S,
    tables: &'a [&'a str],
}

impl<'a, S> TenantBackfill<'a, S>
where
    S: TenantSchema + ?Sized,
{
    pub fn new(schema: &'a S) -> Self {
        Self {
            schema,
            tables: TENANT_SCOPED_TABLES,
        }
    }

    pub fn with_tables(mut self, tables: &'a [&'a str]) -> Self {
        self.tables = tables;
        self
    }

    pub async fn run(&self) -> Result<BackfillReport, BackfillError> {
        let organization_id = self
            .schema
            .organization_id_by_slug(DEFAULT_ORGANIZATION_SLUG)
            .await
            .map_err(BackfillError::Lookup)?
            .ok_or_else(|| {
                BackfillError::MissingDefaultOrganization(DEFAULT_ORGANIZATION_SLUG.to_string())
            })?;
        info!("backfilling tenant tables with organization {organization_id}");

        let mut report = BackfillReport {
            organization_id,
            ..Default::default()
        };
        for table in self.tables {
            let table_error = |source: SchemaError| BackfillError::Table {
                table: table.to_string(),
                source,
            };
            if !self.schema.has_table(table).await.map_err(table_error)? {
                warn!("{table} does not exist, skipping");
                report.skipped.push(table.to_string());
                continue;
            }

            let outcome = ensure_tenant_column(self.schema, table, organization_id)
                .await
                .map_err(table_error)?;
            if outcome.changed() {
                info!(
                    "{table}: {} rows backfilled, column added: {}, set not null: {}, foreign key added: {}",
                    outcome.rows_backfilled,
                    outcome.column_added,
                    outcome.tightened,
                    outcome.foreign_key_added
                );
            } else {
                debug!("{table}: already tenant scoped");
            }
            report.tables.push((table.to_string(), outcome));
        }

        info!(
            "tenant backfill finished: {} rows across {} changed tables",
            report.rows_backfilled(),
            report.changed_tables().count()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use aarogentix_db_migration::tests::{MemorySchema, Phase};

    use super::*;

    fn seeded() -> (MemorySchema, Uuid) {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        (schema, org)
    }

    #[tokio::test]
    async fn missing_default_organization_mutates_nothing() {
        let schema = MemorySchema::new();
        schema.create_table("patients", 2);

        let err = TenantBackfill::new(&schema).run().await.unwrap_err();
        assert!(matches!(err, BackfillError::MissingDefaultOrganization(_)));
        assert!(schema.mutations().is_empty());
        assert_eq!(schema.table("patients").unwrap().rows, vec![None, None]);
    }

    #[tokio::test]
    async fn every_listed_table_ends_tenant_scoped() {
        let (schema, org) = seeded();
        for (i, table) in TENANT_SCOPED_TABLES.iter().enumerate() {
            schema.create_table(table, i % 4);
        }

        let report = TenantBackfill::new(&schema).run().await.unwrap();
        assert_eq!(report.organization_id, org);
        assert_eq!(report.tables.len(), TENANT_SCOPED_TABLES.len());
        assert!(report.skipped.is_empty());

        for table in TENANT_SCOPED_TABLES {
            let table = schema.table(table).unwrap();
            assert!(table.rows.iter().all(|row| *row == Some(org)));
            assert!(table.not_null && table.index && table.foreign_key);
        }
    }

    #[tokio::test]
    async fn second_run_reports_no_changes() {
        let (schema, _) = seeded();
        schema.create_table("patients", 3);
        schema.create_tenant_table("payments", vec![None]);
        let tables = ["patients", "payments"];

        let first = TenantBackfill::new(&schema)
            .with_tables(&tables)
            .run()
            .await
            .unwrap();
        assert_eq!(first.rows_backfilled(), 4);
        assert_eq!(first.changed_tables().collect::<Vec<_>>(), tables);

        let mutations = schema.mutations().len();
        let second = TenantBackfill::new(&schema)
            .with_tables(&tables)
            .run()
            .await
            .unwrap();
        assert_eq!(second.changed_tables().count(), 0);
        assert_eq!(second.rows_backfilled(), 0);
        // backfill and index statements still run, but touch nothing
        assert!(schema.mutations()[mutations..]
            .iter()
            .all(|(phase, _)| matches!(phase, Phase::Backfill | Phase::CreateIndex)));
    }

    #[tokio::test]
    async fn missing_tables_are_skipped() {
        let (schema, _) = seeded();
        schema.create_table("patients", 1);

        let report = TenantBackfill::new(&schema)
            .with_tables(&["patients", "organization_usage"])
            .run()
            .await
            .unwrap();
        assert_eq!(report.skipped, vec!["organization_usage".to_string()]);
        assert_eq!(report.tables.len(), 1);
    }

    #[tokio::test]
    async fn failure_halts_remaining_tables() {
        let (schema, _) = seeded();
        schema.create_table("patients", 1);
        schema.create_table("doctors", 1);
        schema.fail(Phase::SetNotNull, "patients", false);

        let err = TenantBackfill::new(&schema)
            .with_tables(&["patients", "doctors"])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, BackfillError::Table { ref table, .. } if table == "patients"));
        assert!(!schema.table("doctors").unwrap().has_column);
    }

    #[tokio::test]
    async fn already_present_foreign_key_is_not_fatal() {
        let (schema, _) = seeded();
        schema.create_table("beds", 2);
        schema.fail(Phase::AddForeignKey, "beds", true);

        let report = TenantBackfill::new(&schema)
            .with_tables(&["beds"])
            .run()
            .await
            .unwrap();
        assert!(report.tables[0].1.tightened);
    }
}
