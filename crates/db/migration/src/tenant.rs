use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr, RuntimeErr, Statement, Value};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_ORGANIZATION_SLUG: &str = "aarogentix-health";
pub const DEFAULT_ORGANIZATION_NAME: &str = "Aarogentix Health";

pub const TENANT_COLUMN: &str = "organizationId";

/// Every table that carries a mandatory `organizationId` once the tenant
/// retrofit has run.
pub const TENANT_SCOPED_TABLES: &[&str] = &[
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
    "subscriptions",
    "payments",
    "organization_usage",
];

// SQLSTATE codes meaning the object we tried to create is already there.
const DUPLICATE_COLUMN: &str = "42701";
const DUPLICATE_OBJECT: &str = "42710";
const DUPLICATE_TABLE: &str = "42P07";

pub fn tenant_index_name(table: &str) -> String {
    format!("IDX_{table}_{TENANT_COLUMN}")
}

pub fn tenant_foreign_key_name(table: &str) -> String {
    format!("FK_{table}_{TENANT_COLUMN}")
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl SchemaError {
    /// Classify a database error raised while creating `object`.
    pub fn classify(err: DbErr, object: impl Into<String>) -> Self {
        match sql_state(&err).as_deref() {
            Some(DUPLICATE_COLUMN | DUPLICATE_OBJECT | DUPLICATE_TABLE) => {
                SchemaError::AlreadyExists(object.into())
            }
            _ => SchemaError::Db(err),
        }
    }
}

impl From<SchemaError> for DbErr {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Db(err) => err,
            SchemaError::AlreadyExists(object) => DbErr::Custom(format!("{object} already exists")),
        }
    }
}

pub fn sql_state(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(err) => err
            .as_database_error()
            .and_then(|err| err.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

/// The schema operations the tenant retrofit is made of. Probes never mutate;
/// each mutating operation is one statement.
#[async_trait]
pub trait TenantSchema: Sync {
    async fn organization_id_by_slug(&self, slug: &str) -> Result<Option<Uuid>, SchemaError>;

    async fn has_table(&self, table: &str) -> Result<bool, SchemaError>;

    async fn has_tenant_column(&self, table: &str) -> Result<bool, SchemaError>;

    async fn tenant_column_nullable(&self, table: &str) -> Result<bool, SchemaError>;

    async fn has_tenant_foreign_key(&self, table: &str) -> Result<bool, SchemaError>;

    async fn add_nullable_tenant_column(&self, table: &str) -> Result<(), SchemaError>;

    /// Returns the number of rows that received the organization id.
    async fn backfill_tenant_column(
        &self,
        table: &str,
        organization_id: Uuid,
    ) -> Result<u64, SchemaError>;

    async fn set_tenant_column_not_null(&self, table: &str) -> Result<(), SchemaError>;

    async fn create_tenant_index(&self, table: &str) -> Result<(), SchemaError>;

    async fn add_tenant_foreign_key(&self, table: &str) -> Result<(), SchemaError>;

    async fn drop_tenant_column(&self, table: &str) -> Result<(), SchemaError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantColumnOutcome {
    pub column_added: bool,
    pub rows_backfilled: u64,
    pub tightened: bool,
    pub foreign_key_added: bool,
}

impl TenantColumnOutcome {
    pub fn changed(&self) -> bool {
        self.column_added || self.rows_backfilled > 0 || self.tightened || self.foreign_key_added
    }
}

/// Bring `table` to the tenant-scoped shape: nullable column, backfill with
/// `organization_id`, NOT NULL, index, foreign key. Safe to repeat.
pub async fn ensure_tenant_column<S>(
    schema: &S,
    table: &str,
    organization_id: Uuid,
) -> Result<TenantColumnOutcome, SchemaError>
where
    S: TenantSchema + ?Sized,
{
    let mut outcome = TenantColumnOutcome::default();

    if schema.has_tenant_column(table).await? {
        debug!("{table}.{TENANT_COLUMN} already present");
    } else {
        schema.add_nullable_tenant_column(table).await?;
        outcome.column_added = true;
    }

    outcome.rows_backfilled = schema
        .backfill_tenant_column(table, organization_id)
        .await?;

    if schema.tenant_column_nullable(table).await? {
        match schema.set_tenant_column_not_null(table).await {
            Ok(()) => outcome.tightened = true,
            Err(SchemaError::AlreadyExists(what)) => {
                info!("{what} already exists, treating {table} as NOT NULL")
            }
            Err(e) => return Err(e),
        }
    }

    match schema.create_tenant_index(table).await {
        Ok(()) => {}
        Err(SchemaError::AlreadyExists(what)) => info!("{what} already exists"),
        Err(e) => return Err(e),
    }

    if !schema.has_tenant_foreign_key(table).await? {
        match schema.add_tenant_foreign_key(table).await {
            Ok(()) => outcome.foreign_key_added = true,
            Err(SchemaError::AlreadyExists(what)) => info!("{what} already exists"),
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}

/// `TenantSchema` over any sea-orm connection, including the one a
/// `SchemaManager` hands to a migration.
pub struct SqlTenantSchema<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SqlTenantSchema<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    fn statement(&self, sql: &str, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(self.conn.get_database_backend(), sql, values)
    }

    async fn exists(&self, sql: &str, values: Vec<Value>) -> Result<bool, SchemaError> {
        Ok(self.conn.query_one(self.statement(sql, values)).await?.is_some())
    }

    async fn execute_ddl(&self, sql: &str, object: String) -> Result<(), SchemaError> {
        self.conn
            .execute_unprepared(sql)
            .await
            .map_err(|e| SchemaError::classify(e, object))?;
        Ok(())
    }
}

#[async_trait]
impl<C: ConnectionTrait> TenantSchema for SqlTenantSchema<'_, C> {
    async fn organization_id_by_slug(&self, slug: &str) -> Result<Option<Uuid>, SchemaError> {
        let row = self
            .conn
            .query_one(self.statement(
                r#"SELECT "id" FROM "organizations" WHERE "slug" = $1 LIMIT 1"#,
                vec![slug.into()],
            ))
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<Uuid>("", "id")?)),
            None => Ok(None),
        }
    }

    async fn has_table(&self, table: &str) -> Result<bool, SchemaError> {
        self.exists(
            r#"SELECT 1 AS "present" FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1"#,
            vec![table.into()],
        )
        .await
    }

    async fn has_tenant_column(&self, table: &str) -> Result<bool, SchemaError> {
        self.exists(
            r#"SELECT 1 AS "present" FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"#,
            vec![table.into(), TENANT_COLUMN.into()],
        )
        .await
    }

    async fn tenant_column_nullable(&self, table: &str) -> Result<bool, SchemaError> {
        let row = self
            .conn
            .query_one(self.statement(
                r#"SELECT "is_nullable" FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"#,
                vec![table.into(), TENANT_COLUMN.into()],
            ))
            .await?
            .ok_or_else(|| DbErr::Custom(format!("{table}.{TENANT_COLUMN} does not exist")))?;
        Ok(row.try_get::<String>("", "is_nullable")? == "YES")
    }

    async fn has_tenant_foreign_key(&self, table: &str) -> Result<bool, SchemaError> {
        self.exists(
            r#"SELECT 1 AS "present" FROM pg_constraint c JOIN pg_class t ON t.oid = c.conrelid JOIN pg_namespace n ON n.oid = t.relnamespace JOIN pg_class r ON r.oid = c.confrelid JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = ANY (c.conkey) WHERE c.contype = 'f' AND n.nspname = current_schema() AND t.relname = $1 AND a.attname = $2 AND r.relname = 'organizations' LIMIT 1"#,
            vec![table.into(), TENANT_COLUMN.into()],
        )
        .await
    }

    async fn add_nullable_tenant_column(&self, table: &str) -> Result<(), SchemaError> {
        self.execute_ddl(
            &format!(r#"ALTER TABLE "{table}" ADD COLUMN "{TENANT_COLUMN}" uuid"#),
            format!("column {table}.{TENANT_COLUMN}"),
        )
        .await
    }

    async fn backfill_tenant_column(
        &self,
        table: &str,
        organization_id: Uuid,
    ) -> Result<u64, SchemaError> {
        let result = self
            .conn
            .execute(self.statement(
                &format!(
                    r#"UPDATE "{table}" SET "{TENANT_COLUMN}" = $1 WHERE "{TENANT_COLUMN}" IS NULL"#
                ),
                vec![organization_id.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_tenant_column_not_null(&self, table: &str) -> Result<(), SchemaError> {
        self.execute_ddl(
            &format!(r#"ALTER TABLE "{table}" ALTER COLUMN "{TENANT_COLUMN}" SET NOT NULL"#),
            format!("NOT NULL on {table}.{TENANT_COLUMN}"),
        )
        .await
    }

    async fn create_tenant_index(&self, table: &str) -> Result<(), SchemaError> {
        let index = tenant_index_name(table);
        self.execute_ddl(
            &format!(r#"CREATE INDEX IF NOT EXISTS "{index}" ON "{table}" ("{TENANT_COLUMN}")"#),
            format!("index {index}"),
        )
        .await
    }

    async fn add_tenant_foreign_key(&self, table: &str) -> Result<(), SchemaError> {
        let constraint = tenant_foreign_key_name(table);
        self.execute_ddl(
            &format!(
                r#"ALTER TABLE "{table}" ADD CONSTRAINT "{constraint}" FOREIGN KEY ("{TENANT_COLUMN}") REFERENCES "organizations"("id") ON DELETE CASCADE ON UPDATE NO ACTION"#
            ),
            format!("constraint {constraint}"),
        )
        .await
    }

    async fn drop_tenant_column(&self, table: &str) -> Result<(), SchemaError> {
        let constraint = tenant_foreign_key_name(table);
        let index = tenant_index_name(table);
        self.conn
            .execute_unprepared(&format!(
                r#"ALTER TABLE "{table}" DROP CONSTRAINT IF EXISTS "{constraint}""#
            ))
            .await?;
        self.conn
            .execute_unprepared(&format!(r#"DROP INDEX IF EXISTS "{index}""#))
            .await?;
        self.conn
            .execute_unprepared(&format!(
                r#"ALTER TABLE "{table}" DROP COLUMN IF EXISTS "{TENANT_COLUMN}""#
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use uuid::Uuid;

    use super::*;
    use crate::tests::{MemorySchema, Phase};

    fn present() -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("present", Value::from(1i32))])
    }

    fn none() -> Vec<BTreeMap<&'static str, Value>> {
        Vec::new()
    }

    #[tokio::test]
    async fn patients_get_the_three_phase_sequence() {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        schema.create_table("patients", 3);

        let outcome = ensure_tenant_column(&schema, "patients", org).await.unwrap();
        assert_eq!(
            outcome,
            TenantColumnOutcome {
                column_added: true,
                rows_backfilled: 3,
                tightened: true,
                foreign_key_added: true,
            }
        );

        let table = schema.table("patients").unwrap();
        assert_eq!(table.rows, vec![Some(org); 3]);
        assert!(table.has_column && table.not_null && table.index && table.foreign_key);
        assert_eq!(
            schema.mutations(),
            vec![
                (Phase::AddColumn, "patients".to_string()),
                (Phase::Backfill, "patients".to_string()),
                (Phase::SetNotNull, "patients".to_string()),
                (Phase::CreateIndex, "patients".to_string()),
                (Phase::AddForeignKey, "patients".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn keeps_existing_tenant_values() {
        let default_org = Uuid::new_v4();
        let other_org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, default_org);
        schema.insert_organization("city-clinic", other_org);
        schema.create_tenant_table("doctors", vec![Some(other_org), None]);

        let outcome = ensure_tenant_column(&schema, "doctors", default_org)
            .await
            .unwrap();
        assert!(!outcome.column_added);
        assert_eq!(outcome.rows_backfilled, 1);
        assert_eq!(
            schema.table("doctors").unwrap().rows,
            vec![Some(other_org), Some(default_org)]
        );
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        schema.create_table("wards", 2);

        let first = ensure_tenant_column(&schema, "wards", org).await.unwrap();
        let after_first = schema.table("wards").unwrap();
        let second = ensure_tenant_column(&schema, "wards", org).await.unwrap();

        assert!(first.changed());
        assert!(!second.changed());
        assert_eq!(schema.table("wards").unwrap(), after_first);
    }

    #[tokio::test]
    async fn duplicate_foreign_key_is_already_satisfied() {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        schema.create_table("beds", 1);
        schema.fail(Phase::AddForeignKey, "beds", true);

        let outcome = ensure_tenant_column(&schema, "beds", org).await.unwrap();
        assert!(outcome.tightened);
        assert!(!outcome.foreign_key_added);
    }

    #[tokio::test]
    async fn unrelated_failures_propagate() {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        schema.create_table("invoices", 4);
        schema.fail(Phase::Backfill, "invoices", false);

        let err = ensure_tenant_column(&schema, "invoices", org)
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Db(_)));
        assert!(!schema.table("invoices").unwrap().not_null);
    }

    #[tokio::test]
    async fn unrelated_tightening_failure_propagates() {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        schema.create_table("staff", 1);
        schema.fail(Phase::SetNotNull, "staff", false);

        let err = ensure_tenant_column(&schema, "staff", org).await.unwrap_err();
        assert!(matches!(err, SchemaError::Db(_)));
        assert!(!schema.table("staff").unwrap().foreign_key);
    }

    #[test]
    fn non_database_errors_are_not_already_exists() {
        let err = SchemaError::classify(DbErr::Custom("boom".into()), "index IDX_x");
        assert!(matches!(err, SchemaError::Db(_)));
    }

    #[tokio::test]
    async fn issues_statements_in_phase_order() {
        let org = Uuid::new_v4();
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![
                none(),
                vec![BTreeMap::from([("is_nullable", Value::from("YES"))])],
                none(),
            ])
            .append_exec_results(
                (0..5)
                    .map(|_| MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 3,
                    })
                    .collect::<Vec<_>>(),
            )
            .into_connection();

        let outcome = ensure_tenant_column(&SqlTenantSchema::new(&conn), "patients", org)
            .await
            .unwrap();
        assert_eq!(outcome.rows_backfilled, 3);

        let sql: Vec<String> = conn
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().iter().map(|stmt| stmt.sql.clone()))
            .filter(|sql| !sql.starts_with("SELECT"))
            .collect();
        assert_eq!(
            sql,
            vec![
                r#"ALTER TABLE "patients" ADD COLUMN "organizationId" uuid"#,
                r#"UPDATE "patients" SET "organizationId" = $1 WHERE "organizationId" IS NULL"#,
                r#"ALTER TABLE "patients" ALTER COLUMN "organizationId" SET NOT NULL"#,
                r#"CREATE INDEX IF NOT EXISTS "IDX_patients_organizationId" ON "patients" ("organizationId")"#,
                r#"ALTER TABLE "patients" ADD CONSTRAINT "FK_patients_organizationId" FOREIGN KEY ("organizationId") REFERENCES "organizations"("id") ON DELETE CASCADE ON UPDATE NO ACTION"#,
            ]
        );
    }

    #[tokio::test]
    async fn skips_satisfied_phases_on_tenant_ready_table() {
        let org = Uuid::new_v4();
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![
                vec![present()],
                vec![BTreeMap::from([("is_nullable", Value::from("NO"))])],
                vec![present()],
            ])
            .append_exec_results(
                (0..2)
                    .map(|_| MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    })
                    .collect::<Vec<_>>(),
            )
            .into_connection();

        let outcome = ensure_tenant_column(&SqlTenantSchema::new(&conn), "payments", org)
            .await
            .unwrap();
        assert!(!outcome.changed());

        let sql: Vec<String> = conn
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().iter().map(|stmt| stmt.sql.clone()))
            .filter(|sql| !sql.starts_with("SELECT"))
            .collect();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with(r#"UPDATE "payments""#));
        assert!(sql[1].starts_with("CREATE INDEX IF NOT EXISTS"));
    }

    #[tokio::test]
    async fn foreign_key_lookup_matches_any_constraint_name() {
        let org = Uuid::new_v4();
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![
                vec![present()],
                vec![BTreeMap::from([("is_nullable", Value::from("NO"))])],
                vec![present()],
            ])
            .append_exec_results(
                (0..2)
                    .map(|_| MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    })
                    .collect::<Vec<_>>(),
            )
            .into_connection();

        let outcome = ensure_tenant_column(&SqlTenantSchema::new(&conn), "beds", org)
            .await
            .unwrap();
        assert!(!outcome.foreign_key_added);

        let log = conn.into_transaction_log();
        let statements: Vec<_> = log.iter().flat_map(|txn| txn.statements().iter()).collect();
        let lookup = statements
            .iter()
            .find(|stmt| stmt.sql.contains("pg_constraint"))
            .unwrap();
        assert!(lookup.sql.contains("c.contype = 'f'"));
        assert!(lookup.sql.contains("r.relname = 'organizations'"));
        assert!(!lookup.sql.contains("conname"));
        assert_eq!(
            lookup.values.as_ref().map(|values| values.0.clone()),
            Some(vec![Value::from("beds"), Value::from(TENANT_COLUMN)])
        );
        assert!(statements
            .iter()
            .all(|stmt| !stmt.sql.contains("ADD CONSTRAINT")));
    }

    #[tokio::test]
    async fn dropped_tenant_column_can_be_restored() {
        let org = Uuid::new_v4();
        let schema = MemorySchema::new();
        schema.insert_organization(DEFAULT_ORGANIZATION_SLUG, org);
        schema.create_table("wards", 2);

        ensure_tenant_column(&schema, "wards", org).await.unwrap();
        let tenant_ready = schema.table("wards").unwrap();

        schema.drop_tenant_column("wards").await.unwrap();
        let dropped = schema.table("wards").unwrap();
        assert!(!dropped.has_column);
        assert!(!dropped.not_null && !dropped.index && !dropped.foreign_key);

        let outcome = ensure_tenant_column(&schema, "wards", org).await.unwrap();
        assert!(outcome.column_added && outcome.tightened && outcome.foreign_key_added);
        assert_eq!(outcome.rows_backfilled, 2);
        assert_eq!(schema.table("wards").unwrap(), tenant_ready);
    }
}
