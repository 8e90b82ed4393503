use aarogentix_db_migration::{
    order::plan_pending, Migrator, SqlTenantSchema, DEFAULT_ORGANIZATION_SLUG,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;
use sqlx::PgPool;
use tracing::info;

use crate::{
    backfill::{BackfillError, BackfillReport, TenantBackfill},
    config::DatabaseConfig,
    entities::organization,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub name: String,
    /// `None` while the unit is pending.
    pub applied_at: Option<DateTime<Utc>>,
    pub applied: bool,
}

pub struct DbApi {
    pub conn: DatabaseConnection,
    pub pool: Option<PgPool>,
}

// units run strictly one after another, so a single connection is enough
async fn connect_db(conn_url: &str) -> Result<PgPool> {
    let pool: PgPool = sqlx::pool::PoolOptions::new()
        .max_connections(1)
        .connect(conn_url)
        .await?;
    Ok(pool)
}

impl DbApi {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_db(&config.url())
            .await
            .with_context(|| format!("failed to connect to {}", config.redacted_url()))?;
        let conn = sea_orm::SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone());
        Ok(DbApi {
            conn,
            pool: Some(pool),
        })
    }

    /// Apply every pending unit in ascending identifier order. Returns the
    /// names that were applied.
    pub async fn migrate(&self) -> Result<Vec<String>> {
        let pending = self.pending_migrations().await?;
        if pending.is_empty() {
            info!("schema is up to date");
            return Ok(pending);
        }
        for name in &pending {
            info!("pending migration {name}");
        }
        Migrator::up(&self.conn, None)
            .await
            .context("migration failed, the failing unit was not recorded")?;
        info!("applied {} migrations", pending.len());
        Ok(pending)
    }

    /// Names of the units that `migrate` would apply, after checking that
    /// applying them keeps the history in order.
    pub async fn pending_migrations(&self) -> Result<Vec<String>> {
        let names = Migrator::names();
        let known: Vec<&str> = names.iter().map(String::as_str).collect();
        let applied: Vec<String> = self
            .applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.name)
            .collect();
        Ok(plan_pending(&known, &applied)?)
    }

    /// Revert the `steps` most recently applied units.
    pub async fn rollback(&self, steps: u32) -> Result<Vec<String>> {
        let mut applied = self.applied_migrations().await?;
        applied.sort_by(|a, b| b.name.cmp(&a.name));
        let reverted: Vec<String> = applied
            .into_iter()
            .take(steps as usize)
            .map(|m| m.name)
            .collect();
        if reverted.is_empty() {
            info!("nothing to revert");
            return Ok(reverted);
        }
        for name in &reverted {
            info!("reverting migration {name}");
        }
        Migrator::down(&self.conn, Some(steps))
            .await
            .context("failed to revert migrations")?;
        Ok(reverted)
    }

    /// Rows of `seaql_migrations`. sea-orm-migration creates that table when it
    /// is missing, so even a read of the history writes to a fresh database.
    pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        let models = Migrator::get_migration_models(&self.conn)
            .await
            .context("failed to read the migration history")?;
        Ok(models
            .into_iter()
            .map(|m| AppliedMigration {
                name: m.version,
                applied_at: DateTime::from_timestamp(m.applied_at, 0),
            })
            .collect())
    }

    /// Every unit this build knows, in application order, with its state.
    pub async fn migration_status(&self) -> Result<Vec<MigrationState>> {
        let applied = self.applied_migrations().await?;
        Ok(migration_states(Migrator::names(), &applied))
    }

    /// The organization every pre-tenant row is assigned to, if it was seeded.
    pub async fn default_organization(&self) -> Result<Option<organization::Model>> {
        let model = organization::Entity::find()
            .filter(organization::Column::Slug.eq(DEFAULT_ORGANIZATION_SLUG))
            .one(&self.conn)
            .await?;
        Ok(model)
    }

    pub async fn backfill_tenants(&self) -> Result<BackfillReport, BackfillError> {
        let schema = SqlTenantSchema::new(&self.conn);
        TenantBackfill::new(&schema).run().await
    }
}

fn migration_states(names: Vec<String>, applied: &[AppliedMigration]) -> Vec<MigrationState> {
    names
        .into_iter()
        .map(|name| {
            let record = applied.iter().find(|m| m.name == name);
            MigrationState {
                applied: record.is_some(),
                applied_at: record.and_then(|m| m.applied_at),
                name,
            }
        })
        .collect()
}
