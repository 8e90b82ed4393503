use aarogentix_db::{BackfillReport, DbApi};
use anyhow::{Context, Result};
use tracing::info;

pub async fn up(db: &DbApi) -> Result<()> {
    let applied = db.migrate().await?;
    for name in &applied {
        println!("applied {name}");
    }
    Ok(())
}

pub async fn down(db: &DbApi, steps: u32) -> Result<()> {
    let reverted = db.rollback(steps).await?;
    for name in &reverted {
        println!("reverted {name}");
    }
    Ok(())
}

pub async fn status(db: &DbApi) -> Result<()> {
    for state in db.migration_status().await? {
        match state.applied_at {
            Some(at) => println!("{:<60} applied {}", state.name, at.to_rfc3339()),
            None if state.applied => println!("{:<60} applied", state.name),
            None => println!("{:<60} pending", state.name),
        }
    }
    Ok(())
}

pub async fn backfill_tenants(db: &DbApi) -> Result<BackfillReport> {
    if let Some(org) = db.default_organization().await? {
        info!("assigning tenantless rows to {} ({:?})", org.name, org.status);
    }
    let report = db
        .backfill_tenants()
        .await
        .context("tenant backfill failed")?;
    for table in &report.skipped {
        info!("skipped missing table {table}");
    }
    info!(
        "{} rows assigned to organization {}",
        report.rows_backfilled(),
        report.organization_id
    );
    Ok(report)
}
