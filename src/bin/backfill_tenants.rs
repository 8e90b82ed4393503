use std::{path::PathBuf, process::ExitCode};

use aarogentix::{commands, logging::setup_log};
use aarogentix_db::{DatabaseConfig, DbApi};

#[tokio::main]
async fn main() -> ExitCode {
    let log_dir = std::env::var_os("AAROGENTIX_LOG_DIR").map(PathBuf::from);
    let _guard = match setup_log("aarogentix-backfill-tenants", false, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to set up logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let db = DbApi::new(&config).await?;
    commands::backfill_tenants(&db).await?;
    Ok(())
}
