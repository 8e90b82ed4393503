use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CRATES: &[&str] = &["aarogentix", "aarogentix_db", "aarogentix_db_migration"];

/// Default directives with `RUST_LOG` appended, so it can override any of them.
fn filter_directives(verbose: bool, rust_log: &str) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.push("sea_orm_migration=info".to_string());
    if !rust_log.is_empty() {
        directives.push(rust_log.to_string());
    }
    directives.join(",")
}

/// Console output goes to stderr. With `log_dir`, a daily rotated file is
/// written as well; keep the returned guard alive until exit so it is flushed.
pub fn setup_log(
    file_prefix: &str,
    verbose: bool,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let var = std::env::var("RUST_LOG").unwrap_or_default();
    let filter = EnvFilter::builder().parse_lossy(filter_directives(verbose, &var));

    let console_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("failed to create log directory at {}", dir.display())
            })?;
            let file_appender = tracing_appender::rolling::Builder::new()
                .max_log_files(30)
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(format!("{file_prefix}.log"))
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::debug!("writing logs to {}", dir.display());
    }
    Ok(guard)
}
