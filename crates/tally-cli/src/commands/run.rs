use std::path::Path;
use std::time::Duration;

use crate::commands::common::{build_orchestrator, load_sync_config};
use crate::error::CliError;

pub async fn run_periodic(interval_secs: Option<u64>, db_path: &Path) -> Result<(), CliError> {
    let config = load_sync_config()?;
    let interval = resolve_interval(interval_secs, config.push_interval)?;
    let orchestrator = build_orchestrator(db_path, &config).await?;

    println!(
        "Pushing every {}s. Press Ctrl-C to stop.",
        interval.as_secs()
    );
    orchestrator
        .run_periodic(interval, async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Failed to listen for Ctrl-C");
            }
        })
        .await?;
    Ok(())
}

pub fn resolve_interval(
    interval_secs: Option<u64>,
    configured: Option<Duration>,
) -> Result<Duration, CliError> {
    match interval_secs {
        Some(0) => Err(CliError::Config(
            "--interval must be greater than zero".to_string(),
        )),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => configured.ok_or_else(|| {
            CliError::Config("Set --interval or TALLY_PUSH_INTERVAL_SECS".to_string())
        }),
    }
}
