//! Readings command - fetch once and show what the sensors would publish.

use anyhow::Result;
use clap::Args;
use eau3f_core::{ConfigEntry, EntryStore};
use eau3f_integration::{ReauthenticatingSource, UpdateCoordinator, WaterSensor};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Stores, select_entries};
use crate::output::{JsonFormatter, ReadingsOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the readings command.
#[derive(Args, Default)]
pub struct ReadingsArgs {
    /// Entry id, contract id or title (default: every entry).
    #[arg(long, short)]
    pub entry: Option<String>,

    /// Include the statistics that would be imported.
    #[arg(long)]
    pub history: bool,
}

/// Runs the readings command.
///
/// Each entry goes through the same silent re-login as the bridge, so a
/// refreshed token is saved.
pub async fn run(args: &ReadingsArgs, cli: &Cli) -> Result<()> {
    let stores = Stores::load().await?;
    let settings = stores.effective_settings().await;
    let entries = select_entries(stores.entries.as_ref(), args.entry.as_deref()).await?;

    info!(entries = entries.len(), "Fetching readings");

    let outputs: Vec<ReadingsOutput> = join_all(entries.iter().map(|entry| {
        fetch_entry(
            entry,
            &settings.api_base_url,
            stores.entry_store(),
            settings.scan_interval(),
            args.history,
        )
    }))
    .await
    .into_iter()
    .collect::<Result<_>>()?;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = outputs
                .iter()
                .map(|output| formatter.format_readings(output))
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_readings(&outputs)?);
        }
    }

    // Report the first failure so the exit code reflects it.
    if let Some(failure) = outputs.into_iter().find_map(|output| output.failure) {
        return Err(failure.into());
    }

    Ok(())
}

async fn fetch_entry(
    entry: &ConfigEntry,
    api_base_url: &str,
    entries: Arc<dyn EntryStore>,
    interval: std::time::Duration,
    with_history: bool,
) -> Result<ReadingsOutput> {
    let source = ReauthenticatingSource::from_entry(api_base_url, entries, entry)?;
    let coordinator = UpdateCoordinator::new(entry.title.clone(), Arc::new(source), interval);

    if let Err(e) = coordinator.refresh().await {
        debug!(entry = %entry.title, error = %e, "Fetch failed");
    }

    let snapshot = coordinator.snapshot();
    let sensors = WaterSensor::detect(&entry.data.contract_id, &snapshot.readings, entry.data.price());
    Ok(ReadingsOutput::new(entry, &snapshot, &sensors, with_history))
}
