//! Run command - poll the vendor API and publish to Home Assistant.

use anyhow::{Context, Result, bail};
use clap::Args;
use eau3f_core::{ConfigEntry, EntryState, EntryStore, SensorSink};
use eau3f_fetch::HomeAssistantSink;
use eau3f_integration::{LoadedEntry, LogSink, SetupContext, SetupError, setup_entry};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

use super::{Stores, select_entries};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Log what would be published instead of sending it to Home Assistant.
    #[arg(long)]
    pub dry_run: bool,

    /// Polling interval in seconds (overrides the settings).
    #[arg(long, short)]
    pub interval: Option<u64>,

    /// Seconds between setup retries of entries that are not ready.
    #[arg(long, default_value = "300")]
    pub retry_interval: u64,
}

/// Entries sorted by setup outcome.
#[derive(Default)]
struct SetupRound {
    loaded: Vec<LoadedEntry>,
    retry: Vec<ConfigEntry>,
    reauth: Vec<ConfigEntry>,
}

/// Runs the run command.
pub async fn run(args: &RunArgs, cli: &Cli) -> Result<()> {
    let stores = Stores::load().await?;
    let settings = stores.effective_settings().await;

    let scan_interval = args
        .interval
        .map_or_else(|| settings.scan_interval(), Duration::from_secs);
    if scan_interval.is_zero() || args.retry_interval == 0 {
        bail!("Intervals must be greater than zero");
    }

    let sink: Arc<dyn SensorSink> = if args.dry_run {
        info!("Dry run, sensor updates are only logged");
        Arc::new(LogSink)
    } else {
        let sink = HomeAssistantSink::from_config(
            settings.home_assistant.url.clone(),
            settings.home_assistant.token.clone(),
        )?;
        sink.check()
            .await
            .with_context(|| format!("Home Assistant at {} is not usable", sink.base_url()))?;
        Arc::new(sink)
    };

    let ctx = SetupContext {
        api_base_url: settings.api_base_url.clone(),
        entries: stores.entry_store(),
        sink,
        scan_interval,
    };

    let entries = select_entries(stores.entries.as_ref(), None).await?;
    info!(
        entries = entries.len(),
        interval_secs = scan_interval.as_secs(),
        "Starting bridge"
    );

    let round = set_up_all(entries, &ctx).await;
    report(&stores, &round, cli).await?;

    if round.loaded.is_empty() && round.retry.is_empty() {
        if round.reauth.is_empty() {
            bail!("No entry could be set up");
        }
        return Err(SetupError::ReauthRequired.into());
    }

    let SetupRound {
        mut loaded,
        mut retry,
        ..
    } = round;

    let retry_every = Duration::from_secs(args.retry_interval);
    let mut retry_ticker = interval_at(Instant::now() + retry_every, retry_every);
    retry_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutting down");
                break;
            }
            _ = retry_ticker.tick(), if !retry.is_empty() => {
                let pending = refreshed(&ctx, std::mem::take(&mut retry)).await;
                let round = set_up_all(pending, &ctx).await;
                loaded.extend(round.loaded);
                retry = round.retry;
            }
        }
    }

    for result in join_all(loaded.into_iter().map(LoadedEntry::unload)).await {
        if let Err(e) = result {
            warn!(error = %e, "Unload failed");
        }
    }

    Ok(())
}

/// Sets up every entry concurrently.
async fn set_up_all(entries: Vec<ConfigEntry>, ctx: &SetupContext) -> SetupRound {
    let results = join_all(entries.iter().map(|entry| setup_entry(entry, ctx))).await;

    let mut round = SetupRound::default();
    for (entry, result) in entries.into_iter().zip(results) {
        match result {
            Ok(loaded) => round.loaded.push(loaded),
            Err(e) if e.is_transient() => {
                warn!(entry = %entry.title, error = %e, "Entry not ready, will retry");
                round.retry.push(entry);
            }
            Err(SetupError::ReauthRequired) => {
                warn!(entry = %entry.title, "Entry needs `eau3f reauth`");
                round.reauth.push(entry);
            }
            Err(e) => {
                error!(entry = %entry.title, error = %e, "Entry setup failed");
                if let Err(e) = ctx.entries.set_state(&entry.entry_id, EntryState::SetupError).await {
                    warn!(entry = %entry.title, error = %e, "Failed to record entry state");
                }
            }
        }
    }
    round
}

/// Re-reads entries so a token saved in the meantime is used.
async fn refreshed(ctx: &SetupContext, entries: Vec<ConfigEntry>) -> Vec<ConfigEntry> {
    let mut current = Vec::with_capacity(entries.len());
    for entry in entries {
        match ctx.entries.get(&entry.entry_id).await {
            Some(entry) => current.push(entry),
            None => info!(entry = %entry.title, "Entry removed, not retrying"),
        }
    }
    current
}

async fn report(stores: &Stores, round: &SetupRound, cli: &Cli) -> Result<()> {
    if cli.quiet {
        return Ok(());
    }
    let entries = stores.entries.entries().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_entries(&entries));
            for entry in &round.reauth {
                println!(
                    "{}",
                    formatter.format_error(&format!(
                        "{} needs a new login: eau3f reauth \"{}\"",
                        entry.title, entry.title
                    ))
                );
            }
            for loaded in &round.loaded {
                for sensor in loaded.sensors() {
                    println!("  {}", sensor.entity_id());
                }
            }
            println!();
            println!("Press Ctrl+C to exit");
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_entries(&entries)?);
        }
    }

    Ok(())
}
