//! Config command - manage configuration.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use eau3f_store::{
    LogLevel, SettingsStore, default_config_dir, default_entries_path, default_settings_path,
};
use tracing::info;

use crate::output::{JsonFormatter, SettingsOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration (environment overrides applied).
    Show,

    /// Show configuration paths.
    Path,

    /// Set the Home Assistant connection.
    SetHa {
        /// Base URL, e.g. `http://homeassistant.local:8123`.
        #[arg(long)]
        url: Option<String>,

        /// Long-lived access token.
        #[arg(long)]
        token: Option<String>,
    },

    /// Set the polling interval.
    Interval {
        /// Seconds between two polls.
        seconds: u64,
    },

    /// Set the log level.
    LogLevel {
        /// Level: error, warn, info, debug, trace.
        level: String,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::SetHa { url, token } => set_home_assistant(url.clone(), token.clone(), cli).await,
        ConfigAction::Interval { seconds } => set_interval(*seconds, cli).await,
        ConfigAction::LogLevel { level } => set_log_level(level, cli).await,
        ConfigAction::Reset => reset_config(cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let store = SettingsStore::load_default().await?;
    let settings = store.effective().await;

    match cli.format {
        OutputFormat::Text => {
            println!("eau3f Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("{}", TextFormatter::new(!cli.no_color).format_settings(&settings));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&SettingsOutput::from(&settings))?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = default_settings_path();
    let entries_path = default_entries_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
            println!("Entries file:  {}", entries_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "entries_file": entries_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn set_home_assistant(url: Option<String>, token: Option<String>, cli: &Cli) -> Result<()> {
    if url.is_none() && token.is_none() {
        bail!("Nothing to set. Pass --url and/or --token.");
    }

    let store = SettingsStore::load_default().await?;
    store.set_home_assistant(url, token).await;
    store.save().await?;

    info!("Home Assistant connection updated");
    if !cli.quiet {
        println!("Home Assistant connection updated");
    }

    Ok(())
}

async fn set_interval(seconds: u64, cli: &Cli) -> Result<()> {
    let store = SettingsStore::load_default().await?;
    store.update(|s| s.scan_interval_secs = seconds).await;
    store.save().await?;

    info!(seconds, "Scan interval updated");
    if !cli.quiet {
        println!("Scan interval set to: {seconds}s");
    }

    Ok(())
}

async fn set_log_level(level: &str, cli: &Cli) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "error" => LogLevel::Error,
        "warn" | "warning" => LogLevel::Warn,
        "info" => LogLevel::Info,
        "debug" => LogLevel::Debug,
        "trace" => LogLevel::Trace,
        _ => bail!("Unknown log level: {level}. Use: error, warn, info, debug, trace"),
    };

    let store = SettingsStore::load_default().await?;
    store.update(|s| s.log_level = level).await;
    store.save().await?;

    info!(level = %level, "Log level updated");
    if !cli.quiet {
        println!("Log level set to: {level}");
    }

    Ok(())
}

async fn reset_config(cli: &Cli) -> Result<()> {
    let path = default_settings_path();

    if tokio::fs::try_exists(&path).await? {
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Settings reset");
        if !cli.quiet {
            println!("Configuration reset to defaults");
        }
    } else if !cli.quiet {
        println!("No configuration file to reset");
    }

    Ok(())
}
