// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! eau3f CLI - Groupe 3F water meters in Home Assistant.
//!
//! # Examples
//!
//! ```bash
//! # Add an account (asks for the password and the 2FA code)
//! eau3f setup --username me@example.com --price 4.12
//!
//! # Fetch and show the current readings
//! eau3f readings
//!
//! # Include the statistics that would be imported
//! eau3f readings --history --format json --pretty
//!
//! # Run the bridge until Ctrl+C
//! eau3f run
//!
//! # Run without Home Assistant, logging what would be published
//! eau3f run --dry-run --interval 600
//!
//! # Re-login after the vendor asked for a new 2FA code
//! eau3f reauth "Contrat 123456"
//!
//! # Point at Home Assistant
//! eau3f config set-ha --url http://homeassistant.local:8123 --token XXX
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use eau3f_core::UpdateFailed;
use eau3f_integration::SetupError;
use eau3f_store::{LogLevel, Settings, default_settings_path, load_json_or_default};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, entries, readings, reauth, run, setup};

// ============================================================================
// CLI Definition
// ============================================================================

/// eau3f CLI - Groupe 3F water meters in Home Assistant.
#[derive(Parser)]
#[command(name = "eau3f")]
#[command(about = "Groupe 3F water meter bridge for Home Assistant")]
#[command(long_about = r#"
eau3f logs into the Groupe 3F tenant portal, reads the hot and cold water
meters of your contract, and publishes them to Home Assistant as sensors
with long-term statistics.

Examples:
  eau3f setup --username me@example.com   # Add an account
  eau3f readings                           # Show the current readings
  eau3f run                                # Poll and publish until Ctrl+C
  eau3f entries                            # List configured accounts
  eau3f config show                        # Show settings
"#)]
#[command(version)]
#[command(author = "eau3f Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'readings' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Add a Groupe 3F account.
    #[command(visible_alias = "add")]
    Setup(setup::SetupArgs),

    /// Log an account in again.
    Reauth(reauth::ReauthArgs),

    /// Poll the vendor API and publish to Home Assistant.
    #[command(visible_alias = "r")]
    Run(run::RunArgs),

    /// Fetch once and show sensor states (default if no command specified).
    #[command(visible_alias = "show")]
    Readings(readings::ReadingsArgs),

    /// List or remove configured accounts.
    #[command(visible_alias = "e")]
    Entries(entries::EntriesArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// An account needs `eau3f reauth`.
    ReauthRequired = 2,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    fn for_error(error: &anyhow::Error) -> Self {
        let needs_reauth = matches!(
            error.downcast_ref::<SetupError>(),
            Some(SetupError::ReauthRequired)
        ) || error
            .downcast_ref::<UpdateFailed>()
            .is_some_and(UpdateFailed::needs_reauth);

        if needs_reauth {
            ExitCode::ReauthRequired
        } else {
            ExitCode::Error
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: LogLevel) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("eau3f=debug,info")
        } else {
            EnvFilter::new(format!("eau3f={level},warn"))
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings: Settings = load_json_or_default(&default_settings_path()).await;
    setup_logging(cli.verbose, cli.quiet, settings.log_level);

    let result = match &cli.command {
        Some(Commands::Setup(args)) => setup::run(args, &cli).await,
        Some(Commands::Reauth(args)) => reauth::run(args, &cli).await,
        Some(Commands::Run(args)) => run::run(args, &cli).await,
        Some(Commands::Readings(args)) => readings::run(args, &cli).await,
        Some(Commands::Entries(args)) => entries::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
        None => readings::run(&readings::ReadingsArgs::default(), &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
