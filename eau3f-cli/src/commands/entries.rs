//! Entries command - list and remove configured accounts.

use anyhow::Result;
use clap::{Args, Subcommand};
use eau3f_core::EntryStore;
use tracing::info;

use super::{Stores, resolve_entry};
use crate::output::{EntryOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the entries command.
#[derive(Args)]
pub struct EntriesArgs {
    #[command(subcommand)]
    pub action: Option<EntriesAction>,
}

/// Entries subcommands.
#[derive(Subcommand)]
pub enum EntriesAction {
    /// List configured accounts (default).
    List,

    /// Remove an account.
    Remove {
        /// Entry id, contract id or title.
        entry: String,
    },
}

/// Runs the entries command.
pub async fn run(args: &EntriesArgs, cli: &Cli) -> Result<()> {
    let stores = Stores::load().await?;

    match &args.action {
        None | Some(EntriesAction::List) => list_entries(&stores, cli).await,
        Some(EntriesAction::Remove { entry }) => remove_entry(&stores, entry, cli).await,
    }
}

async fn list_entries(stores: &Stores, cli: &Cli) -> Result<()> {
    let entries = stores.entries.entries().await;

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_entries(&entries));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_entries(&entries)?);
        }
    }

    Ok(())
}

async fn remove_entry(stores: &Stores, key: &str, cli: &Cli) -> Result<()> {
    let entry = resolve_entry(stores.entries.as_ref(), key).await?;
    stores.entries.delete(&entry.entry_id).await?;

    info!(entry_id = %entry.entry_id, "Entry removed");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Removed: {}", entry.title);
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&EntryOutput::from(&entry))?);
        }
    }

    Ok(())
}
