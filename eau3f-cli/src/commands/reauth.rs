//! Reauth command - log an account in again.

use anyhow::Result;
use clap::Args;
use eau3f_integration::FlowManager;
use tracing::info;

use super::{Prompter, Stores, flow, resolve_entry};
use crate::output::{EntryOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the reauth command.
#[derive(Args)]
pub struct ReauthArgs {
    /// Entry id, contract id or title.
    pub entry: String,
}

/// Runs the reauth command.
///
/// Only the password, token and trusted id change. The entry goes back to
/// `not_loaded` so the next `eau3f run` sets it up again.
pub async fn run(args: &ReauthArgs, cli: &Cli) -> Result<()> {
    let stores = Stores::load().await?;
    let settings = stores.effective_settings().await;
    let entry = resolve_entry(stores.entries.as_ref(), &args.entry).await?;

    let manager = FlowManager::new(settings.api_base_url, stores.entry_store());
    let mut flow = manager.start_reauth(&entry.entry_id).await?;
    let mut prompter = Prompter::stdin();

    if !cli.quiet {
        eprintln!(
            "Re-authenticating {} ({})",
            entry.title,
            flow.reauth_username().unwrap_or_default()
        );
    }
    let password = prompter.password().await?;
    let first = flow.step_reauth_confirm(Some(password)).await?;
    let entry = flow::drive(&manager, &mut flow, first, &mut prompter, None).await?;

    info!(entry_id = %entry.entry_id, "Entry re-authenticated");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("Updated {}", formatter.format_entry(&entry));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&EntryOutput::from(&entry))?);
        }
    }

    Ok(())
}
