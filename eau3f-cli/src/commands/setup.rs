//! Setup command - add a Groupe 3F account.

use anyhow::{Result, bail};
use clap::Args;
use eau3f_integration::{FlowManager, UserInput};
use tracing::info;

use super::{Prompter, Stores, flow};
use crate::output::{EntryOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the setup command.
#[derive(Args)]
pub struct SetupArgs {
    /// Account e-mail (asked for if missing).
    #[arg(long, short)]
    pub username: Option<String>,

    /// Price per m³ shown as a sensor attribute (0 disables it).
    #[arg(long, default_value = "0")]
    pub price: f64,
}

/// Runs the setup command.
pub async fn run(args: &SetupArgs, cli: &Cli) -> Result<()> {
    if !args.price.is_finite() || args.price < 0.0 {
        bail!("Price must be a positive number, got {}", args.price);
    }

    let stores = Stores::load().await?;
    let settings = stores.effective_settings().await;
    let manager = FlowManager::new(settings.api_base_url, stores.entry_store());
    let mut prompter = Prompter::stdin();

    let username = match &args.username {
        Some(username) => username.clone(),
        None => prompter.ask("E-mail").await?,
    };
    if username.is_empty() {
        bail!("An e-mail is required");
    }
    let password = prompter.password().await?;
    let input = UserInput::new(username, password).with_price(args.price);

    let mut flow = manager.start_user();
    let first = flow.step_user(Some(input.clone())).await?;
    let entry = flow::drive(&manager, &mut flow, first, &mut prompter, Some(&input)).await?;

    info!(entry_id = %entry.entry_id, title = %entry.title, "Entry created");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("Added {}", formatter.format_entry(&entry));
                println!("Run `eau3f run` to start publishing.");
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&EntryOutput::from(&entry))?);
        }
    }

    Ok(())
}
