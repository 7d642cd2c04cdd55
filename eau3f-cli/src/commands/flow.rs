//! Terminal driver for the setup and reauth flows.

use anyhow::{Result, bail};
use eau3f_core::ConfigEntry;
use eau3f_integration::{AbortReason, ConfigFlow, FlowManager, FlowResult, FlowStep, FormError, UserInput};
use tracing::debug;

use super::Prompter;

/// Forms shown with an error before giving up.
const MAX_ATTEMPTS: usize = 3;

/// Answers the forms of `flow` until it finishes, then applies the result.
///
/// `user` is resubmitted with a new password when the `user` form comes back
/// with an error.
pub(crate) async fn drive(
    manager: &FlowManager,
    flow: &mut ConfigFlow,
    first: FlowResult,
    prompter: &mut Prompter,
    user: Option<&UserInput>,
) -> Result<ConfigEntry> {
    let mut result = first;
    let mut failures = 0;

    while let FlowResult::ShowForm { step_id, error } = &result {
        let (step_id, error) = (*step_id, *error);
        debug!(step = %step_id, error = ?error, "Flow form");
        if let Some(error) = error {
            failures += 1;
            if failures >= MAX_ATTEMPTS {
                bail!("{} (giving up after {MAX_ATTEMPTS} attempts)", form_error_message(error));
            }
            eprintln!("{}", form_error_message(error));
        }

        result = match step_id {
            FlowStep::TwoFactor => {
                let code = prompter.ask("Code sent by Groupe 3F").await?;
                flow.step_2fa(Some(&code)).await?
            }
            FlowStep::ReauthConfirm => {
                let password = prompter.password().await?;
                flow.step_reauth_confirm(Some(password)).await?
            }
            FlowStep::User => {
                let Some(user) = user else {
                    bail!("Credentials are required");
                };
                let password = prompter.password().await?;
                let input = UserInput {
                    password,
                    ..user.clone()
                };
                flow.step_user(Some(input)).await?
            }
        };
    }

    if let FlowResult::Abort { reason } = &result {
        bail!("{}", abort_message(*reason));
    }

    match manager.apply(result).await? {
        Some(entry) => Ok(entry),
        None => bail!("Flow finished without an entry"),
    }
}

fn form_error_message(error: FormError) -> &'static str {
    match error {
        FormError::CannotConnect => "Cannot reach the Groupe 3F API",
        FormError::InvalidAuth => "Invalid credentials or code",
        FormError::Unknown => "Unexpected login response",
    }
}

fn abort_message(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::NoContracts => "No contract found for this account",
        AbortReason::AlreadyConfigured => "This contract is already configured",
        AbortReason::WrongAccount => "These credentials belong to another contract",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_cover_every_reason() {
        assert!(form_error_message(FormError::InvalidAuth).contains("Invalid"));
        assert!(abort_message(AbortReason::AlreadyConfigured).contains("already"));
        assert!(abort_message(AbortReason::WrongAccount).contains("another contract"));
    }
}
