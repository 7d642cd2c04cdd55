//! Output formatting for CLI.

mod json;
mod text;

pub use json::{EntryOutput, JsonFormatter, ReadingsOutput, SettingsOutput};
pub use text::TextFormatter;
