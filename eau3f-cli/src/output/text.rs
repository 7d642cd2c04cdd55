//! Text output formatting with colors.

use chrono::Local;
use eau3f_core::{ConfigEntry, EntryState};
use eau3f_store::Settings;
use serde_json::Value;

use super::json::{ReadingsOutput, SensorOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Formats one config entry on a line.
    pub fn format_entry(&self, entry: &ConfigEntry) -> String {
        let mut line = format!(
            "{} {:<20} {:<14} {}",
            self.state_dot(entry.state),
            self.bold(&entry.title),
            self.format_state(entry.state),
            entry.data.username,
        );
        if let Some(price) = entry.data.price() {
            line.push_str(&format!("  {price:.2} €/m³"));
        }
        line.push_str(&self.dim(&format!("  ({})", entry.entry_id)));
        line
    }

    /// Formats a list of config entries.
    pub fn format_entries(&self, entries: &[ConfigEntry]) -> String {
        if entries.is_empty() {
            return self.dim("No account configured. Run `eau3f setup` to add one.");
        }
        entries
            .iter()
            .map(|entry| self.format_entry(entry))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Formats an entry state with its color.
    pub fn format_state(&self, state: EntryState) -> String {
        let text = state.to_string();
        match state {
            EntryState::Loaded => self.green(&text),
            EntryState::NotLoaded => self.dim(&text),
            EntryState::SetupRetry => self.yellow(&text),
            EntryState::SetupError | EntryState::NeedsReauth => self.red(&text),
        }
    }

    fn state_dot(&self, state: EntryState) -> String {
        match state {
            EntryState::Loaded => self.green("●"),
            EntryState::NotLoaded => self.dim("○"),
            EntryState::SetupRetry => self.yellow("●"),
            EntryState::SetupError | EntryState::NeedsReauth => self.red("●"),
        }
    }

    // ========================================================================
    // Readings
    // ========================================================================

    /// Formats the readings of one entry.
    pub fn format_readings(&self, output: &ReadingsOutput) -> String {
        let mut lines = vec![format!(
            "{} {}",
            self.bold(&output.title),
            self.dim(&format!("(contract {})", output.contract_id))
        )];

        if let Some(error) = &output.error {
            lines.push(format!("  {} {}", self.red("✗"), error));
        }
        if output.sensors.is_empty() && output.success {
            lines.push(format!("  {}", self.dim("No meter found")));
        }

        for sensor in &output.sensors {
            lines.extend(self.format_sensor(sensor));
        }

        if let Some(updated) = output.updated_at {
            lines.push(self.dim(&format!(
                "  Updated {}",
                updated.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            )));
        }

        lines.join("\n")
    }

    fn format_sensor(&self, sensor: &SensorOutput) -> Vec<String> {
        let value = match sensor.state.parse::<f64>() {
            Ok(_) => self.cyan(&format!("{} m³", sensor.state)),
            Err(_) => self.yellow(&sensor.state),
        };
        let mut lines = vec![format!("  {:<28} {}", sensor.name, value)];
        lines.push(format!("    {}", self.dim(&sensor.entity_id)));

        let mut details = Vec::new();
        if let Some(date) = attribute_str(&sensor.attributes, "last_reading") {
            details.push(format!("read {date}"));
        }
        if let Some(serial) = attribute_str(&sensor.attributes, "serial_number") {
            if !serial.is_empty() {
                details.push(format!("serial {serial}"));
            }
        }
        if let Some(monthly) = sensor.attributes.get("monthly_cons_m3").and_then(Value::as_f64) {
            details.push(format!("month {monthly} m³"));
        }
        if let Some(price) = sensor.attributes.get("price_per_m3").and_then(Value::as_f64) {
            details.push(self.blue(&format!("{price:.2} €/m³")));
        }
        if !details.is_empty() {
            lines.push(format!("    {}", details.join(" · ")));
        }

        if let Some(statistics) = &sensor.statistics {
            match (statistics.first(), statistics.last()) {
                (Some(first), Some(last)) => {
                    lines.push(format!(
                        "    {} points from {} to {}",
                        statistics.len(),
                        first.start.format("%Y-%m-%d"),
                        last.start.format("%Y-%m-%d"),
                    ));
                    for point in statistics {
                        lines.push(self.dim(&format!(
                            "      {}  {:>10}",
                            point.start.format("%Y-%m-%d %H:%M"),
                            point.sum
                        )));
                    }
                }
                _ => lines.push(format!("    {}", self.dim("No statistics"))),
            }
        }

        lines
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Formats the settings. The Home Assistant token is never shown.
    pub fn format_settings(&self, settings: &Settings) -> String {
        let token = if settings.home_assistant.token.is_some() {
            self.green("set")
        } else {
            self.yellow("not set")
        };
        let url = settings
            .home_assistant
            .url
            .clone()
            .unwrap_or_else(|| self.dim("not set"));

        [
            format!("Scan interval:  {}s", settings.scan_interval_secs),
            format!("API base URL:   {}", settings.api_base_url),
            format!("Home Assistant: {url}"),
            format!("HA token:       {token}"),
            format!("Log level:      {}", settings.log_level),
        ]
        .join("\n")
    }

    /// Formats an error line.
    pub fn format_error(&self, message: &str) -> String {
        format!("{} {}", self.red("Error:"), message)
    }

    // ========================================================================
    // Color helpers
    // ========================================================================

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn attribute_str<'a>(attributes: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}
