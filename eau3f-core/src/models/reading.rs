//! Consumption reading types.
//!
//! This module contains the records returned by the `eau_consos` endpoint:
//! - [`MeterKind`] - Hot or cold water meter
//! - [`Reading`] - One billing-period reading

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Meter Kind
// ============================================================================

/// Water meter kinds reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    /// Hot water (`compteurChaud`).
    Hot,
    /// Cold water (`compteurFroid`).
    Cold,
}

impl MeterKind {
    /// Returns all meter kinds, in entity creation order.
    pub fn all() -> &'static [MeterKind] {
        &[Self::Hot, Self::Cold]
    }

    /// Returns the JSON flag key marking readings of this kind.
    pub fn flag_key(&self) -> &'static str {
        match self {
            Self::Hot => "compteurChaud",
            Self::Cold => "compteurFroid",
        }
    }

    /// Returns the entity display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Hot => "Eau Chaude",
            Self::Cold => "Eau Froide",
        }
    }
}

impl std::fmt::Display for MeterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Reading
// ============================================================================

/// One consumption reading for a billing period.
///
/// Field names follow the vendor API. Deserialization is lenient: a meter
/// flag only counts when it is JSON `true`, and numbers may arrive as
/// numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Hot water meter flag.
    #[serde(rename = "compteurChaud", default, deserialize_with = "strict_true")]
    pub hot: bool,

    /// Cold water meter flag.
    #[serde(rename = "compteurFroid", default, deserialize_with = "strict_true")]
    pub cold: bool,

    /// Reading date as sent by the API (ISO-8601-like).
    #[serde(rename = "ecrelDatrel", default, deserialize_with = "lenient_string")]
    pub date: Option<String>,

    /// Cumulative meter index in m³.
    #[serde(rename = "ecrelVal", default, deserialize_with = "lenient_number")]
    pub index_m3: Option<f64>,

    /// Consumption over the period in m³.
    #[serde(rename = "ecconVal", default, deserialize_with = "lenient_number")]
    pub monthly_m3: Option<f64>,

    /// Meter serial number, whitespace padded by the API.
    #[serde(rename = "painsCodser", default, deserialize_with = "lenient_string")]
    pub serial_number: Option<String>,
}

impl Reading {
    /// Returns true if this reading belongs to the given meter kind.
    pub fn is_kind(&self, kind: MeterKind) -> bool {
        match kind {
            MeterKind::Hot => self.hot,
            MeterKind::Cold => self.cold,
        }
    }

    /// Returns the date string used for ordering (empty when missing).
    pub fn date_key(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }

    /// Returns the serial number with padding removed.
    pub fn trimmed_serial(&self) -> String {
        self.serial_number
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    /// Parses the reading date.
    ///
    /// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` timestamp (taken as
    /// UTC) or a bare `YYYY-MM-DD` date (midnight UTC).
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        parse_reading_date(self.date.as_deref()?)
    }
}

/// Parses a date string as sent in `ecrelDatrel`.
pub fn parse_reading_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Lenient deserializers
// ============================================================================

fn strict_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(matches!(value, Value::Bool(true)))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flags_only_true_counts() {
        let reading: Reading = serde_json::from_value(json!({
            "compteurChaud": "true",
            "compteurFroid": 1,
        }))
        .unwrap();
        assert!(!reading.hot);
        assert!(!reading.cold);

        let reading: Reading = serde_json::from_value(json!({"compteurFroid": true})).unwrap();
        assert!(reading.is_kind(MeterKind::Cold));
        assert!(!reading.is_kind(MeterKind::Hot));
    }

    #[test]
    fn test_numbers_accept_strings() {
        let reading: Reading = serde_json::from_value(json!({
            "ecrelVal": "123,5",
            "ecconVal": 4,
        }))
        .unwrap();
        assert_eq!(reading.index_m3, Some(123.5));
        assert_eq!(reading.monthly_m3, Some(4.0));
    }

    #[test]
    fn test_missing_and_null_fields() {
        let reading: Reading = serde_json::from_value(json!({
            "ecrelDatrel": null,
            "painsCodser": null,
        }))
        .unwrap();
        assert_eq!(reading.date_key(), "");
        assert_eq!(reading.trimmed_serial(), "");
        assert!(reading.index_m3.is_none());
    }

    #[test]
    fn test_trimmed_serial() {
        let reading = Reading {
            serial_number: Some("  A12345   ".to_string()),
            ..Reading::default()
        };
        assert_eq!(reading.trimmed_serial(), "A12345");
    }

    #[test]
    fn test_parse_reading_date_formats() {
        let rfc = parse_reading_date("2026-02-01T00:00:00+00:00").unwrap();
        let naive = parse_reading_date("2026-02-01T00:00:00").unwrap();
        let date_only = parse_reading_date("2026-02-01").unwrap();
        assert_eq!(rfc, naive);
        assert_eq!(rfc, date_only);

        let offset = parse_reading_date("2026-02-01T01:00:00+01:00").unwrap();
        assert_eq!(offset, rfc);

        assert!(parse_reading_date("01/02/2026").is_none());
        assert!(parse_reading_date("").is_none());
    }

    #[test]
    fn test_meter_kind_keys() {
        assert_eq!(MeterKind::Hot.flag_key(), "compteurChaud");
        assert_eq!(MeterKind::Cold.flag_key(), "compteurFroid");
        assert_eq!(MeterKind::Cold.display_name(), "Eau Froide");
    }
}
