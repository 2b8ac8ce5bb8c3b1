//! Record and attribute wire types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Severity of a log record, normalized to upper case on write.
///
/// Parsing is case-insensitive and deliberately permissive: unknown levels
/// are carried through as-is (upper-cased) rather than rejected, so callers
/// that invent their own levels keep working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Other(String),
}

impl Severity {
    /// Parse a severity, case-insensitively.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.to_uppercase().as_str() {
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The normalized upper-case form stored and served.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

/// One stored log record, with its EAV attributes merged in.
///
/// `id` is unique only within its partition; callers must not assume
/// cross-partition uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub application: String,
    pub message: String,
    #[serde(rename = "originIP")]
    pub origin_ip: String,
    /// Record table the row was read from. Diagnostic only.
    #[serde(rename = "partitionLabel")]
    pub partition_label: String,
    /// Non-core fields, merged back from the attribute table.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

/// One entity-attribute-value row.
///
/// `log_id` references a record in the same partition, never across
/// partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub log_id: i64,
    pub key: String,
    pub value: String,
}

/// The backend's canonical date-time text form: `YYYY-MM-DD HH:MM:SS`, UTC.
///
/// Lexicographic order on this form equals chronological order, which is
/// what makes `>`/`<` timestamp filters work as string comparisons.
#[must_use]
pub fn canonical_datetime(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Canonical text form of an attribute value.
///
/// Strings are stored verbatim; arrays and every other non-string value are
/// stored as compact JSON. This is part of the attribute value contract:
/// `["a","b"]` is the stored form of an array attribute.
#[must_use]
pub fn attribute_value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("error"), Severity::Error);
        assert_eq!(Severity::parse("WaRn"), Severity::Warn);
        assert_eq!(Severity::parse("notice").as_str(), "NOTICE");
    }

    #[test]
    fn canonical_datetime_form() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 6, 7, 8, 9).unwrap();
        assert_eq!(canonical_datetime(instant), "2024-03-06 07:08:09");
    }

    #[test]
    fn attribute_values_serialize_canonically() {
        assert_eq!(attribute_value_text(&json!("plain")), "plain");
        assert_eq!(attribute_value_text(&json!(["a", "b"])), r#"["a","b"]"#);
        assert_eq!(attribute_value_text(&json!(42)), "42");
        assert_eq!(attribute_value_text(&json!(true)), "true");
    }

    #[test]
    fn record_serializes_with_flattened_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("custom_tag".to_owned(), "v1".to_owned());
        let record = LogRecord {
            id: 7,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 6, 7, 8, 9).unwrap(),
            severity: Severity::Info,
            application: "app".to_owned(),
            message: "hello".to_owned(),
            origin_ip: "127.0.0.1".to_owned(),
            partition_label: "log2024-10-2".to_owned(),
            attributes,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["severity"], "INFO");
        assert_eq!(value["custom_tag"], "v1");
        assert_eq!(value["partitionLabel"], "log2024-10-2");
    }
}
