//! Daily partition key derivation.
//!
//! Partitions are addressed by a week-relative label derived from the ISO
//! week date: `log<Y>-<WW>-<D>` for the record table and
//! `log_attributes<Y>-<WW>-<D>` for the attribute table, where `Y` is the
//! ISO year, `WW` the zero-padded ISO week number and `D` the 0-based ISO
//! weekday. Every instant on the same calendar day derives the same pair of
//! labels.

use chrono::{DateTime, Datelike, Duration, Utc};

/// Prefix of every record table name.
pub const RECORD_TABLE_PREFIX: &str = "log";

/// Prefix of every attribute table name.
pub const ATTRIBUTE_TABLE_PREFIX: &str = "log_attributes";

/// The pair of table names holding one calendar day's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    record_table: String,
    attribute_table: String,
}

impl PartitionKey {
    /// Name of the partition's record table.
    #[must_use]
    pub fn record_table(&self) -> &str {
        &self.record_table
    }

    /// Name of the partition's attribute table.
    #[must_use]
    pub fn attribute_table(&self) -> &str {
        &self.attribute_table
    }

    /// Reconstruct a key from a record table label, as carried on a
    /// record's `partitionLabel` field.
    ///
    /// Returns `None` when the label does not look like a label this
    /// module would have derived. Labels never come from user input, so a
    /// `None` here indicates a corrupted record rather than a bad request.
    #[must_use]
    pub fn from_record_table(label: &str) -> Option<Self> {
        let postfix = label.strip_prefix(RECORD_TABLE_PREFIX)?;
        if postfix.starts_with("_attributes") || !is_valid_postfix(postfix) {
            return None;
        }
        Some(Self {
            record_table: label.to_owned(),
            attribute_table: format!("{ATTRIBUTE_TABLE_PREFIX}{postfix}"),
        })
    }
}

/// Derive the partition key for the calendar day containing `instant`.
#[must_use]
pub fn derive_partition_key(instant: DateTime<Utc>) -> PartitionKey {
    let iso = instant.iso_week();
    let weekday = instant.weekday().number_from_monday() - 1;
    let postfix = format!("{}-{:02}-{}", iso.year(), iso.week(), weekday);
    PartitionKey {
        record_table: format!("{RECORD_TABLE_PREFIX}{postfix}"),
        attribute_table: format!("{ATTRIBUTE_TABLE_PREFIX}{postfix}"),
    }
}

/// Partition key for today minus `days_ago` days.
///
/// `days_ago = 0` targets the write partition; the read fan-out enumerates
/// `0..n`.
#[must_use]
pub fn partition_key_days_ago(days_ago: u32) -> PartitionKey {
    derive_partition_key(Utc::now() - Duration::days(i64::from(days_ago)))
}

/// A postfix is `<year>-<week>-<weekday>` with only digits and dashes.
fn is_valid_postfix(postfix: &str) -> bool {
    !postfix.is_empty()
        && postfix.chars().all(|c| c.is_ascii_digit() || c == '-')
        && postfix.split('-').count() == 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_day_same_key() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 1).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 3, 6, 23, 59, 59).unwrap();
        assert_eq!(derive_partition_key(morning), derive_partition_key(night));
    }

    #[test]
    fn different_days_different_keys() {
        let wednesday = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();
        let thursday = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        assert_ne!(
            derive_partition_key(wednesday),
            derive_partition_key(thursday)
        );
    }

    #[test]
    fn label_scheme() {
        // 2024-03-06 is a Wednesday in ISO week 10.
        let instant = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();
        let key = derive_partition_key(instant);
        assert_eq!(key.record_table(), "log2024-10-2");
        assert_eq!(key.attribute_table(), "log_attributes2024-10-2");
    }

    #[test]
    fn week_number_is_zero_padded() {
        // 2024-01-03 is a Wednesday in ISO week 1.
        let instant = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let key = derive_partition_key(instant);
        assert_eq!(key.record_table(), "log2024-01-2");
    }

    #[test]
    fn year_boundary_uses_iso_year() {
        // 2024-12-30 (Monday) belongs to ISO week 1 of 2025.
        let instant = Utc.with_ymd_and_hms(2024, 12, 30, 12, 0, 0).unwrap();
        let key = derive_partition_key(instant);
        assert_eq!(key.record_table(), "log2025-01-0");
    }

    #[test]
    fn round_trip_through_label() {
        let key = partition_key_days_ago(0);
        let parsed = PartitionKey::from_record_table(key.record_table()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_foreign_labels() {
        assert!(PartitionKey::from_record_table("users").is_none());
        assert!(PartitionKey::from_record_table("log_attributes2024-10-2").is_none());
        assert!(PartitionKey::from_record_table("log2024-10-2; DROP TABLE x").is_none());
    }
}
