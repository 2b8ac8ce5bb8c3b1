//! Filter-expression compilation.
//!
//! A filter string has the shape `<field><operator><value>` with operator
//! drawn from `=`, `!=`, `>`, `<` and `*=` ("contains"). Compilation maps a
//! list of such strings to a backend-agnostic [`CompiledQuery`]: an ordered
//! predicate list plus a flag saying whether the query targets a unique
//! record id. Backends render or evaluate the predicates themselves; values
//! are always carried as data, never spliced into query text.
//!
//! Field resolution, first match wins:
//! - `severity`, `message`, `application` compare against the core column,
//!   case-insensitively.
//! - `index` compares against the record id column and flips the query
//!   into unique-id mode.
//! - `timestamp` compares against the timestamp column, case-sensitively,
//!   with the value normalized to the canonical date-time text form.
//! - anything else becomes an existence check against the attribute store.
//!
//! Ordering operators are accepted for every field, meaningful or not; the
//! language has always been permissive here.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::FilterSyntaxError;
use crate::types::canonical_datetime;

/// Comparator applied to a core column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Pattern match (`LIKE`). `=` compiles to this without wildcards,
    /// `*=` with the value wrapped in `%` on both sides.
    Like,
    /// Negated pattern match (`NOT LIKE`).
    NotLike,
    Greater,
    Less,
}

/// Core columns addressable by name in a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreColumn {
    Severity,
    Message,
    Application,
    Id,
    Timestamp,
}

/// One compiled predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Comparison against a core column of the record table.
    Core {
        column: CoreColumn,
        comparator: Comparator,
        /// Comparison value, with `*=` wildcards already applied.
        value: String,
        /// Upper-case both sides before comparing.
        case_insensitive: bool,
    },
    /// Existence check against the attribute table: a row for this record
    /// whose key equals `key` (case-insensitive) and whose value `LIKE`s
    /// `value` (case-insensitive).
    AttributeExists {
        key: String,
        value: String,
        negated: bool,
    },
}

/// A compiled query, immutable once built and reused unchanged across all
/// partitions of one fan-out. Results are always ordered descending by
/// record id within a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub predicates: Vec<Predicate>,
    /// Set when any filter addressed the `index` field; selects the
    /// race-to-first-success completion policy.
    pub targets_unique_id: bool,
}

/// Compile an ordered list of filter strings.
pub fn compile_filters(filters: &[String]) -> Result<CompiledQuery, FilterSyntaxError> {
    let mut predicates = Vec::with_capacity(filters.len());
    let mut targets_unique_id = false;

    for filter in filters {
        let (field, operator, value) = split_filter(filter)?;

        let column = match field {
            "severity" => Some((CoreColumn::Severity, true)),
            "message" => Some((CoreColumn::Message, true)),
            "application" => Some((CoreColumn::Application, true)),
            "index" => {
                targets_unique_id = true;
                Some((CoreColumn::Id, true))
            }
            "timestamp" => Some((CoreColumn::Timestamp, false)),
            _ => None,
        };

        let Some((column, case_insensitive)) = column else {
            // Unknown fields compile to an attribute existence check. Only
            // negation survives of the operator; the value is matched
            // LIKE-style as given.
            predicates.push(Predicate::AttributeExists {
                key: field.to_owned(),
                value: value.to_owned(),
                negated: operator == Operator::NotEq,
            });
            continue;
        };

        let mut value = if column == CoreColumn::Timestamp {
            canonical_datetime(parse_timestamp_value(value)?)
        } else {
            value.to_owned()
        };

        let comparator = match operator {
            Operator::Eq => Comparator::Like,
            Operator::NotEq => Comparator::NotLike,
            Operator::Contains => {
                value = format!("%{value}%");
                Comparator::Like
            }
            Operator::Greater => Comparator::Greater,
            Operator::Less => Comparator::Less,
        };

        predicates.push(Predicate::Core {
            column,
            comparator,
            value,
            case_insensitive,
        });
    }

    Ok(CompiledQuery {
        predicates,
        targets_unique_id,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    NotEq,
    Greater,
    Less,
    Contains,
}

/// Split a filter into field, operator and value.
///
/// The field is the (possibly empty) alphabetic prefix before the first
/// operator occurrence; the value is everything after the operator and must
/// be non-empty. A value may itself contain operator characters.
fn split_filter(filter: &str) -> Result<(&str, Operator, &str), FilterSyntaxError> {
    let malformed = || FilterSyntaxError::Malformed(filter.to_owned());

    let bytes = filter.as_bytes();
    for (at, &byte) in bytes.iter().enumerate() {
        let (operator, len) = match byte {
            b'!' if bytes.get(at + 1) == Some(&b'=') => (Operator::NotEq, 2),
            b'*' if bytes.get(at + 1) == Some(&b'=') => (Operator::Contains, 2),
            b'=' => (Operator::Eq, 1),
            b'>' => (Operator::Greater, 1),
            b'<' => (Operator::Less, 1),
            _ => continue,
        };

        let field = &filter[..at];
        let value = &filter[at + len..];
        if !field.chars().all(|c| c.is_ascii_alphabetic()) || value.is_empty() {
            return Err(malformed());
        }
        return Ok((field, operator, value));
    }

    Err(malformed())
}

/// Read a timestamp filter value: epoch milliseconds, RFC 3339, or the
/// canonical `YYYY-MM-DD HH:MM:SS` form (`T` separator accepted).
fn parse_timestamp_value(value: &str) -> Result<DateTime<Utc>, FilterSyntaxError> {
    if let Ok(millis) = value.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| FilterSyntaxError::InvalidTimestamp(value.to_owned()));
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(FilterSyntaxError::InvalidTimestamp(value.to_owned()))
}
