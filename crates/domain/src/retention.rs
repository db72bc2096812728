//! Retention configuration entries and threshold arithmetic.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_purger_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;

/// Name of a Log Analytics table, e.g. `SecurityEvent` or `MyApp_CL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(NonEmptyString);

impl TableName {
    /// Creates a validated table name.
    ///
    /// Table names are embedded in URL paths, so only ASCII letters, digits
    /// and underscores are accepted.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "table name must not be empty".to_owned(),
            ));
        }

        if let Some(invalid) = trimmed
            .chars()
            .find(|character| !(character.is_ascii_alphanumeric() || *character == '_'))
        {
            return Err(AppError::Validation(format!(
                "table name '{trimmed}' contains invalid character '{invalid}'"
            )));
        }

        Ok(Self(NonEmptyString::new(trimmed)?))
    }

    /// Returns the table name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How long rows of a table are kept before they become eligible for purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetentionPeriod(Duration);

impl RetentionPeriod {
    /// Parses a duration string such as `720h`, `1h30m` or `1.5h`.
    ///
    /// Accepts a sequence of decimal numbers, each with an optional fraction
    /// and a unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare `0` is
    /// allowed. Negative periods are rejected.
    pub fn parse(value: &str) -> AppResult<Self> {
        let input = value.trim();
        let invalid = || AppError::Validation(format!("invalid retention duration '{input}'"));

        let (negative, mut rest) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            Some(_) => (false, input),
            None => return Err(invalid()),
        };

        if rest == "0" {
            return Ok(Self(Duration::ZERO));
        }
        if rest.is_empty() {
            return Err(invalid());
        }

        let mut total_nanos: u64 = 0;
        while !rest.is_empty() {
            let integer_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            let (integer_digits, after_integer) = rest.split_at(integer_len);

            let (fraction_digits, after_number) = match after_integer.strip_prefix('.') {
                Some(after_dot) => {
                    let fraction_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
                    after_dot.split_at(fraction_len)
                }
                None => ("", after_integer),
            };

            if integer_digits.is_empty() && fraction_digits.is_empty() {
                return Err(invalid());
            }

            let unit_len = after_number
                .char_indices()
                .find(|(_, character)| character.is_ascii_digit() || *character == '.')
                .map_or(after_number.len(), |(index, _)| index);
            let (unit, remainder) = after_number.split_at(unit_len);
            let unit_nanos = unit_in_nanos(unit).ok_or_else(|| {
                if unit.is_empty() {
                    AppError::Validation(format!("missing unit in retention duration '{input}'"))
                } else {
                    AppError::Validation(format!(
                        "unknown unit '{unit}' in retention duration '{input}'"
                    ))
                }
            })?;

            let component = component_nanos(integer_digits, fraction_digits, unit_nanos)
                .ok_or_else(|| {
                    AppError::Validation(format!("retention duration '{input}' is too large"))
                })?;
            total_nanos = total_nanos.checked_add(component).ok_or_else(|| {
                AppError::Validation(format!("retention duration '{input}' is too large"))
            })?;

            rest = remainder;
        }

        if negative && total_nanos > 0 {
            return Err(AppError::Validation(format!(
                "retention duration '{input}' must not be negative"
            )));
        }

        Ok(Self(Duration::from_nanos(total_nanos)))
    }

    /// Creates a retention period from an already known duration.
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Returns the retention period as a standard duration.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Returns the cutoff instant: `now` minus the retention period.
    pub fn threshold_from(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        let delta = TimeDelta::from_std(self.0).map_err(|error| {
            AppError::Validation(format!("retention period out of range: {error}"))
        })?;

        now.checked_sub_signed(delta).ok_or_else(|| {
            AppError::Validation(
                "retention period reaches before the supported calendar range".to_owned(),
            )
        })
    }
}

fn unit_in_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

fn component_nanos(integer_digits: &str, fraction_digits: &str, unit_nanos: u64) -> Option<u64> {
    let integer = if integer_digits.is_empty() {
        0
    } else {
        integer_digits.parse::<u64>().ok()?
    };
    let mut nanos = integer.checked_mul(unit_nanos)?;

    // Digits beyond nanosecond resolution of the largest unit carry no weight.
    let fraction_digits = &fraction_digits[..fraction_digits.len().min(18)];
    if !fraction_digits.is_empty() {
        let fraction = fraction_digits.parse::<u128>().ok()?;
        let scale = 10_u128.pow(u32::try_from(fraction_digits.len()).ok()?);
        let fraction_nanos = u64::try_from(fraction * u128::from(unit_nanos) / scale).ok()?;
        nanos = nanos.checked_add(fraction_nanos)?;
    }

    Some(nanos)
}

/// One configured table together with its retention period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionEntry {
    table: TableName,
    retention: RetentionPeriod,
}

impl RetentionEntry {
    /// Creates a retention entry from a table name and a duration string.
    pub fn new(table: impl Into<String>, retention: &str) -> AppResult<Self> {
        let table = TableName::new(table)?;
        let retention = RetentionPeriod::parse(retention)
            .map_err(|error| error.with_context(format!("table '{table}'")))?;

        Ok(Self { table, retention })
    }

    /// Returns the table the entry applies to.
    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Returns the retention period.
    #[must_use]
    pub fn retention(&self) -> RetentionPeriod {
        self.retention
    }

    /// Returns the purge threshold for this table relative to `now`.
    pub fn threshold_from(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        self.retention
            .threshold_from(now)
            .map_err(|error| error.with_context(format!("table '{}'", self.table)))
    }
}
