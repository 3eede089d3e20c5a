use super::model::{
    ActivityLogEditInput, ActivityLogInput, Batch, BatchInput, LogDateTime,
    SustainabilityLogEditInput, SustainabilityLogInput,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field '{field}' is empty")]
    EmptyRequiredField { field: &'static str },

    #[error("invalid time range")]
    InvalidTimeRange,

    #[error("expected yield must be greater than zero")]
    InvalidYield,

    #[error("batch '{0}' does not exist")]
    InvalidBatchId(String),

    #[error("area covered must be greater than zero")]
    InvalidAreaCovered,

    #[error("date is in the future")]
    InvalidDate,

    #[error("field '{field}' exceeds {max} characters")]
    StringTooLong { field: &'static str, max: usize },
}

/// Upper bounds applied to free-text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum length in characters of any free-text field. Zero disables the check.
    pub max_string_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string_length: 256,
        }
    }
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyRequiredField { field });
    }
    Ok(())
}

pub fn check_length(
    field: &'static str,
    value: &str,
    limits: &Limits,
) -> Result<(), ValidationError> {
    if limits.max_string_length > 0 && value.chars().count() > limits.max_string_length {
        return Err(ValidationError::StringTooLong {
            field,
            max: limits.max_string_length,
        });
    }
    Ok(())
}

pub fn check_batch_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if start >= end {
        return Err(ValidationError::InvalidTimeRange);
    }
    Ok(())
}

pub fn check_yield(expected_yield: u64) -> Result<(), ValidationError> {
    if expected_yield == 0 {
        return Err(ValidationError::InvalidYield);
    }
    Ok(())
}

pub fn check_area(area_covered: u64) -> Result<(), ValidationError> {
    if area_covered == 0 {
        return Err(ValidationError::InvalidAreaCovered);
    }
    Ok(())
}

pub fn check_not_future(date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if date > now {
        return Err(ValidationError::InvalidDate);
    }
    Ok(())
}

/// Hour and minute must be on the clock, and `start` must come strictly
/// before `end` under (date, hour, minute) ordering.
pub fn check_log_window(start: &LogDateTime, end: &LogDateTime) -> Result<(), ValidationError> {
    for point in [start, end] {
        if point.hour > 23 || point.minute > 59 {
            return Err(ValidationError::InvalidTimeRange);
        }
    }
    if start >= end {
        return Err(ValidationError::InvalidTimeRange);
    }
    Ok(())
}

/// Referential check: the key must resolve to a batch that exists.
pub fn check_batch_reference(batch_id: &str, batch: Option<&Batch>) -> Result<(), ValidationError> {
    match batch {
        Some(batch) if batch.exists() => Ok(()),
        _ => Err(ValidationError::InvalidBatchId(batch_id.to_string())),
    }
}

/// Field checks shared by batch creation and batch edits.
pub fn validate_batch(input: &BatchInput, limits: &Limits) -> Result<(), ValidationError> {
    require_non_empty("batch_id", &input.batch_id)?;
    require_non_empty("crop_name", &input.crop_name)?;
    require_non_empty("farmer", &input.farmer)?;
    check_batch_window(input.start, input.end)?;
    check_yield(input.expected_yield)?;

    check_length("batch_id", &input.batch_id, limits)?;
    check_length("crop_name", &input.crop_name, limits)?;
    check_length("farmer", &input.farmer, limits)?;
    check_length("land", &input.land, limits)?;
    check_length("status", &input.status, limits)?;
    Ok(())
}

fn validate_activity_fields(
    activity_name: &str,
    start: &LogDateTime,
    end: &LogDateTime,
    area_covered: u64,
    now: DateTime<Utc>,
    limits: &Limits,
) -> Result<(), ValidationError> {
    require_non_empty("activity_name", activity_name)?;
    check_log_window(start, end)?;
    check_area(area_covered)?;
    check_not_future(start.date, now)?;
    check_length("activity_name", activity_name, limits)?;
    Ok(())
}

pub fn validate_activity(
    input: &ActivityLogInput,
    now: DateTime<Utc>,
    limits: &Limits,
) -> Result<(), ValidationError> {
    check_length("batch_id", &input.batch_id, limits)?;
    validate_activity_fields(
        &input.activity_name,
        &input.start,
        &input.end,
        input.area_covered,
        now,
        limits,
    )
}

pub fn validate_activity_edit(
    input: &ActivityLogEditInput,
    now: DateTime<Utc>,
    limits: &Limits,
) -> Result<(), ValidationError> {
    validate_activity_fields(
        &input.activity_name,
        &input.start,
        &input.end,
        input.area_covered,
        now,
        limits,
    )
}

fn validate_sustainability_fields(
    practice_name: &str,
    implementation_date: DateTime<Utc>,
    impact_description: &str,
    area_covered: u64,
    now: DateTime<Utc>,
    limits: &Limits,
) -> Result<(), ValidationError> {
    require_non_empty("practice_name", practice_name)?;
    require_non_empty("impact_description", impact_description)?;
    check_area(area_covered)?;
    check_not_future(implementation_date, now)?;
    check_length("practice_name", practice_name, limits)?;
    check_length("impact_description", impact_description, limits)?;
    Ok(())
}

pub fn validate_sustainability(
    input: &SustainabilityLogInput,
    now: DateTime<Utc>,
    limits: &Limits,
) -> Result<(), ValidationError> {
    check_length("batch_id", &input.batch_id, limits)?;
    validate_sustainability_fields(
        &input.practice_name,
        input.implementation_date,
        &input.impact_description,
        input.area_covered,
        now,
        limits,
    )
}

pub fn validate_sustainability_edit(
    input: &SustainabilityLogEditInput,
    now: DateTime<Utc>,
    limits: &Limits,
) -> Result<(), ValidationError> {
    validate_sustainability_fields(
        &input.practice_name,
        input.implementation_date,
        &input.impact_description,
        input.area_covered,
        now,
        limits,
    )
}
