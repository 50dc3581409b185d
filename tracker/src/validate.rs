use crate::errors::{Error, Result};
use crate::model::DeviceStatus;
use crate::ports::{CreateMaintenanceInput, PlanInput};
use chrono::NaiveDate;

const YEAR_MIN: i32 = 1970;

/// Returns the trimmed value, rejecting empty strings
pub fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Empty optional strings are treated as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_year(year: i32) -> Result<()> {
    if year < YEAR_MIN {
        return Err(Error::Validation(format!(
            "year {} is invalid (must be >= {})",
            year, YEAR_MIN
        )));
    }
    Ok(())
}

pub fn validate_commission_date(date: Option<NaiveDate>, today: NaiveDate) -> Result<()> {
    match date {
        Some(d) if d > today => Err(Error::Validation(format!(
            "commission_date {} cannot be in the future",
            d
        ))),
        _ => Ok(()),
    }
}

pub fn parse_status(value: &str) -> Result<DeviceStatus> {
    value.parse::<DeviceStatus>().map_err(Error::Validation)
}

pub fn validate_hours(field: &str, hours: i32) -> Result<()> {
    if hours < 0 {
        return Err(Error::Validation(format!(
            "{} cannot be negative (got {})",
            field, hours
        )));
    }
    Ok(())
}

/// Validates plan fields and returns the input with a trimmed name
pub fn validate_plan(input: PlanInput) -> Result<PlanInput> {
    let name = require_non_empty("name", &input.name)?;
    validate_hours("interval_hours", input.interval_hours)?;

    match (input.threshold_min, input.threshold_max) {
        (Some(min), Some(max)) => {
            if !min.is_finite() || !max.is_finite() {
                return Err(Error::Validation(
                    "threshold bounds must be finite numbers".to_string(),
                ));
            }
            if min > max {
                return Err(Error::Validation(format!(
                    "threshold_min {} is greater than threshold_max {}",
                    min, max
                )));
            }
        }
        (None, None) => {}
        _ => {
            return Err(Error::Validation(
                "threshold_min and threshold_max must be set together".to_string(),
            ))
        }
    }

    Ok(PlanInput {
        name,
        description: non_empty(input.description),
        ..input
    })
}

pub fn validate_maintenance(input: &CreateMaintenanceInput) -> Result<()> {
    if let Some(interval) = input.interval_hours {
        if interval <= 0 {
            return Err(Error::Validation(format!(
                "interval_hours must be positive (got {})",
                interval
            )));
        }
    }
    if let Some(cost) = input.cost {
        if !cost.is_finite() || cost < 0.0 {
            return Err(Error::Validation(format!("cost {} is invalid", cost)));
        }
    }
    Ok(())
}
