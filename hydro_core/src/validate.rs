//! Input validation.
//!
//! The stats engine and health formulas assume well-formed input; everything
//! user-supplied passes through here first and is rejected with
//! [`Error::Validation`].

use crate::{Error, Preferences, ReminderSettings, Result};
use chrono::{DateTime, Utc};

/// Largest single serving accepted (10 litres)
pub const MAX_AMOUNT_ML: u32 = 10_000;

/// A logged amount must be positive and plausible
pub fn amount(ml: u32) -> Result<u32> {
    if ml == 0 {
        return Err(Error::Validation("amount must be greater than zero".into()));
    }
    if ml > MAX_AMOUNT_ML {
        return Err(Error::Validation(format!(
            "amount {}ml exceeds the {}ml limit",
            ml, MAX_AMOUNT_ML
        )));
    }
    Ok(ml)
}

/// Convert a user-entered amount in any unit to whole milliliters
pub fn amount_in_unit(value: f64, unit: crate::Unit) -> Result<u32> {
    let ml = positive("amount", value)?;
    let ml = crate::health::convert(ml, unit, crate::Unit::Ml).round();
    if ml > f64::from(MAX_AMOUNT_ML) {
        return Err(Error::Validation(format!(
            "amount {}ml exceeds the {}ml limit",
            ml, MAX_AMOUNT_ML
        )));
    }
    amount(ml as u32)
}

/// Parse an RFC 3339 timestamp supplied at ingestion
pub fn timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("invalid timestamp '{}': {}", raw, e)))
}

/// A body measurement must be finite and strictly positive
pub fn positive(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Validation(format!(
            "{} must be a positive number, got {}",
            field, value
        )));
    }
    Ok(value)
}

/// Age in whole years, 1..=120
pub fn age(years: u32) -> Result<u32> {
    if years == 0 || years > 120 {
        return Err(Error::Validation(format!(
            "age must be between 1 and 120, got {}",
            years
        )));
    }
    Ok(years)
}

impl Preferences {
    pub fn validate(&self) -> Result<()> {
        if self.daily_goal == 0 {
            return Err(Error::Validation("daily goal must be greater than zero".into()));
        }
        if self.glass_size == 0 {
            return Err(Error::Validation("glass size must be greater than zero".into()));
        }
        amount(self.glass_size)?;
        Ok(())
    }
}

impl ReminderSettings {
    pub fn validate(&self) -> Result<()> {
        if self.interval_minutes == 0 {
            return Err(Error::Validation(
                "reminder interval must be at least one minute".into(),
            ));
        }
        if self.active_end_hour > 24 || self.active_start_hour >= self.active_end_hour {
            return Err(Error::Validation(format!(
                "invalid active hours {}..{}",
                self.active_start_hour, self.active_end_hour
            )));
        }
        Ok(())
    }
}
