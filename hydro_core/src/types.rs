//! Core domain types for the hydrate system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Volume units and the health-calculator enumerations
//! - Log entries and write requests
//! - User preferences and reminder settings
//! - Derived statistics (daily aggregates, streaks, goal progress)

use crate::Error;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Units
// ============================================================================

/// Volume unit used by the store schema, the formulas and display code
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Ml,
    Oz,
    Cups,
}

impl Unit {
    pub const ALL: [Unit; 3] = [Unit::Ml, Unit::Oz, Unit::Cups];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Ml => "ml",
            Unit::Oz => "oz",
            Unit::Cups => "cups",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ml" | "milliliters" | "millilitres" => Ok(Unit::Ml),
            "oz" | "ounces" => Ok(Unit::Oz),
            "cup" | "cups" => Ok(Unit::Cups),
            other => Err(Error::Validation(format!(
                "unknown unit '{}' (expected ml, oz or cups)",
                other
            ))),
        }
    }
}

// ============================================================================
// Health calculator enumerations
// ============================================================================

/// Biological sex, selects the Harris-Benedict coefficients
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(Error::Validation(format!(
                "unknown sex '{}' (expected male or female)",
                other
            ))),
        }
    }
}

/// Activity level for the calorie calculator (five levels)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// Multiplier applied to BMR to estimate total daily energy expenditure
    pub fn factor(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" => Ok(ActivityLevel::VeryActive),
            other => Err(Error::Validation(format!(
                "unknown activity level '{}' (expected sedentary, light, moderate, active or very_active)",
                other
            ))),
        }
    }
}

/// Activity level for the hydration-goal estimate.
///
/// Deliberately a separate, smaller set than [`ActivityLevel`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HydrationActivity {
    Sedentary,
    Moderate,
    Active,
}

impl HydrationActivity {
    pub fn multiplier(&self) -> f64 {
        match self {
            HydrationActivity::Sedentary => 1.0,
            HydrationActivity::Moderate => 1.2,
            HydrationActivity::Active => 1.4,
        }
    }
}

impl FromStr for HydrationActivity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sedentary" => Ok(HydrationActivity::Sedentary),
            "moderate" => Ok(HydrationActivity::Moderate),
            "active" => Ok(HydrationActivity::Active),
            other => Err(Error::Validation(format!(
                "unknown hydration activity '{}' (expected sedentary, moderate or active)",
                other
            ))),
        }
    }
}

/// Ambient climate for the hydration-goal estimate
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Climate {
    Cold,
    Moderate,
    Hot,
}

impl Climate {
    pub fn multiplier(&self) -> f64 {
        match self {
            Climate::Cold => 0.9,
            Climate::Moderate => 1.0,
            Climate::Hot => 1.2,
        }
    }
}

impl FromStr for Climate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cold" => Ok(Climate::Cold),
            "moderate" => Ok(Climate::Moderate),
            "hot" => Ok(Climate::Hot),
            other => Err(Error::Validation(format!(
                "unknown climate '{}' (expected cold, moderate or hot)",
                other
            ))),
        }
    }
}

/// BMI category; thresholds are upper-bound exclusive
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "underweight",
            BmiCategory::Normal => "normal",
            BmiCategory::Overweight => "overweight",
            BmiCategory::Obese => "obese",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a BMI calculation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BmiReading {
    pub weight_kg: f64,
    pub height_cm: f64,
    /// Rounded to one decimal place
    pub bmi: f64,
    pub category: BmiCategory,
}

// ============================================================================
// Log entries
// ============================================================================

/// One recorded water-intake event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: Uuid,
    /// Milliliters, always > 0
    pub amount: u32,
    /// Instant the consumption is attributed to
    pub logged_at: DateTime<Utc>,
    /// Instant the record was stored
    pub created_at: DateTime<Utc>,
}

/// Write request for the log store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLogEntry {
    pub amount: u32,
    pub logged_at: Option<DateTime<Utc>>,
}

impl NewLogEntry {
    /// An entry attributed to the moment it is stored
    pub fn now(amount: u32) -> Self {
        Self {
            amount,
            logged_at: None,
        }
    }

    pub fn at(amount: u32, logged_at: DateTime<Utc>) -> Self {
        Self {
            amount,
            logged_at: Some(logged_at),
        }
    }
}

/// Half-open instant range `[start, end)` for store reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

// ============================================================================
// Preferences and reminder settings
// ============================================================================

/// Per-user configuration, read and written as a whole record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    /// Daily goal in ml
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,
    /// Default serving size in ml
    #[serde(default = "default_glass_size")]
    pub glass_size: u32,
    #[serde(default)]
    pub preferred_unit: Unit,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            daily_goal: default_daily_goal(),
            glass_size: default_glass_size(),
            preferred_unit: Unit::Ml,
        }
    }
}

fn default_daily_goal() -> u32 {
    2000
}

fn default_glass_size() -> u32 {
    250
}

/// Reminder configuration replacing the browser's ambient notification state
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// First local hour (inclusive) in which reminders may fire
    #[serde(default = "default_active_start_hour")]
    pub active_start_hour: u32,

    /// Local hour (exclusive) after which reminders stop
    #[serde(default = "default_active_end_hour")]
    pub active_end_hour: u32,

    #[serde(default = "default_sound_enabled")]
    pub sound_enabled: bool,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
            active_start_hour: default_active_start_hour(),
            active_end_hour: default_active_end_hour(),
            sound_enabled: default_sound_enabled(),
        }
    }
}

fn default_interval_minutes() -> u32 {
    120
}

fn default_active_start_hour() -> u32 {
    8
}

fn default_active_end_hour() -> u32 {
    22
}

fn default_sound_enabled() -> bool {
    true
}

// ============================================================================
// Derived statistics
// ============================================================================

/// How the current streak treats a history whose last log is older than
/// yesterday
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreakPolicy {
    /// Streak is 0 unless today or yesterday has a log
    #[default]
    Strict,
    /// Any history at all seeds the streak at 1, then walks back from
    /// yesterday
    Legacy,
}

/// Totals for one local calendar day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_amount: u64,
    pub log_count: u32,
    pub goal_achieved: bool,
}

impl DailyAggregate {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_amount: 0,
            log_count: 0,
            goal_achieved: false,
        }
    }
}

/// Statistics derived from a collection of log entries
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogStats {
    pub total_amount: u64,
    pub active_day_count: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Rounded mean over active days, 0 with no history
    pub average_daily_intake: u64,
}

/// Seven days starting at `week_start`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub total_amount: u64,
    /// Mean over all seven days, rounded
    pub average_daily: u64,
    pub days_goal_achieved: u32,
    pub days: Vec<DailyAggregate>,
}

/// Encouragement band for the daily goal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTier {
    GettingStarted,
    Halfway,
    AlmostThere,
    Achieved,
}

impl ProgressTier {
    pub fn message(&self) -> &'static str {
        match self {
            ProgressTier::Achieved => "Goal achieved! Excellent work!",
            ProgressTier::AlmostThere => "Almost there! Keep it up!",
            ProgressTier::Halfway => "Great progress! You're halfway there!",
            ProgressTier::GettingStarted => "Let's start hydrating!",
        }
    }
}

/// Progress of a day's intake against the daily goal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GoalProgress {
    pub consumed: u64,
    pub goal: u32,
    /// 0..=100
    pub percentage: f64,
    pub remaining: u64,
    pub tier: ProgressTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parse_and_display() {
        assert_eq!("ml".parse::<Unit>().unwrap(), Unit::Ml);
        assert_eq!("OZ".parse::<Unit>().unwrap(), Unit::Oz);
        assert_eq!("cup".parse::<Unit>().unwrap(), Unit::Cups);
        assert!("gallons".parse::<Unit>().unwrap_err().is_validation());

        for unit in Unit::ALL {
            assert_eq!(unit.to_string().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_unit_serde_names() {
        assert_eq!(serde_json::to_string(&Unit::Cups).unwrap(), "\"cups\"");
        let parsed: Unit = serde_json::from_str("\"oz\"").unwrap();
        assert_eq!(parsed, Unit::Oz);
    }

    #[test]
    fn test_activity_sets_are_distinct() {
        assert_eq!(
            "very-active".parse::<ActivityLevel>().unwrap(),
            ActivityLevel::VeryActive
        );
        assert!("light".parse::<HydrationActivity>().is_err());
        assert!("very_active".parse::<HydrationActivity>().is_err());
    }

    #[test]
    fn test_activity_factors() {
        assert_eq!(ActivityLevel::Sedentary.factor(), 1.2);
        assert_eq!(ActivityLevel::VeryActive.factor(), 1.9);
        assert_eq!(HydrationActivity::Sedentary.multiplier(), 1.0);
        assert_eq!(Climate::Cold.multiplier(), 0.9);
    }

    #[test]
    fn test_partial_preferences_use_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"daily_goal": 3000}"#).unwrap();
        assert_eq!(prefs.daily_goal, 3000);
        assert_eq!(prefs.glass_size, 250);
        assert_eq!(prefs.preferred_unit, Unit::Ml);
    }

    #[test]
    fn test_date_range_is_half_open() {
        let start = Utc::now();
        let end = start + chrono::Duration::hours(1);
        let range = DateRange::new(start, end);
        assert!(range.contains(start));
        assert!(!range.contains(end));
    }
}
