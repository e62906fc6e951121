//! Streak and aggregate engine.
//!
//! Derives totals, per-day aggregates and streaks from a raw collection of
//! log entries. Every function here is pure: callers fetch the entries, pass
//! them in, and re-run the derivation after any create or delete.
//!
//! Calendar days are always taken in the caller's timezone (the display
//! calendar), never UTC, so a log at 23:30 local time counts for that local
//! day.

use crate::{
    DailyAggregate, DateRange, GoalProgress, LogEntry, LogStats, ProgressTier, StreakPolicy,
    WeeklySummary,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Default bound on the backward walk when counting the current streak
pub const DEFAULT_LOOKBACK_DAYS: u32 = 365;

/// Streak computation knobs, normally taken from [`crate::config::StreakConfig`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreakOptions {
    pub policy: StreakPolicy,
    /// Longest streak that will be reported; longer runs report this value
    pub lookback_days: u32,
}

impl Default for StreakOptions {
    fn default() -> Self {
        Self {
            policy: StreakPolicy::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Calendar day of an instant in the given timezone
pub fn day_key<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// Set of distinct calendar days that have at least one entry
pub fn day_keys<Tz: TimeZone>(entries: &[LogEntry], tz: &Tz) -> BTreeSet<NaiveDate> {
    entries.iter().map(|e| day_key(e.logged_at, tz)).collect()
}

/// Sum of all amounts, whatever range the collection covers
pub fn total_amount(entries: &[LogEntry]) -> u64 {
    entries.iter().map(|e| u64::from(e.amount)).sum()
}

/// Count of consecutive days with a log, ending today or yesterday
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate, options: StreakOptions) -> u32 {
    let cap = options.lookback_days;
    if days.is_empty() || cap == 0 {
        return 0;
    }

    match options.policy {
        StreakPolicy::Legacy => {
            // Any history seeds the streak, today itself is never checked.
            let mut streak = 1;
            let mut day = today.pred_opt();
            while let Some(d) = day {
                if streak >= cap || !days.contains(&d) {
                    break;
                }
                streak += 1;
                day = d.pred_opt();
            }
            streak
        }
        StreakPolicy::Strict => {
            let anchor = if days.contains(&today) {
                today
            } else {
                match today.pred_opt() {
                    Some(yesterday) if days.contains(&yesterday) => yesterday,
                    _ => return 0,
                }
            };
            count_back(days, anchor, cap)
        }
    }
}

fn count_back(days: &BTreeSet<NaiveDate>, anchor: NaiveDate, cap: u32) -> u32 {
    let mut streak = 0;
    let mut day = Some(anchor);
    while let Some(d) = day {
        if streak >= cap || !days.contains(&d) {
            break;
        }
        streak += 1;
        day = d.pred_opt();
    }
    streak
}

/// Longest run of consecutive days anywhere in the history
pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous.and_then(|p| p.succ_opt()) {
            Some(next) if next == day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}

/// Derive all-time statistics for a collection of entries.
///
/// `now` supplies both "today" and the timezone used for day keys.
pub fn compute_stats<Tz: TimeZone>(
    entries: &[LogEntry],
    now: &DateTime<Tz>,
    options: StreakOptions,
) -> LogStats {
    let tz = now.timezone();
    let days = day_keys(entries, &tz);
    let total = total_amount(entries);
    let active = days.len() as u32;

    let average = if active == 0 {
        0
    } else {
        (total as f64 / f64::from(active)).round() as u64
    };

    let stats = LogStats {
        total_amount: total,
        active_day_count: active,
        current_streak: current_streak(&days, now.date_naive(), options),
        longest_streak: longest_streak(&days),
        average_daily_intake: average,
    };

    tracing::debug!(
        entries = entries.len(),
        active_days = stats.active_day_count,
        streak = stats.current_streak,
        "Computed log stats"
    );
    stats
}

fn totals_by_day<Tz: TimeZone>(entries: &[LogEntry], tz: &Tz) -> BTreeMap<NaiveDate, (u64, u32)> {
    let mut totals: BTreeMap<NaiveDate, (u64, u32)> = BTreeMap::new();
    for entry in entries {
        let slot = totals.entry(day_key(entry.logged_at, tz)).or_default();
        slot.0 += u64::from(entry.amount);
        slot.1 += 1;
    }
    totals
}

fn aggregate(date: NaiveDate, total: u64, count: u32, goal: u32) -> DailyAggregate {
    DailyAggregate {
        date,
        total_amount: total,
        log_count: count,
        goal_achieved: count > 0 && total >= u64::from(goal),
    }
}

/// One aggregate per active day, newest first
pub fn daily_aggregates<Tz: TimeZone>(
    entries: &[LogEntry],
    tz: &Tz,
    goal: u32,
) -> Vec<DailyAggregate> {
    totals_by_day(entries, tz)
        .into_iter()
        .rev()
        .map(|(date, (total, count))| aggregate(date, total, count, goal))
        .collect()
}

/// Aggregates for the `days` calendar days ending at `end`, newest first.
///
/// Days without entries appear as empty aggregates.
pub fn daily_window<Tz: TimeZone>(
    entries: &[LogEntry],
    tz: &Tz,
    goal: u32,
    end: NaiveDate,
    days: u32,
) -> Vec<DailyAggregate> {
    let totals = totals_by_day(entries, tz);
    let mut window = Vec::new();
    let mut day = Some(end);

    for _ in 0..days {
        let Some(d) = day else { break };
        let agg = match totals.get(&d) {
            Some(&(total, count)) => aggregate(d, total, count, goal),
            None => DailyAggregate::empty(d),
        };
        window.push(agg);
        day = d.pred_opt();
    }

    window
}

/// Monday of the week containing `day`
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// Summary of the seven days starting at `week_start`, oldest day first
pub fn weekly_summary<Tz: TimeZone>(
    entries: &[LogEntry],
    week_start: NaiveDate,
    tz: &Tz,
    goal: u32,
) -> WeeklySummary {
    let end = week_start + Duration::days(6);
    let mut days = daily_window(entries, tz, goal, end, 7);
    days.reverse();

    let total: u64 = days.iter().map(|d| d.total_amount).sum();
    let achieved = days.iter().filter(|d| d.goal_achieved).count() as u32;

    WeeklySummary {
        week_start,
        total_amount: total,
        average_daily: (total as f64 / 7.0).round() as u64,
        days_goal_achieved: achieved,
        days,
    }
}

/// Instant at which the local calendar `day` begins.
///
/// When midnight falls into a DST gap the day starts at the first local
/// time that exists, e.g. 01:00 when clocks jump from 00:00.
pub fn local_midnight<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    // Transitions fall on quarter hours; no gap is longer than a few hours
    (0..=16)
        .find_map(|quarter| {
            tz.from_local_datetime(&(midnight + Duration::minutes(15 * quarter)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight).with_timezone(&Utc))
}

/// Instant range covering one local calendar day
pub fn day_range<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> DateRange {
    let next = day.succ_opt().unwrap_or(day);
    DateRange::new(local_midnight(day, tz), local_midnight(next, tz))
}

/// Entries whose local calendar day is `day`
pub fn entries_on<Tz: TimeZone>(entries: &[LogEntry], day: NaiveDate, tz: &Tz) -> Vec<LogEntry> {
    let range = day_range(day, tz);
    entries
        .iter()
        .filter(|e| range.contains(e.logged_at))
        .cloned()
        .collect()
}

/// Progress of `consumed` ml against a daily goal
pub fn goal_progress(consumed: u64, goal: u32) -> GoalProgress {
    let percentage = if goal == 0 {
        100.0
    } else {
        (consumed as f64 / f64::from(goal) * 100.0).min(100.0)
    };

    let tier = if percentage >= 100.0 {
        ProgressTier::Achieved
    } else if percentage >= 75.0 {
        ProgressTier::AlmostThere
    } else if percentage >= 50.0 {
        ProgressTier::Halfway
    } else {
        ProgressTier::GettingStarted
    };

    GoalProgress {
        consumed,
        goal,
        percentage,
        remaining: u64::from(goal).saturating_sub(consumed),
        tier,
    }
}

/// True only when an addition moved the day's total across the goal
pub fn crossed_goal(previous: u64, current: u64, goal: u32) -> bool {
    let goal = u64::from(goal);
    previous < goal && current >= goal
}
