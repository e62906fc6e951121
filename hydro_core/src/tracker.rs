//! Host-side coordinator between a log store and the stats engine.
//!
//! The tracker keeps the last successfully fetched entries and re-derives
//! every statistic from them on demand. After a create or delete, or when
//! the store reports a change, it re-reads the store. A failed read leaves
//! the previous entries in place, so stats keep working on stale data and
//! the error is handed back to the caller to surface.

use crate::stats::{self, StreakOptions};
use crate::{
    DailyAggregate, GoalProgress, LogEntry, LogStats, LogStore, NewLogEntry, Preferences,
    Result, WeeklySummary,
};
use chrono::{DateTime, NaiveDate, TimeZone};
use uuid::Uuid;

/// Change notification from the store's subscription channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted(Uuid),
    Deleted(Uuid),
    /// Anything else, e.g. a reconnect; treat the cache as invalid
    Reset,
}

/// Result of logging an entry through the tracker
#[derive(Clone, Debug)]
pub struct AddOutcome {
    pub entry: LogEntry,
    /// Local calendar day the entry counts toward
    pub day: NaiveDate,
    /// Progress for that day after the addition
    pub progress: GoalProgress,
    /// This entry moved the day's total across the goal
    pub goal_reached: bool,
}

pub struct Tracker<S: LogStore> {
    store: S,
    entries: Vec<LogEntry>,
    preferences: Preferences,
    options: StreakOptions,
}

impl<S: LogStore> Tracker<S> {
    pub fn new(store: S, preferences: Preferences, options: StreakOptions) -> Self {
        Self {
            store,
            entries: Vec::new(),
            preferences,
            options,
        }
    }

    /// Build a tracker and perform the initial fetch
    pub fn open(store: S, preferences: Preferences, options: StreakOptions) -> Result<Self> {
        let mut tracker = Self::new(store, preferences, options);
        tracker.refresh()?;
        Ok(tracker)
    }

    /// Re-read all entries from the store.
    ///
    /// On failure the previously fetched entries are kept.
    pub fn refresh(&mut self) -> Result<usize> {
        match self.store.list(None) {
            Ok(entries) => {
                self.entries = entries;
                tracing::debug!("Tracker refreshed with {} entries", self.entries.len());
                Ok(self.entries.len())
            }
            Err(e) => {
                tracing::warn!(
                    "Refresh failed, keeping {} cached entries: {}",
                    self.entries.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// React to a change pushed by the store
    pub fn on_change(&mut self, event: &ChangeEvent) -> Result<()> {
        tracing::debug!("Store change: {:?}", event);
        self.refresh().map(|_| ())
    }

    /// Log an entry and report progress for its day.
    ///
    /// `now` supplies the timezone of the display calendar.
    pub fn add<Tz: TimeZone>(&mut self, new: NewLogEntry, now: &DateTime<Tz>) -> Result<AddOutcome> {
        let tz = now.timezone();
        let entry = self.store.add(new)?;
        let day = stats::day_key(entry.logged_at, &tz);

        if self.refresh().is_err() {
            // The write succeeded; keep the cache consistent with it.
            self.entries.insert(0, entry.clone());
        }

        // Other clients may have logged since the last refresh, so the
        // day's total before this entry comes from the same snapshot.
        let current = self.total_on(day, &tz);
        let previous = current.saturating_sub(u64::from(entry.amount));
        let goal = self.preferences.daily_goal;

        Ok(AddOutcome {
            day,
            progress: stats::goal_progress(current, goal),
            goal_reached: stats::crossed_goal(previous, current, goal),
            entry,
        })
    }

    /// Delete an entry; unknown ids are a no-op returning `false`
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        let removed = self.store.delete(id)?;
        if self.refresh().is_err() {
            self.entries.retain(|e| e.id != id);
        }
        Ok(removed)
    }

    fn total_on<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> u64 {
        stats::total_amount(&stats::entries_on(&self.entries, day, tz))
    }

    /// Last successfully fetched entries, newest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All-time statistics
    pub fn stats<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> LogStats {
        stats::compute_stats(&self.entries, now, self.options)
    }

    /// Entries logged on the current local day
    pub fn today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<LogEntry> {
        stats::entries_on(&self.entries, now.date_naive(), &now.timezone())
    }

    /// Today's progress toward the daily goal
    pub fn progress<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> GoalProgress {
        let consumed = stats::total_amount(&self.today(now));
        stats::goal_progress(consumed, self.preferences.daily_goal)
    }

    /// Per-day aggregates for the last `days` days, newest first
    pub fn history<Tz: TimeZone>(&self, now: &DateTime<Tz>, days: u32) -> Vec<DailyAggregate> {
        stats::daily_window(
            &self.entries,
            &now.timezone(),
            self.preferences.daily_goal,
            now.date_naive(),
            days,
        )
    }

    /// Summary of the current Monday-based week
    pub fn week<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> WeeklySummary {
        stats::weekly_summary(
            &self.entries,
            stats::week_start(now.date_naive()),
            &now.timezone(),
            self.preferences.daily_goal,
        )
    }
}
