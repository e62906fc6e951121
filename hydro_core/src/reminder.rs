//! Hydration reminders.
//!
//! Timing policy lives in [`ReminderPolicy`]: a fixed interval, and an
//! active-hours window (08:00 to 22:00 local time by default) outside of
//! which ticks are swallowed. The timer and the delivery channel are
//! injected through [`Scheduler`] and [`Notifier`] so the policy can be
//! exercised without real timers.

use crate::{Error, ReminderSettings, Result};
use chrono::{Local, NaiveTime, Timelike};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub type Callback = Box<dyn FnMut() + Send + 'static>;

/// Recurring timer capability
pub trait Scheduler {
    /// Start calling `callback` every `interval_seconds`, replacing any
    /// existing schedule
    fn schedule_recurring(&mut self, interval_seconds: u64, callback: Callback) -> Result<()>;

    /// Stop the current schedule, if any
    fn cancel(&mut self);

    fn is_scheduled(&self) -> bool;
}

/// Delivery channel for reminders (desktop notification, terminal, ...)
pub trait Notifier: Send + Sync {
    fn notify(&self, reminder: &Reminder) -> Result<()>;
}

/// A single reminder to deliver
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reminder {
    pub title: String,
    pub body: String,
    pub sound: bool,
}

impl Reminder {
    pub fn hydrate(sound: bool) -> Self {
        Self {
            title: "Time to Hydrate!".into(),
            body: "Don't forget to drink some water. Stay healthy!".into(),
            sound,
        }
    }
}

/// When reminders may fire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub interval: Duration,
    pub active_start_hour: u32,
    pub active_end_hour: u32,
}

impl ReminderPolicy {
    pub fn from_settings(settings: &ReminderSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            interval: Duration::from_secs(u64::from(settings.interval_minutes) * 60),
            active_start_hour: settings.active_start_hour,
            active_end_hour: settings.active_end_hour,
        })
    }

    /// Replace the interval, e.g. from a command-line override
    pub fn with_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Validation("reminder interval must be positive".into()));
        }
        self.interval = interval;
        Ok(self)
    }

    /// Open the window to the whole day
    pub fn all_day(mut self) -> Self {
        self.active_start_hour = 0;
        self.active_end_hour = 24;
        self
    }

    /// `start <= hour < end`
    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        let hour = time.hour();
        hour >= self.active_start_hour && hour < self.active_end_hour
    }
}

type Clock = Arc<dyn Fn() -> NaiveTime + Send + Sync>;

/// Deliver a reminder if `time` is inside the active window.
///
/// Delivery failures are logged and swallowed so one bad tick does not
/// stop the schedule.
fn fire(policy: &ReminderPolicy, notifier: &dyn Notifier, sound: bool, time: NaiveTime) -> bool {
    if !policy.is_active_at(time) {
        tracing::debug!("Reminder at {} suppressed outside active hours", time);
        return false;
    }

    match notifier.notify(&Reminder::hydrate(sound)) {
        Ok(()) => {
            tracing::info!("Hydration reminder delivered at {}", time);
            true
        }
        Err(e) => {
            tracing::warn!("Failed to deliver reminder: {}", e);
            false
        }
    }
}

/// Couples a policy with its scheduler and notifier
pub struct ReminderService<S: Scheduler> {
    policy: ReminderPolicy,
    sound: bool,
    scheduler: S,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
}

impl<S: Scheduler> ReminderService<S> {
    pub fn new(policy: ReminderPolicy, sound: bool, scheduler: S, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            policy,
            sound,
            scheduler,
            notifier,
            clock: Arc::new(|| Local::now().time()),
        }
    }

    pub fn from_settings(
        settings: &ReminderSettings,
        scheduler: S,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let policy = ReminderPolicy::from_settings(settings)?;
        Ok(Self::new(policy, settings.sound_enabled, scheduler, notifier))
    }

    /// Replace the wall clock used when the scheduler fires
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    /// (Re)start the recurring schedule
    pub fn enable(&mut self) -> Result<()> {
        self.scheduler.cancel();

        let policy = self.policy;
        let sound = self.sound;
        let notifier = Arc::clone(&self.notifier);
        let clock = Arc::clone(&self.clock);

        let seconds = policy.interval.as_secs().max(1);
        self.scheduler.schedule_recurring(
            seconds,
            Box::new(move || {
                fire(&policy, notifier.as_ref(), sound, clock());
            }),
        )?;

        tracing::info!(
            "Reminders enabled every {}s between {:02}:00 and {:02}:00",
            seconds,
            policy.active_start_hour,
            policy.active_end_hour
        );
        Ok(())
    }

    pub fn disable(&mut self) {
        self.scheduler.cancel();
        tracing::info!("Reminders disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// Evaluate one tick at `time`; returns whether a reminder went out
    pub fn tick(&self, time: NaiveTime) -> bool {
        fire(&self.policy, self.notifier.as_ref(), self.sound, time)
    }
}

// ============================================================================
// Thread-backed scheduler
// ============================================================================

/// Runs the callback on a background thread until cancelled or dropped
#[derive(Default)]
pub struct ThreadScheduler {
    running: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sub-second granularity variant of [`Scheduler::schedule_recurring`]
    pub fn schedule_every(&mut self, interval: Duration, mut callback: Callback) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::Validation("schedule interval must be positive".into()));
        }
        self.cancel();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("hydrate-reminders".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => callback(),
                    // Stop requested or scheduler dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        self.running = Some((stop_tx, handle));
        Ok(())
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_recurring(&mut self, interval_seconds: u64, callback: Callback) -> Result<()> {
        self.schedule_every(Duration::from_secs(interval_seconds), callback)
    }

    fn cancel(&mut self) {
        if let Some((stop_tx, handle)) = self.running.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                tracing::warn!("Reminder thread panicked");
            }
        }
    }

    fn is_scheduled(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
