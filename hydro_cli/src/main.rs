use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use hydro_core::health::{self, format_amount};
use hydro_core::stats;
use hydro_core::*;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Upper bound for `--days` windows (ten years)
const MAX_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(name = "hydrate")]
#[command(about = "Water intake tracker and health calculators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a drink (defaults to one glass)
    Log {
        /// Amount, in --unit or the preferred unit
        amount: Option<f64>,

        /// Unit of AMOUNT (ml, oz, cups)
        #[arg(long)]
        unit: Option<Unit>,

        /// Attribute the drink to this time (RFC 3339) instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Delete a logged drink by id
    Delete { id: uuid::Uuid },

    /// Show today's drinks and goal progress (default)
    Today,

    /// Show all-time statistics
    Stats,

    /// Show per-day totals
    History {
        /// Number of days to show, ending today
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=MAX_DAYS))]
        days: u32,
    },

    /// Show the current week (Monday to Sunday)
    Week,

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },

    /// Convert a volume between ml, oz and cups
    Convert { amount: f64, from: Unit, to: Unit },

    /// Body mass index
    Bmi {
        /// Weight in kg
        #[arg(long)]
        weight: f64,

        /// Height in cm
        #[arg(long)]
        height: f64,
    },

    /// Estimated daily calorie need (Harris-Benedict)
    Calories {
        #[arg(long)]
        age: u32,

        /// male or female
        #[arg(long)]
        sex: Sex,

        /// Weight in kg
        #[arg(long)]
        weight: f64,

        /// Height in cm
        #[arg(long)]
        height: f64,

        /// sedentary, light, moderate, active or very_active
        #[arg(long, default_value = "moderate")]
        activity: ActivityLevel,
    },

    /// Estimated daily water need
    HydrationGoal {
        /// Weight in kg
        #[arg(long)]
        weight: f64,

        /// sedentary, moderate or active
        #[arg(long, default_value = "moderate")]
        activity: HydrationActivity,

        /// cold, moderate or hot
        #[arg(long, default_value = "moderate")]
        climate: Climate,
    },

    /// Export history to CSV
    Export {
        /// Destination file
        #[arg(long)]
        out: PathBuf,

        /// Export raw entries instead of daily totals
        #[arg(long)]
        entries: bool,

        /// Limit daily totals to the last N days (empty days included)
        #[arg(
            long,
            conflicts_with = "entries",
            value_parser = clap::value_parser!(u32).range(1..=MAX_DAYS)
        )]
        days: Option<u32>,
    },

    /// Rewrite the journal without deleted entries
    Compact,

    /// Run hydration reminders in the foreground
    Remind {
        /// Minutes between reminders (overrides config)
        #[arg(long)]
        interval: Option<u32>,

        /// Stop after this many reminders
        #[arg(long)]
        count: Option<usize>,

        /// Ignore the active-hours window
        #[arg(long)]
        anytime: bool,

        /// Run even if reminders are disabled in config
        #[arg(long)]
        force: bool,

        /// Seconds between reminders (for testing)
        #[arg(long, hide = true, conflicts_with = "interval")]
        every_seconds: Option<u64>,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print current preferences (default)
    Show,

    /// Change one or more preferences
    Set {
        /// Daily goal in ml
        #[arg(long)]
        goal: Option<u32>,

        /// Default glass size in ml
        #[arg(long)]
        glass: Option<u32>,

        /// Preferred display unit (ml, oz, cups)
        #[arg(long)]
        unit: Option<Unit>,
    },
}

/// Resolved paths and configuration shared by every command
struct App {
    data_dir: PathBuf,
    config: Config,
}

impl App {
    fn journal(&self) -> JournalStore {
        JournalStore::in_dir(&self.data_dir)
    }

    fn preferences_store(&self) -> JsonPreferencesStore {
        JsonPreferencesStore::in_dir(&self.data_dir).with_defaults(self.config.defaults.clone())
    }

    fn tracker(&self) -> Result<Tracker<JournalStore>> {
        let prefs = self.preferences_store().load()?;
        Tracker::open(self.journal(), prefs, self.config.streak.options())
    }
}

fn main() -> Result<()> {
    // Keep stdout for command output; diagnostics only when asked for
    hydro_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let app = App { data_dir, config };

    match cli.command.unwrap_or(Commands::Today) {
        Commands::Log { amount, unit, at } => cmd_log(&app, amount, unit, at),
        Commands::Delete { id } => cmd_delete(&app, id),
        Commands::Today => cmd_today(&app),
        Commands::Stats => cmd_stats(&app),
        Commands::History { days } => cmd_history(&app, days),
        Commands::Week => cmd_week(&app),
        Commands::Prefs { action } => match action.unwrap_or(PrefsAction::Show) {
            PrefsAction::Show => cmd_prefs_show(&app),
            PrefsAction::Set { goal, glass, unit } => cmd_prefs_set(&app, goal, glass, unit),
        },
        Commands::Convert { amount, from, to } => cmd_convert(amount, from, to),
        Commands::Bmi { weight, height } => cmd_bmi(weight, height),
        Commands::Calories {
            age,
            sex,
            weight,
            height,
            activity,
        } => cmd_calories(age, sex, weight, height, activity),
        Commands::HydrationGoal {
            weight,
            activity,
            climate,
        } => cmd_hydration_goal(&app, weight, activity, climate),
        Commands::Export { out, entries, days } => cmd_export(&app, out, entries, days),
        Commands::Compact => cmd_compact(&app),
        Commands::Remind {
            interval,
            count,
            anytime,
            force,
            every_seconds,
        } => cmd_remind(&app, interval, count, anytime, force, every_seconds),
    }
}

fn now() -> DateTime<Local> {
    Local::now()
}

fn show(ml: u64, unit: Unit) -> String {
    format_amount(ml as f64, unit)
}

fn cmd_log(
    app: &App,
    amount: Option<f64>,
    unit: Option<Unit>,
    at: Option<String>,
) -> Result<()> {
    let mut tracker = app.tracker()?;
    let prefs = tracker.preferences().clone();

    let ml = match amount {
        Some(value) => validate::amount_in_unit(value, unit.unwrap_or(prefs.preferred_unit))?,
        None => validate::amount(prefs.glass_size)?,
    };
    let new = match at {
        Some(raw) => NewLogEntry::at(ml, validate::timestamp(&raw)?),
        None => NewLogEntry::now(ml),
    };

    let outcome = tracker.add(new, &now())?;
    let unit = prefs.preferred_unit;

    println!(
        "✓ Logged {} ({})",
        show(u64::from(outcome.entry.amount), unit),
        outcome.entry.id
    );
    println!(
        "  {}: {} / {} ({:.0}%)",
        outcome.day.format("%Y-%m-%d"),
        show(outcome.progress.consumed, unit),
        show(u64::from(outcome.progress.goal), unit),
        outcome.progress.percentage
    );

    if outcome.goal_reached {
        println!();
        println!("🎉 Daily goal achieved! Fantastic job staying hydrated!");
    }

    Ok(())
}

fn cmd_delete(app: &App, id: uuid::Uuid) -> Result<()> {
    let mut tracker = app.tracker()?;
    if tracker.delete(id)? {
        println!("✓ Deleted {}", id);
    } else {
        println!("No entry with id {}", id);
    }
    Ok(())
}

fn cmd_today(app: &App) -> Result<()> {
    let tracker = app.tracker()?;
    let now = now();
    let unit = tracker.preferences().preferred_unit;
    let today = tracker.today(&now);
    let progress = tracker.progress(&now);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  TODAY  {}", now.format("%A %d %B %Y"));
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  {} / {} ({:.0}%)",
        show(progress.consumed, unit),
        show(u64::from(progress.goal), unit),
        progress.percentage
    );
    println!("  Remaining: {}", show(progress.remaining, unit));
    println!("  {}", progress.tier.message());
    println!();

    if today.is_empty() {
        println!("  No drinks logged yet today.");
    } else {
        for entry in &today {
            println!(
                "  {}  {:>8}  {}",
                entry.logged_at.with_timezone(&Local).format("%H:%M"),
                show(u64::from(entry.amount), unit),
                entry.id
            );
        }
    }
    println!();

    Ok(())
}

fn cmd_stats(app: &App) -> Result<()> {
    let tracker = app.tracker()?;
    let unit = tracker.preferences().preferred_unit;
    let stats = tracker.stats(&now());

    println!(
        "Total consumed:   {:.1}L",
        stats.total_amount as f64 / 1000.0
    );
    println!("Days active:      {}", stats.active_day_count);
    println!("Current streak:   {} days", stats.current_streak);
    println!("Longest streak:   {} days", stats.longest_streak);
    println!(
        "Average per day:  {}",
        show(stats.average_daily_intake, unit)
    );

    Ok(())
}

fn print_days(days: &[DailyAggregate], unit: Unit) {
    for day in days {
        let mark = if day.goal_achieved { "✓" } else { " " };
        println!(
            "  {}  {:>8}  {:>3} drinks  {}",
            day.date.format("%a %Y-%m-%d"),
            show(day.total_amount, unit),
            day.log_count,
            mark
        );
    }
}

fn cmd_history(app: &App, days: u32) -> Result<()> {
    let tracker = app.tracker()?;
    let unit = tracker.preferences().preferred_unit;
    let history = tracker.history(&now(), days);

    println!("Last {} days (goal {}):", days, show(u64::from(tracker.preferences().daily_goal), unit));
    print_days(&history, unit);
    Ok(())
}

fn cmd_week(app: &App) -> Result<()> {
    let tracker = app.tracker()?;
    let unit = tracker.preferences().preferred_unit;
    let week = tracker.week(&now());

    println!("Week of {}", week.week_start.format("%Y-%m-%d"));
    println!("  Total:          {}", show(week.total_amount, unit));
    println!("  Daily average:  {}", show(week.average_daily, unit));
    println!("  Goal reached:   {}/7 days", week.days_goal_achieved);
    println!();
    print_days(&week.days, unit);
    Ok(())
}

fn cmd_prefs_show(app: &App) -> Result<()> {
    let prefs = app.preferences_store().load()?;
    println!("Daily goal:     {}ml", prefs.daily_goal);
    println!("Glass size:     {}ml", prefs.glass_size);
    println!("Preferred unit: {}", prefs.preferred_unit);
    Ok(())
}

fn cmd_prefs_set(
    app: &App,
    goal: Option<u32>,
    glass: Option<u32>,
    unit: Option<Unit>,
) -> Result<()> {
    let mut store = app.preferences_store();
    let prefs = store.update(|prefs| {
        if let Some(goal) = goal {
            prefs.daily_goal = goal;
        }
        if let Some(glass) = glass {
            prefs.glass_size = glass;
        }
        if let Some(unit) = unit {
            prefs.preferred_unit = unit;
        }
        Ok(())
    })?;

    println!("✓ Preferences saved");
    println!("  Daily goal:     {}ml", prefs.daily_goal);
    println!("  Glass size:     {}ml", prefs.glass_size);
    println!("  Preferred unit: {}", prefs.preferred_unit);
    Ok(())
}

fn cmd_convert(amount: f64, from: Unit, to: Unit) -> Result<()> {
    let amount = validate::positive("amount", amount)?;
    let converted = health::convert(amount, from, to);
    println!("{} {} = {:.2} {}", amount, from, converted, to);
    Ok(())
}

fn cmd_bmi(weight: f64, height: f64) -> Result<()> {
    let weight = validate::positive("weight", weight)?;
    let height = validate::positive("height", height)?;
    let reading = health::bmi(weight, height);
    println!("BMI: {:.1} ({})", reading.bmi, reading.category);
    Ok(())
}

fn cmd_calories(
    age: u32,
    sex: Sex,
    weight: f64,
    height: f64,
    activity: ActivityLevel,
) -> Result<()> {
    let age = validate::age(age)?;
    let weight = validate::positive("weight", weight)?;
    let height = validate::positive("height", height)?;
    let calories = health::calories(age, sex, weight, height, activity);
    println!("Daily calories: {} kcal", calories);
    Ok(())
}

fn cmd_hydration_goal(
    app: &App,
    weight: f64,
    activity: HydrationActivity,
    climate: Climate,
) -> Result<()> {
    let weight = validate::positive("weight", weight)?;
    let goal = health::hydration_goal(weight, activity, climate);
    println!("Hydration goal: {}ml", goal);

    let prefs = app.preferences_store().load()?;
    if prefs.preferred_unit != Unit::Ml {
        println!("                ({})", show(u64::from(goal), prefs.preferred_unit));
    }
    Ok(())
}

fn cmd_export(app: &App, out: PathBuf, entries: bool, days: Option<u32>) -> Result<()> {
    let tracker = app.tracker()?;

    let count = if entries {
        hydro_core::export::export_entries_csv(tracker.entries(), &out)?
    } else {
        let aggregates = match days {
            Some(days) => tracker.history(&now(), days),
            None => stats::daily_aggregates(
                tracker.entries(),
                &Local,
                tracker.preferences().daily_goal,
            ),
        };
        hydro_core::export::export_daily_csv(&aggregates, &out)?
    };

    println!("✓ Exported {} rows to {}", count, out.display());
    Ok(())
}

fn cmd_compact(app: &App) -> Result<()> {
    let journal = app.journal();
    if !journal.path().exists() {
        println!("No journal found - nothing to compact.");
        return Ok(());
    }

    let report = journal.compact()?;
    println!(
        "✓ Compacted journal: {} records -> {} entries",
        report.records_before, report.entries_kept
    );
    Ok(())
}

/// Prints reminders to the terminal and signals the foreground loop
struct ConsoleNotifier {
    fired: Mutex<mpsc::Sender<()>>,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, reminder: &Reminder) -> Result<()> {
        let bell = if reminder.sound && std::io::stdout().is_terminal() {
            "\x07"
        } else {
            ""
        };
        println!(
            "{}💧 {} [{}] {}",
            bell,
            reminder.title,
            Local::now().format("%H:%M"),
            reminder.body
        );

        let sender = self
            .fired
            .lock()
            .map_err(|_| Error::Other("reminder channel poisoned".into()))?;
        // The loop may already have stopped listening
        let _ = sender.send(());
        Ok(())
    }
}

fn cmd_remind(
    app: &App,
    interval: Option<u32>,
    count: Option<usize>,
    anytime: bool,
    force: bool,
    every_seconds: Option<u64>,
) -> Result<()> {
    let settings = &app.config.reminders;
    if !settings.enabled && !force {
        println!("Reminders are disabled. Set reminders.enabled = true in config or pass --force.");
        return Ok(());
    }

    let mut policy = ReminderPolicy::from_settings(settings)?;
    if let Some(minutes) = interval {
        policy = policy.with_interval(Duration::from_secs(u64::from(minutes) * 60))?;
    }
    if let Some(seconds) = every_seconds {
        policy = policy.with_interval(Duration::from_secs(seconds))?;
    }
    if anytime {
        policy = policy.all_day();
    }

    let (tx, rx) = mpsc::channel();
    let notifier = Arc::new(ConsoleNotifier {
        fired: Mutex::new(tx),
    });
    let mut service =
        ReminderService::new(policy, settings.sound_enabled, ThreadScheduler::new(), notifier);
    service.enable()?;

    println!(
        "Reminding every {} between {:02}:00 and {:02}:00 (Ctrl-C to stop)",
        describe_interval(policy.interval),
        policy.active_start_hour,
        policy.active_end_hour
    );

    let mut fired = 0;
    while count.map_or(true, |limit| fired < limit) {
        if rx.recv().is_err() {
            break;
        }
        fired += 1;
    }

    service.disable();
    Ok(())
}

fn describe_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
