use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use luna_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "luna")]
#[command(about = "Menstrual cycle tracking and prediction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User whose data to use (defaults to the configured user)
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a day, replacing anything already logged on that date
    Log {
        /// Date to log (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Flow: none, light, medium or heavy
        #[arg(long)]
        flow: Option<Flow>,

        /// Symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,

        #[arg(long)]
        mood: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a log by date or id
    Delete {
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        date: Option<NaiveDate>,

        #[arg(long)]
        id: Option<Uuid>,
    },

    /// List logs, oldest first
    Logs {
        #[arg(long)]
        json: bool,
    },

    /// List derived cycles, most recent first
    Cycles {
        #[arg(long)]
        json: bool,
    },

    /// Show cycle statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Predict the next period, ovulation and fertile window
    Predict {
        /// Reference day for the countdown (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,

        #[arg(long)]
        json: bool,
    },

    /// Show a month with each day classified
    Calendar {
        /// Month to show (YYYY-MM, defaults to the current month)
        #[arg(long, value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },

    /// Manage reminders
    Reminder {
        #[command(subcommand)]
        command: ReminderCommands,
    },

    /// Print the cycle summary used as chat context
    Summary,

    /// Export logs to CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },

    /// Import logs from CSV
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ReminderCommands {
    /// Add a reminder
    Add {
        /// period, fertile, ovulation, medication or custom
        #[arg(long)]
        event: String,

        #[arg(long, default_value_t = 0)]
        days: i64,

        /// before, after or on
        #[arg(long, default_value = "before")]
        when: String,

        /// HH:MM (defaults to the configured reminder time)
        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        message: Option<String>,

        /// Create the reminder switched off
        #[arg(long)]
        disabled: bool,
    },

    /// List reminders with their next trigger
    List,

    /// Enable or disable a reminder
    Toggle { id: Uuid },

    /// Change fields of a reminder
    Edit {
        id: Uuid,

        #[arg(long)]
        event: Option<String>,

        #[arg(long)]
        days: Option<i64>,

        #[arg(long)]
        when: Option<String>,

        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        message: Option<String>,
    },

    /// Delete a reminder
    Remove { id: Uuid },

    /// Reminders firing on a date
    Due {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn parse_month(s: &str) -> std::result::Result<(i32, u32), String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
    let year = year
        .parse::<i32>()
        .map_err(|_| format!("invalid year in '{}'", s))?;
    let month = month
        .parse::<u32>()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| format!("invalid month in '{}'", s))?;
    Ok((year, month))
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    luna_core::logging::init_from_config(&config);

    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let user = match cli.user {
        Some(id) => UserId::new(id)?,
        None => config.default_user()?,
    };
    tracing::debug!("Using data dir {:?} for user {}", data_dir, user);

    let tracker = Tracker::new(JsonStore::new(data_dir));
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Log {
            date,
            flow,
            symptoms,
            mood,
            notes,
        } => {
            let entry = LogEntry {
                date: Some(date.unwrap_or(today)),
                flow,
                symptoms,
                mood,
                notes,
            };
            cmd_log(&tracker, &user, entry)
        }
        Commands::Delete { date, id } => cmd_delete(&tracker, &user, date, id),
        Commands::Logs { json } => cmd_logs(&tracker, &user, json),
        Commands::Cycles { json } => cmd_cycles(&tracker, &user, json),
        Commands::Stats { json } => cmd_stats(&tracker, &user, json),
        Commands::Predict { today: at, json } => {
            cmd_predict(&tracker, &user, at.unwrap_or(today), json)
        }
        Commands::Calendar { month } => {
            let (year, month) = month.unwrap_or_else(|| {
                use chrono::Datelike;
                (today.year(), today.month())
            });
            cmd_calendar(&tracker, &user, year, month)
        }
        Commands::Reminder { command } => cmd_reminder(&tracker, &user, command, &config, today),
        Commands::Summary => cmd_summary(&tracker, &user),
        Commands::Export { out } => {
            let count = luna_core::csv_io::export_logs(&tracker, &user, &out)?;
            println!("✓ Exported {} logs to {}", count, out.display());
            Ok(())
        }
        Commands::Import { file } => {
            let count = luna_core::csv_io::import_logs(&tracker, &user, &file)?;
            println!("✓ Imported {} logs", count);
            Ok(())
        }
    }
}

type Luna = Tracker<JsonStore>;

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_log(tracker: &Luna, user: &UserId, entry: LogEntry) -> Result<()> {
    let log = tracker.log_day(user, entry)?;
    println!("✓ Logged {}", describe_log(&log));
    Ok(())
}

fn cmd_delete(
    tracker: &Luna,
    user: &UserId,
    date: Option<NaiveDate>,
    id: Option<Uuid>,
) -> Result<()> {
    match (date, id) {
        (Some(date), _) => {
            tracker.delete_log_on(user, date)?;
            println!("✓ Deleted log on {}", date);
        }
        (None, Some(id)) => {
            tracker.delete_log(user, id)?;
            println!("✓ Deleted log {}", id);
        }
        (None, None) => return Err(Error::invalid("date", "give --date or --id")),
    }
    Ok(())
}

fn describe_log(log: &DailyLog) -> String {
    let mut parts = vec![log.date.to_string()];
    if let Some(flow) = log.flow {
        parts.push(format!("flow: {}", flow));
    }
    if !log.symptoms.is_empty() {
        let symptoms: Vec<_> = log.symptoms.iter().map(String::as_str).collect();
        parts.push(format!("symptoms: {}", symptoms.join(", ")));
    }
    if let Some(ref mood) = log.mood {
        parts.push(format!("mood: {}", mood));
    }
    if let Some(ref notes) = log.notes {
        parts.push(format!("notes: {}", notes));
    }
    parts.join("  ")
}

fn cmd_logs(tracker: &Luna, user: &UserId, json: bool) -> Result<()> {
    let logs = tracker.logs(user)?;
    if json {
        return print_json(&logs);
    }
    if logs.is_empty() {
        println!("No logs yet.");
        return Ok(());
    }
    for log in &logs {
        println!("{}  {}", log.id, describe_log(log));
    }
    Ok(())
}

fn cmd_cycles(tracker: &Luna, user: &UserId, json: bool) -> Result<()> {
    let cycles = tracker.cycles(user)?;
    if json {
        return print_json(&cycles);
    }
    if cycles.is_empty() {
        println!("No cycles yet. Log a period day with a flow to start one.");
        return Ok(());
    }
    for cycle in &cycles {
        let length = cycle
            .cycle_length
            .map(|l| format!("{} days", l))
            .unwrap_or_else(|| "ongoing".into());
        println!(
            "{} to {}  period {} days  cycle {}",
            cycle.start_date, cycle.end_date, cycle.period_length, length
        );
    }
    Ok(())
}

fn cmd_stats(tracker: &Luna, user: &UserId, json: bool) -> Result<()> {
    let stats = tracker.stats(user)?;
    if json {
        return print_json(&stats);
    }
    println!("Average cycle length:  {:.1} days", stats.average_cycle_length);
    println!("Average period length: {:.1} days", stats.average_period_length);
    println!("Variability:           {:.1} days", stats.variability);
    println!("Regularity:            {}", stats.regularity());
    println!(
        "Cycles:                {} ({} complete)",
        stats.total_cycles, stats.completed_cycles
    );
    Ok(())
}

fn cmd_predict(tracker: &Luna, user: &UserId, today: NaiveDate, json: bool) -> Result<()> {
    let Some(status) = tracker.status(user, today)? else {
        if json {
            return print_json(&serde_json::Value::Null);
        }
        println!("No period data yet. Log a period day to get predictions.");
        return Ok(());
    };
    if json {
        return print_json(&status);
    }

    let p = &status.projection;
    println!("Next period:    {} to {}", p.next_period_start, p.next_period_end);
    println!("Ovulation:      {}", p.ovulation_day);
    println!(
        "Fertile window: {} to {}",
        p.fertile_start,
        p.ovulation_day.pred_opt().unwrap_or(p.ovulation_day)
    );
    println!("Regularity:     {}", status.stats.regularity());
    println!();
    if let Some(day) = status.cycle_day {
        println!("Today ({}) is cycle day {} ({})", today, day, status.today_kind);
    }
    match status.days_until_next_period {
        n if n > 0 => println!("{} days until next period", n),
        0 => println!("Period expected today"),
        n => println!("Period is {} days late", -n),
    }
    Ok(())
}

fn cmd_calendar(tracker: &Luna, user: &UserId, year: i32, month: u32) -> Result<()> {
    use chrono::Datelike;

    let days = tracker.month(user, year, month)?;
    println!("{}-{:02}", year, month);
    println!(" Mo Tu We Th Fr Sa Su");

    let lead = days
        .first()
        .map(|(date, _)| date.weekday().num_days_from_monday())
        .unwrap_or(0);
    let mut line = "   ".repeat(lead as usize);
    for (date, kind) in &days {
        line.push_str(&format!("{:>2}{}", date.day(), kind.marker()));
        if date.weekday() == chrono::Weekday::Sun {
            println!("{}", line.trim_end());
            line.clear();
        }
    }
    if !line.is_empty() {
        println!("{}", line.trim_end());
    }

    println!();
    for kind in [
        DayKind::Period,
        DayKind::PredictedPeriod,
        DayKind::Fertile,
        DayKind::Ovulation,
    ] {
        println!("  {} {}", kind.marker(), kind);
    }
    Ok(())
}

fn describe_trigger(trigger: &Trigger) -> String {
    match trigger {
        Trigger::At(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        Trigger::Unresolvable => "no prediction yet".into(),
        Trigger::NotCycleBound => "own schedule".into(),
        Trigger::OutOfRange => "beyond the supported calendar".into(),
    }
}

fn describe_rule(rule: &ReminderRule) -> String {
    let mut text = format!(
        "{}  {}  {} at {}  [{}]",
        rule.id,
        rule.event,
        rule.offset,
        rule.time,
        if rule.enabled { "on" } else { "off" }
    );
    if let Some(ref message) = rule.message {
        text.push_str(&format!("  \"{}\"", message));
    }
    text
}

fn cmd_reminder(
    tracker: &Luna,
    user: &UserId,
    command: ReminderCommands,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    match command {
        ReminderCommands::Add {
            event,
            days,
            when,
            time,
            message,
            disabled,
        } => {
            let draft = ReminderDraft {
                event,
                days,
                when,
                time: time.unwrap_or_else(|| config.reminders.default_time.clone()),
                message,
                enabled: Some(!disabled),
            };
            let rule = tracker.add_reminder(user, draft)?;
            println!("✓ Added reminder {}", describe_rule(&rule));
        }
        ReminderCommands::List => {
            let evaluated = tracker.evaluate_reminders(user)?;
            if evaluated.is_empty() {
                println!("No reminders.");
            }
            for (rule, trigger) in &evaluated {
                println!("{}  -> {}", describe_rule(rule), describe_trigger(trigger));
            }
        }
        ReminderCommands::Toggle { id } => {
            let rule = tracker.toggle_reminder(user, id)?;
            let state = if rule.enabled { "enabled" } else { "disabled" };
            println!("✓ Reminder {} {}", rule.id, state);
        }
        ReminderCommands::Edit {
            id,
            event,
            days,
            when,
            time,
            message,
        } => {
            let patch = ReminderPatch {
                event,
                days,
                when,
                time,
                message,
                enabled: None,
            };
            let rule = tracker.update_reminder(user, id, patch)?;
            println!("✓ Updated reminder {}", describe_rule(&rule));
        }
        ReminderCommands::Remove { id } => {
            tracker.remove_reminder(user, id)?;
            println!("✓ Removed reminder {}", id);
        }
        ReminderCommands::Due { date } => {
            let date = date.unwrap_or(today);
            let due = tracker.due_reminders(user, date)?;
            if due.is_empty() {
                println!("No reminders due on {}.", date);
            }
            for (rule, at) in &due {
                let text = rule
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} {}", rule.event, rule.offset));
                println!("{}  {}", at.format("%H:%M"), text);
            }
        }
    }
    Ok(())
}

fn cmd_summary(tracker: &Luna, user: &UserId) -> Result<()> {
    let logs = tracker.logs(user)?;
    let cycles = tracker.cycles(user)?;
    println!("{}", ChatContext::build(&logs, &cycles));
    Ok(())
}
