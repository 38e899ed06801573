//! Reminder rules and their evaluation against projections.
//!
//! A rule names a cycle event, a day offset and a time of day. Rules hold no
//! derived state; the trigger instant is computed on demand from the current
//! [`Projection`].

use crate::{Error, FieldError, Projection, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest accepted offset between a reminder and its event
pub const MAX_OFFSET_DAYS: u32 = 366;
use std::str::FromStr;
use uuid::Uuid;

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").expect("time pattern is a valid regex")
});

/// Event a reminder is attached to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReminderEvent {
    Period,
    Fertile,
    Ovulation,
    Medication,
    Custom,
}

impl ReminderEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderEvent::Period => "period",
            ReminderEvent::Fertile => "fertile",
            ReminderEvent::Ovulation => "ovulation",
            ReminderEvent::Medication => "medication",
            ReminderEvent::Custom => "custom",
        }
    }

    /// Projected date of the event, if it follows the cycle at all
    fn projected_date(&self, projection: &Projection) -> Option<NaiveDate> {
        match self {
            ReminderEvent::Period => Some(projection.next_period_start),
            ReminderEvent::Fertile => Some(projection.fertile_start),
            ReminderEvent::Ovulation => Some(projection.ovulation_day),
            ReminderEvent::Medication | ReminderEvent::Custom => None,
        }
    }

    fn is_cycle_bound(&self) -> bool {
        !matches!(self, ReminderEvent::Medication | ReminderEvent::Custom)
    }
}

impl FromStr for ReminderEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "period" => Ok(ReminderEvent::Period),
            "fertile" => Ok(ReminderEvent::Fertile),
            "ovulation" => Ok(ReminderEvent::Ovulation),
            "medication" => Ok(ReminderEvent::Medication),
            "custom" => Ok(ReminderEvent::Custom),
            other => Err(Error::invalid(
                "event",
                format!("unknown event type '{}'", other),
            )),
        }
    }
}

impl fmt::Display for ReminderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the event the reminder fires on
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Before,
    After,
    On,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "before" => Ok(Direction::Before),
            "after" => Ok(Direction::After),
            "on" => Ok(Direction::On),
            other => Err(Error::invalid(
                "when",
                format!("unknown direction '{}' (expected before, after or on)", other),
            )),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Before => "before",
            Direction::After => "after",
            Direction::On => "on",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderOffset {
    pub days: u32,
    pub when: Direction,
}

impl ReminderOffset {
    /// Signed shift applied to the event date; `on` ignores `days`
    pub fn signed_days(&self) -> i64 {
        match self.when {
            Direction::Before => -i64::from(self.days),
            Direction::After => i64::from(self.days),
            Direction::On => 0,
        }
    }
}

impl fmt::Display for ReminderOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.when == Direction::On || self.days == 0 {
            return f.write_str("On the day");
        }
        let unit = if self.days == 1 { "day" } else { "days" };
        write!(f, "{} {} {}", self.days, unit, self.when)
    }
}

/// Wall-clock time in `HH:MM` 24-hour form
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(String);

impl TimeOfDay {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if !TIME_PATTERN.is_match(s) {
            return Err(Error::invalid(
                "time",
                format!("'{}' is not a 24-hour HH:MM time", s),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // The pattern guarantees both halves are in range
        let (h, m) = self.0.split_once(':').unwrap_or(("0", "0"));
        let hour = h.parse().unwrap_or(0);
        let minute = m.parse().unwrap_or(0);
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TimeOfDay::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated reminder rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReminderRule {
    pub id: Uuid,
    pub event: ReminderEvent,
    pub offset: ReminderOffset,
    pub time: TimeOfDay,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// When a rule fires relative to the current projection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    At(NaiveDateTime),
    /// The rule follows a cycle event but there is no projection yet
    Unresolvable,
    /// Medication and custom reminders run on their own schedule
    NotCycleBound,
    /// The offset moves the trigger past the last representable date
    OutOfRange,
}

impl ReminderRule {
    /// Absolute trigger instant for this rule.
    ///
    /// A missing projection propagates as [`Trigger::Unresolvable`]; no date
    /// is guessed from defaults.
    pub fn evaluate(&self, projection: Option<&Projection>) -> Trigger {
        if !self.event.is_cycle_bound() {
            return Trigger::NotCycleBound;
        }
        let Some(event_date) = projection.and_then(|p| self.event.projected_date(p)) else {
            return Trigger::Unresolvable;
        };

        match event_date.checked_add_signed(Duration::days(self.offset.signed_days())) {
            Some(date) => Trigger::At(date.and_time(self.time.as_naive_time())),
            None => Trigger::OutOfRange,
        }
    }

    /// Replace fields from `patch`, re-validating the result
    pub fn apply(&self, patch: ReminderPatch) -> Result<ReminderRule> {
        let draft = ReminderDraft {
            event: patch.event.unwrap_or_else(|| self.event.to_string()),
            days: patch.days.unwrap_or(i64::from(self.offset.days)),
            when: patch.when.unwrap_or_else(|| self.offset.when.to_string()),
            time: patch.time.unwrap_or_else(|| self.time.to_string()),
            message: match patch.message {
                Some(message) if message.trim().is_empty() => None,
                Some(message) => Some(message),
                None => self.message.clone(),
            },
            enabled: Some(patch.enabled.unwrap_or(self.enabled)),
        };
        draft.validate(self.id)
    }
}

/// Unvalidated reminder input as it arrives from a form or the CLI
#[derive(Clone, Debug, Deserialize)]
pub struct ReminderDraft {
    pub event: String,
    pub days: i64,
    pub when: String,
    pub time: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl ReminderDraft {
    /// Validate every field, reporting all offending fields at once
    pub fn validate(self, id: Uuid) -> Result<ReminderRule> {
        let mut errors: Vec<FieldError> = Vec::new();

        let event = collect(self.event.parse::<ReminderEvent>(), &mut errors);
        let when = collect(self.when.parse::<Direction>(), &mut errors);
        let time = collect(TimeOfDay::parse(&self.time), &mut errors);
        let days = match u32::try_from(self.days) {
            Ok(days) if days <= MAX_OFFSET_DAYS => Some(days),
            Ok(_) => {
                errors.push(FieldError::new(
                    "days",
                    format!("{} is more than {} days", self.days, MAX_OFFSET_DAYS),
                ));
                None
            }
            Err(_) => {
                errors.push(FieldError::new(
                    "days",
                    format!("{} is not a non-negative day count", self.days),
                ));
                None
            }
        };

        match (event, when, time, days) {
            (Some(event), Some(when), Some(time), Some(days)) if errors.is_empty() => {
                Ok(ReminderRule {
                    id,
                    event,
                    offset: ReminderOffset { days, when },
                    time,
                    message: self
                        .message
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty()),
                    enabled: self.enabled.unwrap_or(true),
                })
            }
            _ => Err(Error::Validation(errors)),
        }
    }
}

fn collect<T>(result: Result<T>, errors: &mut Vec<FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(Error::Validation(mut fields)) => {
            errors.append(&mut fields);
            None
        }
        Err(other) => {
            errors.push(FieldError::new("input", other.to_string()));
            None
        }
    }
}

/// Partial update of a rule; `None` keeps the current value
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReminderPatch {
    pub event: Option<String>,
    pub days: Option<i64>,
    pub when: Option<String>,
    pub time: Option<String>,
    /// A blank message removes the current one
    pub message: Option<String>,
    pub enabled: Option<bool>,
}

/// Enabled rules whose trigger falls on `date`, with their trigger instant
pub fn due_on<'a>(
    rules: &'a [ReminderRule],
    projection: Option<&Projection>,
    date: NaiveDate,
) -> Vec<(&'a ReminderRule, NaiveDateTime)> {
    let mut due: Vec<_> = rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter_map(|rule| match rule.evaluate(projection) {
            Trigger::At(at) if at.date() == date => Some((rule, at)),
            _ => None,
        })
        .collect();
    due.sort_by_key(|(_, at)| *at);
    due
}
