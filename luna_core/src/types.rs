//! Core domain types for Luna.
//!
//! This module defines the fundamental types used throughout the system:
//! - User identity
//! - Daily observations (flow, symptoms, mood)
//! - Derived cycle records

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// User Identity
// ============================================================================

/// Identifier of the user owning a set of logs, cycles and reminders.
///
/// Restricted to ASCII alphanumerics, `-` and `_` because it names a
/// directory in the file store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub const MAX_LEN: usize = 64;

    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > Self::MAX_LEN {
            return Err(Error::invalid(
                "user",
                format!("must be 1 to {} characters", Self::MAX_LEN),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::invalid(
                "user",
                format!("'{}' may only contain letters, digits, '-' and '_'", id),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        UserId::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Daily Observations
// ============================================================================

/// Menstrual flow recorded for a day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    None,
    Light,
    Medium,
    Heavy,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::None => "none",
            Flow::Light => "light",
            Flow::Medium => "medium",
            Flow::Heavy => "heavy",
        }
    }
}

impl FromStr for Flow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Flow::None),
            "light" => Ok(Flow::Light),
            "medium" => Ok(Flow::Medium),
            "heavy" => Ok(Flow::Heavy),
            other => Err(Error::invalid(
                "flow",
                format!("unknown flow '{}' (expected none, light, medium or heavy)", other),
            )),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day of observations. At most one per (user, date).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyLog {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub flow: Option<Flow>,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DailyLog {
    /// Create an empty log for a date with a fresh id
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            flow: None,
            symptoms: BTreeSet::new(),
            mood: None,
            notes: None,
        }
    }

    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = Some(flow);
        self
    }

    /// A bleeding day: flow present and not `none`
    pub fn is_flow_positive(&self) -> bool {
        matches!(self.flow, Some(f) if f != Flow::None)
    }
}

/// Raw observations for one day, before they become a stored [`DailyLog`].
///
/// Logging an entry for a date that already has a log overwrites it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: Option<NaiveDate>,
    pub flow: Option<Flow>,
    pub symptoms: Vec<String>,
    pub mood: Option<String>,
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn flow(mut self, flow: Flow) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn symptom(mut self, symptom: impl Into<String>) -> Self {
        self.symptoms.push(symptom.into());
        self
    }

    pub fn mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the entry and turn it into a log carrying `id`
    pub fn into_log(self, id: Uuid) -> Result<DailyLog> {
        let date = self
            .date
            .ok_or_else(|| Error::invalid("date", "a date is required"))?;

        let symptoms = self
            .symptoms
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(DailyLog {
            id,
            date,
            flow: self.flow,
            symptoms,
            mood: non_blank(self.mood),
            notes: non_blank(self.notes),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Derived Cycles
// ============================================================================

/// One contiguous bleeding segment and the distance to the next one.
///
/// Always derived from logs, never edited by hand.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cycle {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period_length: u32,
    /// Days until the next segment starts; `None` for the most recent cycle
    pub cycle_length: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_user_id_validation() {
        assert!(UserId::new("default").is_ok());
        assert!(UserId::new("user_1-a").is_ok());
        assert!(UserId::new("").is_err());
        assert!(UserId::new("../etc").is_err());
        assert!(UserId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn test_flow_parsing() {
        assert_eq!("Heavy".parse::<Flow>().unwrap(), Flow::Heavy);
        assert_eq!(" none ".parse::<Flow>().unwrap(), Flow::None);

        let err = "spotting".parse::<Flow>().unwrap_err();
        assert_eq!(err.fields(), vec!["flow"]);
    }

    #[test]
    fn test_flow_positive() {
        let d = date("2024-03-01");
        assert!(!DailyLog::new(d).is_flow_positive());
        assert!(!DailyLog::new(d).with_flow(Flow::None).is_flow_positive());
        assert!(DailyLog::new(d).with_flow(Flow::Light).is_flow_positive());
    }

    #[test]
    fn test_entry_requires_date() {
        let err = LogEntry::default().into_log(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.fields(), vec!["date"]);
    }

    #[test]
    fn test_entry_normalizes_text() {
        let log = LogEntry::on(date("2024-03-01"))
            .symptom(" Cramps ")
            .symptom("Cramps")
            .symptom("")
            .mood("  ")
            .notes("first day")
            .into_log(Uuid::new_v4())
            .unwrap();

        assert_eq!(log.symptoms.len(), 1);
        assert!(log.symptoms.contains("Cramps"));
        assert_eq!(log.mood, None);
        assert_eq!(log.notes.as_deref(), Some("first day"));
    }

    #[test]
    fn test_log_json_uses_civil_dates() {
        let log = DailyLog::new(date("2024-03-01")).with_flow(Flow::Medium);
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("\"date\":\"2024-03-01\""));
        assert!(json.contains("\"flow\":\"medium\""));
    }
}
