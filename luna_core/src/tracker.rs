//! Tracker service tying logs, cycles, predictions and reminders together.
//!
//! Every write holds the user's write lock across the whole sequence:
//! 1. Validate input (before anything is touched)
//! 2. Apply the log change
//! 3. Re-segment all logs and replace the stored cycle set
//!
//! Reads take no writer lock. Cycles, statistics and projections are
//! derived from the current logs on every call.

use crate::calendar::{Calendar, DayKind};
use crate::reminder::{self, ReminderDraft, ReminderPatch, ReminderRule, Trigger};
use crate::store::{CycleRepository, LogRepository, ReminderRepository, Store};
use crate::{segmenter, Cycle, CycleStats, DailyLog, Error, LogEntry, Projection, Result, UserId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

/// Where the user stands in the current cycle
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CycleStatus {
    pub today: NaiveDate,
    /// 1 on the start date of the most recent cycle
    pub cycle_day: Option<i64>,
    pub days_until_next_period: i64,
    pub today_kind: DayKind,
    pub projection: Projection,
    pub stats: CycleStats,
}

pub struct Tracker<S> {
    store: S,
}

impl<S: Store> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Record a day, overwriting any log already on that date
    pub fn log_day(&self, user: &UserId, entry: LogEntry) -> Result<DailyLog> {
        let log = entry.into_log(Uuid::new_v4())?;

        let _guard = self.store.lock_user(user)?;
        let stored = self.store.upsert_log(user, log)?;
        let cycles = self.recompute_locked(user)?;

        tracing::info!(
            "Logged {} for {} (flow: {}), {} cycles",
            stored.date,
            user,
            stored.flow.map(|f| f.as_str()).unwrap_or("-"),
            cycles.len()
        );
        Ok(stored)
    }

    /// Record several days under one lock and one recomputation.
    ///
    /// Entries are all validated before the first write.
    pub fn import_logs(&self, user: &UserId, entries: Vec<LogEntry>) -> Result<usize> {
        let logs = entries
            .into_iter()
            .map(|e| e.into_log(Uuid::new_v4()))
            .collect::<Result<Vec<_>>>()?;

        let _guard = self.store.lock_user(user)?;
        for log in &logs {
            self.store.upsert_log(user, log.clone())?;
        }
        self.recompute_locked(user)?;

        tracing::info!("Imported {} logs for {}", logs.len(), user);
        Ok(logs.len())
    }

    pub fn delete_log(&self, user: &UserId, id: Uuid) -> Result<()> {
        let _guard = self.store.lock_user(user)?;
        if !self.store.delete_log(user, id)? {
            return Err(Error::not_found("log", id));
        }
        self.recompute_locked(user)?;
        tracing::info!("Deleted log {} for {}", id, user);
        Ok(())
    }

    /// Delete whatever is logged on `date`
    pub fn delete_log_on(&self, user: &UserId, date: NaiveDate) -> Result<DailyLog> {
        let _guard = self.store.lock_user(user)?;
        let log = self
            .store
            .get_log_by_date(user, date)?
            .ok_or_else(|| Error::not_found("log", date))?;
        self.store.delete_log(user, log.id)?;
        self.recompute_locked(user)?;
        tracing::info!("Deleted log on {} for {}", date, user);
        Ok(log)
    }

    pub fn logs(&self, user: &UserId) -> Result<Vec<DailyLog>> {
        self.store.get_logs(user)
    }

    // ------------------------------------------------------------------
    // Cycles and predictions
    // ------------------------------------------------------------------

    /// Rebuild and store the derived cycle set
    pub fn recompute(&self, user: &UserId) -> Result<Vec<Cycle>> {
        let _guard = self.store.lock_user(user)?;
        self.recompute_locked(user)
    }

    /// Caller must hold the user's write lock
    fn recompute_locked(&self, user: &UserId) -> Result<Vec<Cycle>> {
        let logs = self.store.get_logs(user)?;
        let cycles = segmenter::segment(&logs);
        self.store.replace_all_cycles(user, &cycles)?;
        tracing::debug!("Replaced cycle set for {} ({} cycles)", user, cycles.len());
        Ok(cycles)
    }

    /// Cycles derived from the current logs, most recent first
    pub fn cycles(&self, user: &UserId) -> Result<Vec<Cycle>> {
        let logs = self.store.get_logs(user)?;
        Ok(segmenter::most_recent_first(segmenter::segment(&logs)))
    }

    pub fn stats(&self, user: &UserId) -> Result<CycleStats> {
        Ok(CycleStats::from_cycles(&self.cycles(user)?))
    }

    /// `None` until at least one period has been logged
    pub fn projection(&self, user: &UserId) -> Result<Option<Projection>> {
        let cycles = self.cycles(user)?;
        let stats = CycleStats::from_cycles(&cycles);
        Ok(Projection::from_cycles(&cycles, &stats))
    }

    pub fn status(&self, user: &UserId, today: NaiveDate) -> Result<Option<CycleStatus>> {
        let logs = self.store.get_logs(user)?;
        let cycles = segmenter::segment(&logs);
        let stats = CycleStats::from_cycles(&cycles);
        let Some(projection) = Projection::from_cycles(&cycles, &stats) else {
            return Ok(None);
        };

        let today_kind = Calendar::new(&logs, Some(&projection)).classify(today);
        Ok(Some(CycleStatus {
            today,
            cycle_day: projection.cycle_day(today),
            days_until_next_period: projection.days_until_next_period(today),
            today_kind,
            projection,
            stats,
        }))
    }

    pub fn classify(&self, user: &UserId, date: NaiveDate) -> Result<DayKind> {
        let logs = self.store.get_logs(user)?;
        let projection = self.projection(user)?;
        Ok(Calendar::new(&logs, projection.as_ref()).classify(date))
    }

    pub fn month(
        &self,
        user: &UserId,
        year: i32,
        month: u32,
    ) -> Result<Vec<(NaiveDate, DayKind)>> {
        let logs = self.store.get_logs(user)?;
        let projection = self.projection(user)?;
        Calendar::new(&logs, projection.as_ref()).month(year, month)
    }

    // ------------------------------------------------------------------
    // Reminders
    // ------------------------------------------------------------------

    pub fn reminders(&self, user: &UserId) -> Result<Vec<ReminderRule>> {
        self.store.get_reminders(user)
    }

    pub fn add_reminder(&self, user: &UserId, draft: ReminderDraft) -> Result<ReminderRule> {
        let rule = draft.validate(Uuid::new_v4())?;
        let _guard = self.store.lock_user(user)?;
        let saved = self.store.save_reminder(user, rule)?;
        tracing::info!("Added {} reminder {} for {}", saved.event, saved.id, user);
        Ok(saved)
    }

    pub fn update_reminder(
        &self,
        user: &UserId,
        id: Uuid,
        patch: ReminderPatch,
    ) -> Result<ReminderRule> {
        let _guard = self.store.lock_user(user)?;
        let current = self
            .store
            .get_reminder(user, id)?
            .ok_or_else(|| Error::not_found("reminder", id))?;
        let updated = current.apply(patch)?;
        self.store.save_reminder(user, updated)
    }

    /// Flip `enabled`, returning the updated rule
    pub fn toggle_reminder(&self, user: &UserId, id: Uuid) -> Result<ReminderRule> {
        let _guard = self.store.lock_user(user)?;
        let mut rule = self
            .store
            .get_reminder(user, id)?
            .ok_or_else(|| Error::not_found("reminder", id))?;
        rule.enabled = !rule.enabled;
        tracing::info!("Reminder {} enabled: {}", id, rule.enabled);
        self.store.save_reminder(user, rule)
    }

    pub fn remove_reminder(&self, user: &UserId, id: Uuid) -> Result<()> {
        let _guard = self.store.lock_user(user)?;
        if !self.store.delete_reminder(user, id)? {
            return Err(Error::not_found("reminder", id));
        }
        Ok(())
    }

    /// Every rule with its trigger against the current projection
    pub fn evaluate_reminders(&self, user: &UserId) -> Result<Vec<(ReminderRule, Trigger)>> {
        let projection = self.projection(user)?;
        Ok(self
            .store
            .get_reminders(user)?
            .into_iter()
            .map(|rule| {
                let trigger = rule.evaluate(projection.as_ref());
                (rule, trigger)
            })
            .collect())
    }

    pub fn due_reminders(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<(ReminderRule, NaiveDateTime)>> {
        let projection = self.projection(user)?;
        let rules = self.store.get_reminders(user)?;
        Ok(reminder::due_on(&rules, projection.as_ref(), date)
            .into_iter()
            .map(|(rule, at)| (rule.clone(), at))
            .collect())
    }
}
