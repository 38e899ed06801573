//! Persistence for logs, derived cycles and reminders.
//!
//! Two implementations share the repository traits:
//! - [`JsonStore`]: one directory per user holding `logs.json`,
//!   `cycles.json` and `reminders.json`, written atomically
//! - [`MemoryStore`]: in-process maps, for tests and embedding
//!
//! Repositories do not serialize writers themselves. Anything doing a
//! read-modify-write must hold the guard from [`Store::lock_user`] for the
//! whole sequence.

use crate::{Cycle, DailyLog, Error, ReminderRule, Result, UserId};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use uuid::Uuid;

pub trait LogRepository {
    /// All logs of a user, oldest first
    fn get_logs(&self, user: &UserId) -> Result<Vec<DailyLog>>;

    fn get_log_by_date(&self, user: &UserId, date: NaiveDate) -> Result<Option<DailyLog>> {
        Ok(self.get_logs(user)?.into_iter().find(|log| log.date == date))
    }

    /// Insert, or overwrite the log already stored for the same date.
    ///
    /// An overwrite keeps the stored id.
    fn upsert_log(&self, user: &UserId, log: DailyLog) -> Result<DailyLog>;

    /// Remove a log by id, returning whether it existed
    fn delete_log(&self, user: &UserId, id: Uuid) -> Result<bool>;
}

pub trait CycleRepository {
    /// Replace the whole derived cycle set of a user
    fn replace_all_cycles(&self, user: &UserId, cycles: &[Cycle]) -> Result<()>;

    /// Stored cycles, most recent first
    fn get_cycles(&self, user: &UserId) -> Result<Vec<Cycle>>;
}

pub trait ReminderRepository {
    /// Reminders in creation order
    fn get_reminders(&self, user: &UserId) -> Result<Vec<ReminderRule>>;

    fn get_reminder(&self, user: &UserId, id: Uuid) -> Result<Option<ReminderRule>> {
        Ok(self.get_reminders(user)?.into_iter().find(|r| r.id == id))
    }

    /// Insert a new rule or replace the one with the same id
    fn save_reminder(&self, user: &UserId, rule: ReminderRule) -> Result<ReminderRule>;

    fn delete_reminder(&self, user: &UserId, id: Uuid) -> Result<bool>;
}

/// A complete backing store with a per-user writer lock
pub trait Store: LogRepository + CycleRepository + ReminderRepository {
    type WriteGuard<'a>
    where
        Self: 'a;

    /// Block until no other writer holds this user's data
    fn lock_user<'a>(&'a self, user: &UserId) -> Result<Self::WriteGuard<'a>>;
}

fn upsert_by_date(logs: &mut Vec<DailyLog>, mut log: DailyLog) -> DailyLog {
    if let Some(existing) = logs.iter_mut().find(|l| l.date == log.date) {
        log.id = existing.id;
        *existing = log.clone();
    } else {
        logs.push(log.clone());
    }
    logs.sort_by_key(|l| l.date);
    log
}

fn save_by_id(rules: &mut Vec<ReminderRule>, rule: ReminderRule) -> ReminderRule {
    if let Some(existing) = rules.iter_mut().find(|r| r.id == rule.id) {
        *existing = rule.clone();
    } else {
        rules.push(rule.clone());
    }
    rule
}

// ============================================================================
// File Store
// ============================================================================

const LOGS_FILE: &str = "logs.json";
const CYCLES_FILE: &str = "cycles.json";
const REMINDERS_FILE: &str = "reminders.json";
const LOCK_FILE: &str = ".write.lock";

/// JSON files under `<root>/users/<user>/`
#[derive(Clone, Debug)]
pub struct JsonStore {
    root: PathBuf,
}

/// Exclusive lock on a user's `.write.lock`, released on drop
#[derive(Debug)]
pub struct UserLock {
    file: File,
}

impl Drop for UserLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release user write lock: {}", e);
        }
    }
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, user: &UserId) -> PathBuf {
        self.root.join("users").join(user.as_str())
    }

    fn path(&self, user: &UserId, file: &str) -> PathBuf {
        self.user_dir(user).join(file)
    }

    /// Read a JSON file under a shared lock; `None` when it does not exist
    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        match serde_json::from_str(&contents) {
            Ok(value) => {
                tracing::debug!("Loaded {:?}", path);
                Ok(Some(value))
            }
            Err(e) => Err(Error::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Atomically replace a JSON file:
    /// 1. Write to a temp file in the same directory
    /// 2. Sync to disk
    /// 3. Rename over the original
    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(value)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {:?}", path);
        Ok(())
    }
}

impl LogRepository for JsonStore {
    fn get_logs(&self, user: &UserId) -> Result<Vec<DailyLog>> {
        let mut logs: Vec<DailyLog> =
            Self::read_json(&self.path(user, LOGS_FILE))?.unwrap_or_default();
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    fn upsert_log(&self, user: &UserId, log: DailyLog) -> Result<DailyLog> {
        let path = self.path(user, LOGS_FILE);
        let mut logs = self.get_logs(user)?;
        let stored = upsert_by_date(&mut logs, log);
        Self::write_json(&path, &logs)?;
        Ok(stored)
    }

    fn delete_log(&self, user: &UserId, id: Uuid) -> Result<bool> {
        let path = self.path(user, LOGS_FILE);
        let mut logs = self.get_logs(user)?;
        let before = logs.len();
        logs.retain(|l| l.id != id);
        if logs.len() == before {
            return Ok(false);
        }
        Self::write_json(&path, &logs)?;
        Ok(true)
    }
}

impl CycleRepository for JsonStore {
    fn replace_all_cycles(&self, user: &UserId, cycles: &[Cycle]) -> Result<()> {
        Self::write_json(&self.path(user, CYCLES_FILE), cycles)
    }

    fn get_cycles(&self, user: &UserId) -> Result<Vec<Cycle>> {
        let path = self.path(user, CYCLES_FILE);
        let cycles: Vec<Cycle> = match Self::read_json(&path) {
            Ok(cycles) => cycles.unwrap_or_default(),
            // Derived data: the next recomputation rebuilds it
            Err(Error::Corrupt { reason, .. }) => {
                tracing::warn!(
                    "Failed to parse cycles file {:?}: {}. Treating as empty.",
                    path,
                    reason
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(crate::segmenter::most_recent_first(cycles))
    }
}

impl ReminderRepository for JsonStore {
    fn get_reminders(&self, user: &UserId) -> Result<Vec<ReminderRule>> {
        Ok(Self::read_json(&self.path(user, REMINDERS_FILE))?.unwrap_or_default())
    }

    fn save_reminder(&self, user: &UserId, rule: ReminderRule) -> Result<ReminderRule> {
        let mut rules = self.get_reminders(user)?;
        let saved = save_by_id(&mut rules, rule);
        Self::write_json(&self.path(user, REMINDERS_FILE), &rules)?;
        Ok(saved)
    }

    fn delete_reminder(&self, user: &UserId, id: Uuid) -> Result<bool> {
        let mut rules = self.get_reminders(user)?;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Ok(false);
        }
        Self::write_json(&self.path(user, REMINDERS_FILE), &rules)?;
        Ok(true)
    }
}

impl Store for JsonStore {
    type WriteGuard<'a> = UserLock;

    fn lock_user<'a>(&'a self, user: &UserId) -> Result<UserLock> {
        let dir = self.user_dir(user);
        std::fs::create_dir_all(&dir)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;

        tracing::debug!("Acquired write lock for user {}", user);
        Ok(UserLock { file })
    }
}

// ============================================================================
// Memory Store
// ============================================================================

#[derive(Default)]
struct UserData {
    logs: Vec<DailyLog>,
    cycles: Vec<Cycle>,
    reminders: Vec<ReminderRule>,
}

/// In-process store with a single writer at a time
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, UserData>>,
    writer: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_user<T>(&self, user: &UserId, f: impl FnOnce(&mut UserData) -> T) -> Result<T> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| Error::Other("memory store poisoned".into()))?;
        Ok(f(users.entry(user.clone()).or_default()))
    }
}

impl LogRepository for MemoryStore {
    fn get_logs(&self, user: &UserId) -> Result<Vec<DailyLog>> {
        self.with_user(user, |data| data.logs.clone())
    }

    fn upsert_log(&self, user: &UserId, log: DailyLog) -> Result<DailyLog> {
        self.with_user(user, |data| upsert_by_date(&mut data.logs, log))
    }

    fn delete_log(&self, user: &UserId, id: Uuid) -> Result<bool> {
        self.with_user(user, |data| {
            let before = data.logs.len();
            data.logs.retain(|l| l.id != id);
            data.logs.len() != before
        })
    }
}

impl CycleRepository for MemoryStore {
    fn replace_all_cycles(&self, user: &UserId, cycles: &[Cycle]) -> Result<()> {
        self.with_user(user, |data| data.cycles = cycles.to_vec())
    }

    fn get_cycles(&self, user: &UserId) -> Result<Vec<Cycle>> {
        let cycles = self.with_user(user, |data| data.cycles.clone())?;
        Ok(crate::segmenter::most_recent_first(cycles))
    }
}

impl ReminderRepository for MemoryStore {
    fn get_reminders(&self, user: &UserId) -> Result<Vec<ReminderRule>> {
        self.with_user(user, |data| data.reminders.clone())
    }

    fn save_reminder(&self, user: &UserId, rule: ReminderRule) -> Result<ReminderRule> {
        self.with_user(user, |data| save_by_id(&mut data.reminders, rule))
    }

    fn delete_reminder(&self, user: &UserId, id: Uuid) -> Result<bool> {
        self.with_user(user, |data| {
            let before = data.reminders.len();
            data.reminders.retain(|r| r.id != id);
            data.reminders.len() != before
        })
    }
}

impl Store for MemoryStore {
    type WriteGuard<'a> = MutexGuard<'a, ()>;

    fn lock_user<'a>(&'a self, _user: &UserId) -> Result<MutexGuard<'a, ()>> {
        self.writer
            .lock()
            .map_err(|_| Error::Other("memory store writer poisoned".into()))
    }
}
