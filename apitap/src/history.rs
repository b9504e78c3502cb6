use crate::{
    error::{Error, Result},
    load_generator::LoadTestResult,
    util,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use uuid::Uuid;

pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLoadTest {
    pub id: String,
    pub url: String,
    pub method: String,
    pub result: LoadTestResult,
    pub saved_at: u64,
}

impl SavedLoadTest {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        url: S1,
        method: S2,
        result: LoadTestResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            method: method.into(),
            result,
            saved_at: util::unix_millis(),
        }
    }
}

/// Storage for finished load tests, newest first, capped at [`MAX_HISTORY`] entries.
///
/// Failures are returned to the caller as is; nothing is retried.
pub trait HistoryStore: Debug + Send + Sync {
    fn save(&self, entry: SavedLoadTest) -> Result<()>;
    fn list(&self) -> Result<Vec<SavedLoadTest>>;
    /// Returns whether an entry with `id` existed.
    fn delete(&self, id: &str) -> Result<bool>;
    fn clear(&self) -> Result<()>;
}

fn prepend_capped(history: &mut Vec<SavedLoadTest>, entry: SavedLoadTest) {
    history.insert(0, entry);
    history.truncate(MAX_HISTORY);
}

fn remove_entry(history: &mut Vec<SavedLoadTest>, id: &str) -> bool {
    let before = history.len();
    history.retain(|entry| entry.id != id);
    history.len() != before
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<SavedLoadTest>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn save(&self, entry: SavedLoadTest) -> Result<()> {
        prepend_capped(&mut *self.entries.lock()?, entry);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SavedLoadTest>> {
        Ok(self.entries.lock()?.clone())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(remove_entry(&mut *self.entries.lock()?, id))
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock()?.clear();
        Ok(())
    }
}

/// History kept as one JSON array in a file. A missing file is an empty history.
#[derive(Debug)]
pub struct JsonFileHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<SavedLoadTest>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.failure("read", e)),
        };

        serde_json::from_str(&contents).map_err(|e| self.failure("parse", e))
    }

    fn write(&self, history: &[SavedLoadTest]) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(history).map_err(|e| self.failure("serialize", e))?;
        fs::write(&self.path, contents).map_err(|e| self.failure("write", e))
    }

    fn failure<E: std::fmt::Display>(&self, action: &str, e: E) -> Error {
        Error::History(format!(
            "couldn't {} {}: {}",
            action,
            self.path.display(),
            e
        ))
    }
}

impl HistoryStore for JsonFileHistory {
    fn save(&self, entry: SavedLoadTest) -> Result<()> {
        let _guard = self.lock.lock()?;
        let mut history = self.read()?;
        prepend_capped(&mut history, entry);
        self.write(&history)
    }

    fn list(&self) -> Result<Vec<SavedLoadTest>> {
        let _guard = self.lock.lock()?;
        self.read()
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock()?;
        let mut history = self.read()?;
        let removed = remove_entry(&mut history, id);
        if removed {
            self.write(&history)?;
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.failure("remove", e)),
        }
    }
}
