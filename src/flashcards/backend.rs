//! Persistence backends for the review state store
//!
//! A backend reads and writes the whole state snapshot as text. The store
//! decides what goes into the snapshot; backends only move bytes.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Storage collaborator that holds the serialized review state
pub trait StateBackend {
    /// Current snapshot, or `None` if nothing has been written yet
    fn read(&self) -> Result<Option<String>>;

    /// Replace the snapshot
    fn write(&self, contents: &str) -> Result<()>;

    /// Human-readable location, used in log messages
    fn describe(&self) -> String;
}

/// Stores the snapshot in a single JSON file
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateBackend for JsonFileBackend {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to a sibling file first so a crash never leaves a truncated snapshot
        let temp_path = self.temp_path();
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the snapshot in memory
#[derive(Default)]
pub struct MemoryBackend {
    contents: Mutex<Option<String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
            fail_writes: Mutex::new(false),
        }
    }

    /// Make subsequent writes fail, to exercise degraded persistence
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl StateBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>> {
        let contents = self
            .contents
            .lock()
            .map_err(|_| BackendError::Unavailable("memory backend poisoned".to_string()))?;
        Ok(contents.clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        let fail = self.fail_writes.lock().map(|f| *f).unwrap_or(true);
        if fail {
            return Err(BackendError::Unavailable("writes disabled".to_string()));
        }

        let mut slot = self
            .contents
            .lock()
            .map_err(|_| BackendError::Unavailable("memory backend poisoned".to_string()))?;
        *slot = Some(contents.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl<B: StateBackend + ?Sized> StateBackend for &B {
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> Result<()> {
        (**self).write(contents)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
