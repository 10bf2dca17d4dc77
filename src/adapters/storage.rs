use crate::domain::model::StoredRoster;
use crate::domain::ports::RosterStore;
use crate::utils::error::{Result, RosterError};
use async_trait::async_trait;
use fs2::FileExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};

/// Roster persisted as one pretty-printed JSON document.
///
/// Only one process may use a data file at a time: `acquire` takes an
/// exclusive lock on `<file>.lock` that is held until the last clone of
/// the store is dropped.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Arc<OnceCell<std::fs::File>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty roster file if none exists yet.
    pub async fn init(&self) -> Result<()> {
        self.acquire().await?;
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| RosterError::persistence("init", self.describe(e)))?;
        if !exists {
            tracing::info!(path = %self.path.display(), "Creating empty RSVP data file");
            self.save_all(&StoredRoster::default()).await?;
        }
        Ok(())
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("rsvps.json"));
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling_path(".lock")
    }

    fn lock_exclusive(&self) -> Result<std::fs::File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| RosterError::persistence("lock", self.describe(e)))?;
        }
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| RosterError::persistence("lock", self.describe(e)))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %self.lock_path().display(), "Data file locked");
                Ok(file)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(RosterError::StoreLocked {
                    path: self.path.display().to_string(),
                })
            }
            Err(e) => Err(RosterError::persistence("lock", self.describe(e))),
        }
    }

    fn describe(&self, err: impl std::fmt::Display) -> String {
        format!("{}: {}", self.path.display(), err)
    }

    async fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[async_trait]
impl RosterStore for JsonFileStore {
    async fn acquire(&self) -> Result<()> {
        self.lock
            .get_or_try_init(|| async { self.lock_exclusive() })
            .await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<StoredRoster> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredRoster::default());
            }
            Err(e) => return Err(RosterError::persistence("load_all", self.describe(e))),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoredRoster::default());
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| RosterError::persistence("load_all", self.describe(e)))
    }

    async fn save_all(&self, roster: &StoredRoster) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(roster)?;
        self.write_atomically(&bytes)
            .await
            .map_err(|e| RosterError::persistence("save_all", self.describe(e)))?;
        tracing::debug!(
            path = %self.path.display(),
            confirmed = roster.confirmed.len(),
            waitlisted = roster.waitlisted.len(),
            "Roster saved"
        );
        Ok(())
    }
}

/// In-process store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    roster: Arc<Mutex<StoredRoster>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(roster: StoredRoster) -> Self {
        Self {
            roster: Arc::new(Mutex::new(roster)),
            fail_writes: Arc::default(),
        }
    }

    /// Makes every following `save_all` fail until switched back off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> StoredRoster {
        self.roster.lock().await.clone()
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn load_all(&self) -> Result<StoredRoster> {
        Ok(self.roster.lock().await.clone())
    }

    async fn save_all(&self, roster: &StoredRoster) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RosterError::persistence("save_all", "memory store rejected write"));
        }
        *self.roster.lock().await = roster.clone();
        Ok(())
    }
}
