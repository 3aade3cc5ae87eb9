//! Storage backend trait and implementations

use crate::config::StoreConfig;
use crate::error::PersistenceError;
use crate::types::CompanyRecord;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Result<T> = std::result::Result<T, PersistenceError>;

/// Where the company collection lives between runs
///
/// `save` always receives the full collection; backends replace whatever they
/// held before.
pub trait RecordStorage: Send {
    /// Read the whole collection (an absent store reads as empty)
    fn load(&self) -> Result<Vec<CompanyRecord>>;

    /// Replace the stored collection
    fn save(&self, records: &[CompanyRecord]) -> Result<()>;

    /// Human readable location, for logs
    fn describe(&self) -> String;
}

/// JSON file backend
///
/// The file is a JSON array of flat record objects. Writes land in a sibling
/// temporary file which is then renamed over the target.
pub struct JsonFileStorage {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileStorage {
    /// Create a backend for `path` with indented output
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    /// Create a backend from store configuration
    pub fn from_config(config: &StoreConfig) -> std::result::Result<Self, PersistenceError> {
        config.validate().map_err(PersistenceError::unavailable)?;
        Ok(Self {
            path: config.data_file.clone(),
            pretty: config.pretty,
        })
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, path: &Path, records: &[CompanyRecord]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, records)?;
        } else {
            serde_json::to_writer(&mut writer, records)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

impl RecordStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<CompanyRecord>> {
        if !self.path.exists() {
            tracing::info!("No data file at {:?}, starting with an empty store", self.path);
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            PersistenceError::corruption(format!("{}: {}", self.path.display(), e))
        })
    }

    fn save(&self, records: &[CompanyRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let written = self.write_file(&temp_path, records).and_then(|()| {
            std::fs::rename(&temp_path, &self.path)?;
            Ok(())
        });
        if let Err(e) = written {
            // the target is untouched; drop the partial write
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        tracing::debug!("Wrote {} companies to {:?}", records.len(), self.path);
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory backend (for testing and dry runs)
///
/// Clones share the same contents, so a test can keep a handle while the
/// store owns another.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    records: Arc<Mutex<Vec<CompanyRecord>>>,
    saves: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStorage {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds `records`
    pub fn with_records(records: Vec<CompanyRecord>) -> Self {
        let storage = Self::new();
        if let Ok(mut stored) = storage.records.lock() {
            *stored = records;
        }
        storage
    }

    /// Make every following `save` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of what is currently stored
    pub fn stored(&self) -> Vec<CompanyRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl RecordStorage for InMemoryStorage {
    fn load(&self) -> Result<Vec<CompanyRecord>> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|_| PersistenceError::unavailable("in-memory storage lock poisoned"))
    }

    fn save(&self, records: &[CompanyRecord]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::unavailable("in-memory storage is read-only"));
        }

        let mut stored = self
            .records
            .lock()
            .map_err(|_| PersistenceError::unavailable("in-memory storage lock poisoned"))?;
        *stored = records.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
