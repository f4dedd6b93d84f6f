use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{debug, warn};

/// Last value written under a key and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProp {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Key-value store for notifier state
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredProp>>;
    fn set(&self, key: &str, value: &str, at: DateTime<Utc>) -> Result<()>;
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    props: Mutex<BTreeMap<String, StoredProp>>,
}

impl PropertyStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredProp>> {
        Ok(self.props.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, at: DateTime<Utc>) -> Result<()> {
        self.props.lock().map_err(poisoned)?.insert(
            key.to_string(),
            StoredProp {
                value: value.to_string(),
                updated_at: at,
            },
        );
        Ok(())
    }
}

/// Store persisted as a single JSON object, rewritten atomically on each set
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredProp>> {
        if !self.path.exists() {
            debug!("No notifier state at {:?}, starting empty", self.path);
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&contents) {
            Ok(props) => Ok(props),
            Err(e) => {
                let backup_path = self.path.with_extension("json.backup");
                warn!(
                    "Notifier state corrupted: {}. Backing up to {:?} and starting fresh",
                    e, backup_path
                );
                if let Err(backup_err) = fs::copy(&self.path, &backup_path) {
                    warn!("Failed to backup corrupted notifier state: {}", backup_err);
                }
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, props: &BTreeMap<String, StoredProp>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(props)?;
        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut temp_file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            temp_file.write_all(contents.as_bytes())?;
            temp_file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved notifier state to {:?}", self.path);
        Ok(())
    }
}

impl PropertyStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<StoredProp>> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        let mut props = self.read_all()?;
        props.insert(
            key.to_string(),
            StoredProp {
                value: value.to_string(),
                updated_at: at,
            },
        );
        self.write_all(&props)
    }
}
