#![deny(warnings)]

//! Persistence layer: a narrow key-value interface and its stores.
//!
//! The runtime depends on [`KvStore`] only, so tests inject a
//! [`MemoryStore`] and the CLI uses a [`JsonFileStore`] on disk.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serde(e.to_string())
    }
}

/// Key holding the layout version of stored state.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";
/// Bumped when the stored app-state layout changes.
pub const SCHEMA_VERSION: &str = "1";

/// String key-value storage.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn put(&mut self, key: &str, value: String) -> Result<(), PersistenceError>;
    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError>;
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;
}

/// Serialize `value` as JSON under `key`.
pub fn put_json<S: KvStore + ?Sized, T: Serialize>(
    store: &mut S,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    store.put(key, serde_json::to_string(value)?)
}

/// Read and deserialize the JSON stored under `key`.
pub fn get_json<S: KvStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match store.get(key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// In-memory store, used as the test double.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// All entries kept in one JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };
        info!(path = %path.display(), entries = entries.len(), "opened json store");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "flushed json store");
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Returns the default store location used for local saves.
pub fn default_store_path() -> &'static str {
    "./saves/stratfit.json"
}

/// Whole cents of a decimal USD amount, rounded half away from zero.
pub fn decimal_to_cents_i64(amount: Decimal) -> Option<i64> {
    (amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) * Decimal::ONE_HUNDRED)
        .to_i64()
}

/// Whole cents of a floating USD amount; `None` for non-finite input.
pub fn usd_to_cents(amount: f64) -> Option<i64> {
    decimal_to_cents_i64(Decimal::from_f64(amount)?)
}

/// USD amount of a cent count.
pub fn cents_to_usd(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
