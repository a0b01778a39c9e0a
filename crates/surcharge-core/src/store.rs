//! Option Storage
//!
//! Flat string key/value settings, the way the admin settings screen
//! persists them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurchargeError};
use crate::gateway::{GatewayRegistry, PaymentGateway};

/// Settings storage trait
pub trait OptionStore: Send + Sync {
    /// Get an option value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set an option value
    fn set(&self, key: &str, value: String) -> Result<()>;

    /// Unset an option
    fn remove(&self, key: &str) -> Result<()>;

    /// All options, ordered by key
    fn snapshot(&self) -> Result<BTreeMap<String, String>>;
}

/// In-memory option store
#[derive(Default)]
pub struct MemoryOptionStore {
    options: RwLock<BTreeMap<String, String>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BTreeMap<String, String>) -> Self {
        Self {
            options: RwLock::new(options),
        }
    }
}

fn poisoned<E>(_: E) -> SurchargeError {
    SurchargeError::Store("option store lock poisoned".into())
}

impl OptionStore for MemoryOptionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let options = self.options.read().map_err(poisoned)?;
        Ok(options.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut options = self.options.write().map_err(poisoned)?;
        options.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut options = self.options.write().map_err(poisoned)?;
        options.remove(key);
        Ok(())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let options = self.options.read().map_err(poisoned)?;
        Ok(options.clone())
    }
}

/// JSON file used to seed a store: gateways plus raw options
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub gateways: Vec<PaymentGateway>,

    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl StoreFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn registry(&self) -> GatewayRegistry {
        self.gateways.iter().cloned().collect()
    }

    pub fn into_store(self) -> MemoryOptionStore {
        MemoryOptionStore::with_options(self.options)
    }
}
