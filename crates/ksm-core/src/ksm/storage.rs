//! Key/value storage for the client configuration.
//!
//! [`FileKeyValueStorage`] persists a JSON object on disk (pretty printed,
//! sorted keys, owner-only permissions); [`InMemoryKeyValueStorage`] keeps
//! the same contract without touching the filesystem.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::ksm::config::ModeConfig;
use crate::ksm::encoding::{dict_to_json, json_to_dict};
use crate::ksm::permissions::{platform_enforcer, FilePermissionEnforcer};
use crate::ksm::types::*;

pub const DEFAULT_CONFIG_FILE: &str = "client-config.json";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Interface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Storage for configuration values keyed by [`ConfigKey`].
pub trait KeyValueStorage {
    /// Load the whole map.
    fn read_storage(&self) -> Result<ConfigMap, KsmError>;

    /// Replace the whole map.
    fn save_storage(&mut self, config: &ConfigMap) -> Result<(), KsmError>;

    /// String value for `key`. Non-string JSON values are returned in their
    /// JSON text form.
    fn get(&self, key: ConfigKey) -> Result<Option<String>, KsmError> {
        let config = self.read_storage()?;
        Ok(config.get(key.as_str()).map(value_to_string))
    }

    fn set(&mut self, key: ConfigKey, value: &str) -> Result<ConfigMap, KsmError> {
        let mut config = self.read_storage()?;
        config.insert(key.as_str().to_string(), Value::String(value.to_string()));
        self.save_storage(&config)?;
        Ok(config)
    }

    fn delete(&mut self, key: ConfigKey) -> Result<ConfigMap, KsmError> {
        let mut config = self.read_storage()?;
        if config.remove(key.as_str()).is_some() {
            log::debug!("Removed key {}", key);
        } else {
            log::warn!("No key {} was found in config", key);
        }
        self.save_storage(&config)?;
        Ok(config)
    }

    fn delete_all(&mut self) -> Result<ConfigMap, KsmError> {
        let config = ConfigMap::new();
        self.save_storage(&config)?;
        Ok(config)
    }

    fn contains(&self, key: ConfigKey) -> Result<bool, KsmError> {
        Ok(self.read_storage()?.contains_key(key.as_str()))
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  File backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON file backed storage.
pub struct FileKeyValueStorage {
    path: PathBuf,
    enforcer: Box<dyn FilePermissionEnforcer>,
}

impl Default for FileKeyValueStorage {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

impl FileKeyValueStorage {
    /// Storage at `path`, with permission handling configured from the
    /// environment.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_enforcer(path, platform_enforcer(&ModeConfig::from_env()))
    }

    pub fn with_enforcer(path: impl Into<PathBuf>, enforcer: Box<dyn FilePermissionEnforcer>) -> Self {
        Self {
            path: path.into(),
            enforcer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty file (owner-only) if none exists yet.
    fn create_config_file_if_missing(&self) -> Result<(), KsmError> {
        if self.path.exists() {
            return Ok(());
        }
        std::fs::File::create(&self.path).map_err(|e| storage_error(&self.path, "create", e))?;
        self.enforcer.set_mode(&self.path)?;
        log::debug!("Created config file {}", self.path.display());
        Ok(())
    }
}

fn storage_error(path: &Path, action: &str, e: std::io::Error) -> KsmError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        return KsmError::from(e).with_detail(path.display().to_string());
    }
    KsmError::new(
        KsmErrorKind::StorageError,
        format!("Cannot {} config file {}: {}", action, path.display(), e),
    )
}

impl KeyValueStorage for FileKeyValueStorage {
    fn read_storage(&self) -> Result<ConfigMap, KsmError> {
        self.create_config_file_if_missing()?;
        self.enforcer.check_mode(&self.path)?;

        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| storage_error(&self.path, "read", e))?;
        if text.trim().is_empty() {
            log::debug!("Looks like config file is empty.");
            let config = ConfigMap::new();
            write_config(&self.path, &config)?;
            return Ok(config);
        }
        match json_to_dict(&text) {
            Some(config) => Ok(config),
            None => {
                log::debug!("Config file {} is not a JSON object, resetting it", self.path.display());
                let config = ConfigMap::new();
                write_config(&self.path, &config)?;
                Ok(config)
            }
        }
    }

    fn save_storage(&mut self, config: &ConfigMap) -> Result<(), KsmError> {
        self.create_config_file_if_missing()?;
        write_config(&self.path, config)
    }
}

fn write_config(path: &Path, config: &ConfigMap) -> Result<(), KsmError> {
    let json = dict_to_json(config)?;
    std::fs::write(path, json).map_err(|e| storage_error(path, "write", e))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  In-memory backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStorage {
    config: ConfigMap,
}

impl InMemoryKeyValueStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a JSON object, e.g. a config passed through an environment
    /// variable.
    pub fn from_json(json: &str) -> Result<Self, KsmError> {
        let config = json_to_dict(json).ok_or_else(|| {
            KsmError::new(KsmErrorKind::ParseError, "Config is not a JSON object")
        })?;
        Ok(Self { config })
    }
}

impl KeyValueStorage for InMemoryKeyValueStorage {
    fn read_storage(&self) -> Result<ConfigMap, KsmError> {
        Ok(self.config.clone())
    }

    fn save_storage(&mut self, config: &ConfigMap) -> Result<(), KsmError> {
        self.config = config.clone();
        Ok(())
    }
}
