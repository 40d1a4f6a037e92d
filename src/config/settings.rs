//! Settings Module
//!
//! Key-value store consulted by the engine for feature toggles (listing
//! timeouts, disabled managers, custom executable paths). Values are strings;
//! dictionary settings map an item (usually a manager name) to a string.

use crate::error::{EngineError, Result};
use crate::utils::paths;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub mod keys {
    /// Wait unboundedly for listing tasks instead of timing out
    pub const DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS: &str =
        "DisableTimeoutOnPackageListingTasks";
    /// Dictionary: manager name -> "true"
    pub const DISABLED_MANAGERS: &str = "DisabledManagers";
    pub const ALLOW_CUSTOM_MANAGER_PATHS: &str = "AllowCustomManagerPaths";
    /// Dictionary: manager name -> executable path
    pub const MANAGER_PATHS: &str = "ManagerPaths";
    pub const VERBOSE_TASK_LOGS: &str = "VerboseTaskLogs";

    pub const ALL: [&str; 5] = [
        DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS,
        DISABLED_MANAGERS,
        ALLOW_CUSTOM_MANAGER_PATHS,
        MANAGER_PATHS,
        VERBOSE_TASK_LOGS,
    ];

    pub fn is_dictionary(key: &str) -> bool {
        key == DISABLED_MANAGERS || key == MANAGER_PATHS
    }
}

/// The settings collaborator the engine depends on
pub trait SettingsStore: Send + Sync {
    /// Boolean view of a setting; unset keys are false
    fn get(&self, key: &str) -> bool {
        self.get_value(key)
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
    }

    fn get_value(&self, key: &str) -> Option<String>;

    /// Store a value; an empty value removes the key
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn get_dictionary_item(&self, key: &str, item: &str) -> Option<String>;

    /// Store a dictionary entry; an empty value removes the entry
    fn set_dictionary_item(&self, key: &str, item: &str, value: &str) -> Result<()>;
}

/// JSON-file backed settings (or purely in memory for tests)
#[derive(Debug)]
pub struct Settings {
    settings_file: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl Settings {
    /// Load settings from the default location, or start empty
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            parse_settings(path)?
        } else {
            Map::new()
        };

        Ok(Self {
            settings_file: Some(path.to_path_buf()),
            values: Mutex::new(values),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            settings_file: None,
            values: Mutex::new(Map::new()),
        }
    }

    /// All settings as (key, rendered value) pairs, sorted by key
    pub fn all(&self) -> Vec<(String, String)> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut pairs: Vec<_> = values
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect();
        pairs.sort();
        pairs
    }

    fn save(&self, values: &Map<String, Value>) -> Result<()> {
        let Some(path) = &self.settings_file else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = serde_json::to_string_pretty(values)?;
        fs::write(path, content).map_err(|e| EngineError::IoError {
            path: path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

impl SettingsStore for Settings {
    fn get_value(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        if keys::is_dictionary(key) {
            return Err(EngineError::ConfigError(format!(
                "'{}' is a dictionary setting; set one of its items instead",
                key
            )));
        }

        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if value.is_empty() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), Value::String(value.to_string()));
        }
        self.save(&values)
    }

    fn get_dictionary_item(&self, key: &str, item: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match values.get(key)?.as_object()?.get(item)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn set_dictionary_item(&self, key: &str, item: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        if !keys::is_dictionary(key) {
            return Err(EngineError::ConfigError(format!(
                "'{}' is not a dictionary setting",
                key
            )));
        }

        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = values
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Some(dict) = entry.as_object_mut() {
            if value.is_empty() {
                dict.remove(item);
            } else {
                dict.insert(item.to_string(), Value::String(value.to_string()));
            }
        }
        self.save(&values)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if !keys::ALL.contains(&key) {
        return Err(EngineError::ConfigError(format!(
            "Unknown setting: '{}'. Valid settings: {}",
            key,
            keys::ALL.join(", ")
        )));
    }
    Ok(())
}

fn parse_settings(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|e| EngineError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(EngineError::ConfigError(format!(
            "Settings file '{}' must contain a JSON object",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests;
