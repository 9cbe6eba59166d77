use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SettingsError;

pub const APP_DIR_NAME: &str = "tui-rss";
pub const CONFIG_DIR_ENV: &str = "TUI_RSS_CONFIG_DIR";

/// A typed key inside a settings group, carrying its own default.
#[derive(Debug, Clone, Copy)]
pub struct Setting<T> {
    pub group: &'static str,
    pub key: &'static str,
    default: fn() -> T,
}

impl<T> Setting<T> {
    pub const fn new(group: &'static str, key: &'static str, default: fn() -> T) -> Self {
        Self { group, key, default }
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

pub mod database {
    use super::Setting;

    pub const GROUP: &str = "Database";

    pub const USE_IN_MEMORY: Setting<bool> = Setting::new(GROUP, "UseInMemory", || false);
    pub const ACTIVE_DRIVER: Setting<String> =
        Setting::new(GROUP, "ActiveDriver", || "sqlite".to_string());
    pub const MYSQL_HOSTNAME: Setting<String> =
        Setting::new(GROUP, "MySQLHostname", || "127.0.0.1".to_string());
    pub const MYSQL_USERNAME: Setting<String> =
        Setting::new(GROUP, "MySQLUsername", || "root".to_string());
    // Stored encoded, see crate::crypto.
    pub const MYSQL_PASSWORD: Setting<String> = Setting::new(GROUP, "MySQLPassword", String::new);
    pub const MYSQL_DATABASE: Setting<String> =
        Setting::new(GROUP, "MySQLDatabase", || "rssguard".to_string());
    pub const MYSQL_PORT: Setting<u16> = Setting::new(GROUP, "MySQLPort", || 3306);
}

/// Grouped key-value settings persisted as a single JSON document.
///
/// Writes only touch memory; [`Settings::sync`] flushes the whole document in
/// one step so a set of related writes lands together.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    path: Option<PathBuf>,
    groups: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Settings {
    /// Store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the default settings file, falling back to an empty store at the
    /// same location when the file is unreadable.
    pub fn load_or_default() -> Result<Self, SettingsError> {
        let path = Self::settings_path()?;
        match Self::load_from(path.clone()) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(error = %e, "settings file unusable, starting with defaults");
                Ok(Self {
                    path: Some(path),
                    groups: BTreeMap::new(),
                })
            }
        }
    }

    pub fn load_from(path: PathBuf) -> Result<Self, SettingsError> {
        let groups = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), "settings loaded");
        Ok(Self {
            path: Some(path),
            groups,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the stored value, or the key's default when it is missing or
    /// holds a value of the wrong type.
    pub fn value<T: DeserializeOwned>(&self, setting: &Setting<T>) -> T {
        let Some(raw) = self.raw(setting) else {
            return setting.default_value();
        };

        match serde_json::from_value(raw.clone()) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    group = setting.group,
                    key = setting.key,
                    error = %e,
                    "stored setting has unexpected type, using default"
                );
                setting.default_value()
            }
        }
    }

    pub fn contains<T>(&self, setting: &Setting<T>) -> bool {
        self.raw(setting).is_some()
    }

    pub fn set_value<T: Serialize>(
        &mut self,
        setting: &Setting<T>,
        value: &T,
    ) -> Result<(), SettingsError> {
        let value = serde_json::to_value(value).map_err(|source| SettingsError::Serialize {
            group: setting.group,
            key: setting.key,
            source,
        })?;
        self.groups
            .entry(setting.group.to_string())
            .or_default()
            .insert(setting.key.to_string(), value);
        Ok(())
    }

    /// Writes the document to its file. In-memory stores are left alone.
    pub fn sync(&self) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let io_err = |source| SettingsError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(&self.groups).map_err(SettingsError::Encode)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), "settings written");
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf, SettingsError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR_NAME))
    }

    /// Per-user data directory (database files, logs, runtime socket).
    pub fn data_dir() -> Result<PathBuf, SettingsError> {
        let data_dir = dirs::data_local_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(data_dir.join(APP_DIR_NAME))
    }

    fn settings_path() -> Result<PathBuf, SettingsError> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    fn raw<T>(&self, setting: &Setting<T>) -> Option<&Value> {
        self.groups.get(setting.group)?.get(setting.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = Settings::in_memory();
        assert!(!settings.value(&database::USE_IN_MEMORY));
        assert_eq!(settings.value(&database::ACTIVE_DRIVER), "sqlite");
        assert_eq!(settings.value(&database::MYSQL_PORT), 3306);
        assert!(!settings.contains(&database::MYSQL_PORT));
    }

    #[test]
    fn wrong_type_falls_back_to_default() {
        let mut settings = Settings::in_memory();
        let port_as_text = Setting::<String>::new("Database", "MySQLPort", String::new);
        settings.set_value(&port_as_text, &"abc".to_string()).unwrap();
        assert_eq!(settings.value(&database::MYSQL_PORT), 3306);
    }

    #[test]
    fn sync_and_reload_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::load_from(path.clone()).unwrap();
        settings.set_value(&database::USE_IN_MEMORY, &true).unwrap();
        settings
            .set_value(&database::MYSQL_HOSTNAME, &"db.example.com".to_string())
            .unwrap();
        settings.set_value(&database::MYSQL_PORT, &3307).unwrap();
        settings.sync().unwrap();

        let reloaded = Settings::load_from(path).unwrap();
        assert!(reloaded.value(&database::USE_IN_MEMORY));
        assert_eq!(reloaded.value(&database::MYSQL_HOSTNAME), "db.example.com");
        assert_eq!(reloaded.value(&database::MYSQL_PORT), 3307);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn in_memory_sync_is_a_no_op() {
        let mut settings = Settings::in_memory();
        settings.set_value(&database::USE_IN_MEMORY, &true).unwrap();
        settings.sync().unwrap();
        assert!(settings.path().is_none());
    }
}
