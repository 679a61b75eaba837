use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const PREFS_NAMESPACE: &str = "ReelsBlockerPrefs";
pub const BLOCKING_ENABLED_KEY: &str = "blocking_enabled";

/// Key-value store for app-private settings that survive restarts.
pub trait SettingsStore: Send + Sync {
    fn get_bool(&self, key: &str, default: bool) -> Result<bool>;
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;
}

pub fn blocking_enabled(store: &dyn SettingsStore) -> Result<bool> {
    store.get_bool(BLOCKING_ENABLED_KEY, false)
}

pub fn set_blocking_enabled(store: &dyn SettingsStore, enabled: bool) -> Result<()> {
    store.set_bool(BLOCKING_ENABLED_KEY, enabled)
}

/// One JSON object per namespace, stored as `<dir>/<namespace>.json`.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process.
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{namespace}.json")),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&text).with_context(|| {
            format!(
                "failed to parse settings {} (expected a JSON object)",
                self.path.display()
            )
        })
    }

    fn save(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }

        let body = serde_json::to_string_pretty(values).context("failed to encode settings")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("failed to write settings {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace settings {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        let values = self.load()?;
        Ok(values.get(key).and_then(Value::as_bool).unwrap_or(default))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut values = self.load()?;
        values.insert(key.to_string(), Value::Bool(value));
        self.save(&values)
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, bool>>,
}

impl MemorySettingsStore {
    pub fn with(key: &str, value: bool) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value);
        store
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).copied().unwrap_or(default))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BLOCKING_ENABLED_KEY, FileSettingsStore, MemorySettingsStore, PREFS_NAMESPACE,
        SettingsStore, blocking_enabled, set_blocking_enabled,
    };
    use tempfile::tempdir;

    #[test]
    fn flag_defaults_to_false() {
        let temp = tempdir().expect("tempdir");
        let store = FileSettingsStore::new(temp.path(), PREFS_NAMESPACE);
        assert!(!blocking_enabled(&store).expect("read flag"));
        assert!(!store.path().exists());
    }

    #[test]
    fn flag_survives_a_new_store_instance() {
        let temp = tempdir().expect("tempdir");
        let store = FileSettingsStore::new(temp.path().join("nested"), PREFS_NAMESPACE);
        set_blocking_enabled(&store, true).expect("write flag");

        let reopened = FileSettingsStore::new(temp.path().join("nested"), PREFS_NAMESPACE);
        assert!(blocking_enabled(&reopened).expect("read flag"));
        assert!(
            reopened
                .path()
                .ends_with("nested/ReelsBlockerPrefs.json")
        );
    }

    #[test]
    fn other_keys_are_preserved() {
        let temp = tempdir().expect("tempdir");
        let store = FileSettingsStore::new(temp.path(), PREFS_NAMESPACE);
        store.set_bool("onboarding_done", true).expect("write");
        set_blocking_enabled(&store, true).expect("write");
        set_blocking_enabled(&store, false).expect("write");

        assert!(store.get_bool("onboarding_done", false).expect("read"));
        assert!(!store.get_bool(BLOCKING_ENABLED_KEY, true).expect("read"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = FileSettingsStore::new(temp.path(), PREFS_NAMESPACE);
        std::fs::write(store.path(), "not json").expect("write garbage");
        assert!(blocking_enabled(&store).is_err());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySettingsStore::with(BLOCKING_ENABLED_KEY, true);
        assert!(blocking_enabled(&store).expect("read"));
        set_blocking_enabled(&store, false).expect("write");
        assert!(!blocking_enabled(&store).expect("read"));
    }
}
