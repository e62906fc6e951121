//! Preferences persistence with file locking.
//!
//! Preferences are a single whole record; saving replaces the file
//! atomically and the last writer wins.

use crate::{Error, Preferences, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default preferences file name inside the data directory
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Whole-record get/set contract for user preferences
pub trait PreferencesStore {
    fn load(&self) -> Result<Preferences>;
    fn save(&mut self, prefs: &Preferences) -> Result<()>;
}

/// JSON file preferences store
pub struct JsonPreferencesStore {
    path: PathBuf,
    defaults: Preferences,
}

impl JsonPreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            defaults: Preferences::default(),
        }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PREFERENCES_FILE))
    }

    /// Record returned while no preferences file exists yet
    pub fn with_defaults(mut self, defaults: Preferences) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, modify and save back in one step
    pub fn update<F>(&mut self, f: F) -> Result<Preferences>
    where
        F: FnOnce(&mut Preferences) -> Result<()>,
    {
        let mut prefs = self.load()?;
        f(&mut prefs)?;
        self.save(&prefs)?;
        Ok(prefs)
    }

    fn write_atomic(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "preferences path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(prefs)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl PreferencesStore for JsonPreferencesStore {
    /// Missing, unreadable or corrupt files fall back to the defaults
    fn load(&self) -> Result<Preferences> {
        let path = &self.path;
        if !path.exists() {
            tracing::info!("No preferences file found, using defaults");
            return Ok(self.defaults.clone());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open preferences {:?}: {}. Using defaults.",
                    path,
                    e
                );
                return Ok(self.defaults.clone());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock preferences {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(self.defaults.clone());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read preferences {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(self.defaults.clone());
        }

        file.unlock().map_err(Error::store)?;

        let prefs = match serde_json::from_str::<Preferences>(&contents) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse preferences {:?}: {}. Using defaults.",
                    path,
                    e
                );
                return Ok(self.defaults.clone());
            }
        };

        if let Err(e) = prefs.validate() {
            tracing::warn!("Stored preferences rejected ({}). Using defaults.", e);
            return Ok(self.defaults.clone());
        }

        tracing::debug!("Loaded preferences from {:?}", path);
        Ok(prefs)
    }

    fn save(&mut self, prefs: &Preferences) -> Result<()> {
        prefs.validate()?;
        self.write_atomic(prefs).map_err(Error::store)?;
        tracing::debug!("Saved preferences to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Unit;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonPreferencesStore::in_dir(temp_dir.path());

        let prefs = Preferences {
            daily_goal: 2500,
            glass_size: 330,
            preferred_unit: Unit::Oz,
        };
        store.save(&prefs).unwrap();

        assert_eq!(store.load().unwrap(), prefs);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonPreferencesStore::in_dir(temp_dir.path());
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_configured_defaults_apply_before_first_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let defaults = Preferences {
            daily_goal: 3000,
            ..Preferences::default()
        };
        let store = JsonPreferencesStore::in_dir(temp_dir.path()).with_defaults(defaults.clone());
        assert_eq!(store.load().unwrap(), defaults);
    }

    #[test]
    fn test_corrupted_preferences_return_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonPreferencesStore::in_dir(temp_dir.path());
        std::fs::write(store.path(), "{ invalid json }").unwrap();

        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_invalid_stored_values_return_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonPreferencesStore::in_dir(temp_dir.path());
        std::fs::write(store.path(), r#"{"daily_goal": 0}"#).unwrap();

        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_save_rejects_invalid_preferences() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonPreferencesStore::in_dir(temp_dir.path());

        let prefs = Preferences {
            glass_size: 0,
            ..Preferences::default()
        };
        assert!(store.save(&prefs).unwrap_err().is_validation());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_update_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonPreferencesStore::in_dir(temp_dir.path());

        store
            .update(|prefs| {
                prefs.preferred_unit = Unit::Cups;
                Ok(())
            })
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.preferred_unit, Unit::Cups);
        assert_eq!(loaded.daily_goal, 2000);
    }

    #[test]
    fn test_atomic_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonPreferencesStore::in_dir(temp_dir.path());
        store.save(&Preferences::default()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != PREFERENCES_FILE)
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only {}, found extras: {:?}",
            PREFERENCES_FILE,
            extras
        );
    }
}
