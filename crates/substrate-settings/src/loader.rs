//! Settings loading: defaults, file merge, environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::Settings;

/// Path to the user settings file: `~/.substrate/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = dirs_home().unwrap_or_else(|| PathBuf::from("."));
    home.join(".substrate").join("settings.json")
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Load settings from the default path, applying environment overrides.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path, applying environment overrides.
///
/// Missing files are treated as an empty override layer (i.e. compiled
/// defaults apply), matching the behavior a first run on a clean machine
/// should have.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let file_value = if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?
    } else {
        Value::Object(serde_json::Map::new())
    };

    let defaults = serde_json::to_value(Settings::default()).expect("Settings always serializes");
    let merged = deep_merge(defaults, file_value);
    let merged = apply_env_overrides(merged);

    let mut settings: Settings =
        serde_json::from_value(merged).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` onto `base`, with `overlay` taking priority.
///
/// Object fields merge key-by-key; any other value type (including
/// arrays) is replaced wholesale by the overlay's value.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `SUBSTRATE_*` environment variable overrides onto a few
/// high-traffic scalar fields.
///
/// Only a small, explicit set of env vars is supported — this is meant
/// for container/CI overrides of a handful of knobs, not a general
/// env-to-JSON mapping.
fn apply_env_overrides(mut value: Value) -> Value {
    if let Ok(raw) = std::env::var("SUBSTRATE_STORAGE_POOL_SIZE") {
        if let Ok(parsed) = raw.parse::<u64>() {
            set_path(&mut value, &["storage", "poolSize"], Value::from(parsed));
        }
    }
    if let Ok(raw) = std::env::var("SUBSTRATE_STORAGE_DATABASE_PATH") {
        set_path(&mut value, &["storage", "databasePath"], Value::from(raw));
    }
    if let Ok(raw) = std::env::var("SUBSTRATE_LOGGING_LEVEL") {
        set_path(&mut value, &["logging", "level"], Value::from(raw));
    }
    value
}

fn set_path(value: &mut Value, path: &[&str], leaf: Value) {
    let Some((last, rest)) = path.split_last() else {
        return;
    };
    let mut cursor = value;
    for segment in rest {
        cursor = cursor
            .as_object_mut()
            .expect("settings root is always an object")
            .entry(*segment)
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if let Some(obj) = cursor.as_object_mut() {
        obj.insert((*last).to_string(), leaf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overlays_nested_objects() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let overlay = json!({"a": {"y": 20}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["a"]["x"], 1);
        assert_eq!(merged["a"]["y"], 20);
        assert_eq!(merged["b"], 3);
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let base = json!({"tags": ["a", "b"]});
        let overlay = json!({"tags": ["c"]});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["tags"], json!(["c"]));
    }

    #[test]
    fn load_settings_from_missing_path_uses_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.storage.pool_size, 8);
    }

    #[test]
    fn load_settings_from_path_applies_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"storage": {"poolSize": 64}}"#).unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.storage.pool_size, 64);
        assert_eq!(settings.storage.database_path, "events.db");
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn settings_path_lives_under_home_dot_substrate() {
        let path = settings_path();
        assert!(path.ends_with(".substrate/settings.json"));
    }
}
