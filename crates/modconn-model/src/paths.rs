//! Platform-specific paths for preset/bank JSON files.

use std::path::PathBuf;

const APP_NAME: &str = "mod-connector";
const PRESETS_SUBDIR: &str = "presets";

/// The user-specific presets directory (`~/.config/mod-connector/presets/`
/// on Linux, and platform equivalents elsewhere).
pub fn user_presets_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(PRESETS_SUBDIR)
}

/// The user-specific configuration directory.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME)
}

/// Find a preset file by name: an existing path as-is, then the user
/// presets directory, adding a `.json` extension if missing.
pub fn find_preset(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".json") { name.to_string() } else { format!("{name}.json") };

    let user_path = user_presets_dir().join(&filename);
    if user_path.is_file() {
        return Some(user_path);
    }

    None
}

/// Ensure the user presets directory exists, creating it if necessary.
pub fn ensure_user_presets_dir() -> Result<PathBuf, crate::error::PersistError> {
    let dir = user_presets_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::error::PersistError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// List all `.json` files in the user presets directory.
pub fn list_user_presets() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(user_presets_dir()) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false))
        .collect()
}
