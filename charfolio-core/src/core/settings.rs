//! Extension settings persisted in the local cache.
//!
//! Stored as one camelCase JSON object under [`SETTINGS_KEY`]. Missing keys
//! take their defaults, so older saved settings keep loading.

use crate::core::privacy::{hash_pin, VisibilityMode};
use crate::{CharfolioError, LocalCache, Result};
use serde::{Deserialize, Serialize};

/// Local-cache key for the settings document.
pub const SETTINGS_KEY: &str = "charfolio_settings";

/// Shortest PIN accepted by [`ExtensionSettings::set_pin`].
pub const MIN_PIN_LENGTH: usize = 4;

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionSettings {
    /// Show the folder list in the character sidebar. Read by the host, which
    /// owns the sidebar.
    pub show_sidebar_folders: bool,
    /// Show character counts on folder cards; honoured by
    /// [`FolderBrowser::render`](crate::FolderBrowser::render).
    pub show_folder_counts: bool,
    /// Visibility mode a new session starts in when no PIN is set.
    pub default_visibility: VisibilityMode,
    /// SHA-256 hex of the PIN guarding private folders.
    pub pin_hash: Option<String>,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            show_sidebar_folders: true,
            show_folder_counts: true,
            default_visibility: VisibilityMode::Hidden,
            pin_hash: None,
        }
    }
}

impl ExtensionSettings {
    pub fn has_pin(&self) -> bool {
        self.pin_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Stores the hash of a new PIN.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::ValidationFailed`] if the PIN is shorter than
    /// [`MIN_PIN_LENGTH`] after trimming.
    pub fn set_pin(&mut self, pin: &str) -> Result<()> {
        if pin.trim().chars().count() < MIN_PIN_LENGTH {
            return Err(CharfolioError::ValidationFailed(format!(
                "PIN must be at least {MIN_PIN_LENGTH} characters"
            )));
        }
        self.pin_hash = Some(hash_pin(pin));
        Ok(())
    }

    pub fn clear_pin(&mut self) {
        self.pin_hash = None;
    }

    /// Mode a new session starts in. A PIN-protected setup always starts hidden.
    pub fn initial_visibility(&self) -> VisibilityMode {
        if self.has_pin() {
            VisibilityMode::Hidden
        } else {
            self.default_visibility
        }
    }
}

/// Loads settings; returns defaults if they are missing or corrupt.
pub fn load_settings(cache: &dyn LocalCache) -> ExtensionSettings {
    match cache.get(SETTINGS_KEY) {
        Ok(Some(content)) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable settings: {e}");
            ExtensionSettings::default()
        }),
        Ok(None) => ExtensionSettings::default(),
        Err(e) => {
            log::warn!("could not read settings: {e}");
            ExtensionSettings::default()
        }
    }
}

/// # Errors
///
/// Returns the cache's error if the settings cannot be written.
pub fn save_settings(cache: &dyn LocalCache, settings: &ExtensionSettings) -> Result<()> {
    let json = serde_json::to_string(settings)?;
    cache.set(SETTINGS_KEY, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;

    #[test]
    fn test_missing_settings_use_defaults() {
        let cache = MemoryCache::new();
        assert_eq!(load_settings(&cache), ExtensionSettings::default());
    }

    #[test]
    fn test_corrupt_settings_use_defaults() {
        let cache = MemoryCache::new();
        cache.set(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(load_settings(&cache), ExtensionSettings::default());
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let cache = MemoryCache::new();
        cache.set(SETTINGS_KEY, r#"{"showFolderCounts":false}"#).unwrap();
        let settings = load_settings(&cache);
        assert!(!settings.show_folder_counts);
        assert!(settings.show_sidebar_folders);
    }

    #[test]
    fn test_save_and_reload() {
        let cache = MemoryCache::new();
        let mut settings = ExtensionSettings::default();
        settings.default_visibility = VisibilityMode::ShowAll;
        settings.set_pin("2468").unwrap();
        save_settings(&cache, &settings).unwrap();
        assert_eq!(load_settings(&cache), settings);
    }

    #[test]
    fn test_pin_rules() {
        let mut settings = ExtensionSettings::default();
        settings.default_visibility = VisibilityMode::ShowAll;
        assert!(settings.set_pin("12").is_err());
        assert!(!settings.has_pin());
        assert_eq!(settings.initial_visibility(), VisibilityMode::ShowAll);

        settings.set_pin("1234").unwrap();
        assert_eq!(settings.pin_hash.as_deref(), Some(hash_pin("1234").as_str()));
        assert_eq!(settings.initial_visibility(), VisibilityMode::Hidden);

        settings.clear_pin();
        assert!(!settings.has_pin());
    }
}
