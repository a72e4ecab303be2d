/// Gallery configuration
///
/// Layout metrics and timings for the browser. Stored as JSON in the user's
/// config directory; every field has a default so partial files are fine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::layout::engine::LayoutParams;

/// All tunable settings of the browser
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GalleryConfig {
    // ========== Grid ==========

    /// Narrowest a column may get; the column count is
    /// `floor(container width / min_item_width)`
    pub min_item_width: f32,

    /// Horizontal space between columns
    pub column_gap: f32,

    /// Vertical space between items in a column
    pub vertical_gap: f32,

    /// Horizontal padding around the grid
    pub padding_x: f32,

    /// Vertical padding around the grid
    pub padding_y: f32,

    // ========== Timing ==========

    /// Quiet period before a window resize triggers a relayout
    pub resize_debounce_ms: u64,

    /// Duration of anchor and fullscreen transitions
    pub transition_ms: u64,

    /// Frame tick used by offscreen measurement
    pub frame_interval_ms: u64,

    /// Give up waiting for images in a measured fragment after this long.
    /// 0 disables the timeout.
    pub measure_settle_timeout_ms: u64,

    // ========== Tags ==========

    /// Color given to tags created from the detail card
    pub default_tag_color: String,

    /// Catalog location; the platform data directory when unset
    pub library_path: Option<PathBuf>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            min_item_width: 300.0,
            column_gap: 25.0,
            vertical_gap: 25.0,
            padding_x: 48.0,
            padding_y: 24.0,
            resize_debounce_ms: 100,
            transition_ms: 300,
            frame_interval_ms: 16,
            measure_settle_timeout_ms: 5_000,
            default_tag_color: "#3B82F6".to_string(),
            library_path: None,
        }
    }
}

impl GalleryConfig {
    /// Convert to JSON string for storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Where the config file lives, e.g. ~/.config/image-browser/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("image-browser");
        path.push("config.json");
        Ok(path)
    }

    /// Load the config from its default location, writing the defaults
    /// there on first run
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_init(&Self::default_path()?)
    }

    /// Like [`Self::load_from`], but a missing file is created with the
    /// defaults so there is something to edit
    pub fn load_or_init(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        config.save_to(path)?;
        info!(path = %path.display(), "wrote default config");
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Ok(Self::from_json(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            min_item_width: self.min_item_width,
            column_gap: self.column_gap,
            vertical_gap: self.vertical_gap,
        }
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn measure_settle_timeout(&self) -> Option<Duration> {
        (self.measure_settle_timeout_ms > 0).then(|| Duration::from_millis(self.measure_settle_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GalleryConfig::from_json(r#"{ "min_item_width": 240, "unknown": true }"#).unwrap();

        assert_eq!(config.min_item_width, 240.0);
        assert_eq!(config.column_gap, 25.0);
        assert_eq!(config.resize_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn test_serialization() {
        let mut config = GalleryConfig::default();
        config.column_gap = 10.0;
        config.library_path = Some(PathBuf::from("/tmp/catalog.db"));

        let path = std::env::temp_dir()
            .join(format!("image-browser-cfg-{}", std::process::id()))
            .join("config.json");
        config.save_to(&path).unwrap();
        let restored = GalleryConfig::load_from(&path).unwrap();

        assert_eq!(config, restored);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("image-browser-no-such-config.json");
        let config = GalleryConfig::load_from(&path).unwrap();
        assert_eq!(config, GalleryConfig::default());
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("image-browser-init-{}", std::process::id()));
        let path = dir.join("config.json");
        let _ = std::fs::remove_dir_all(&dir);

        let config = GalleryConfig::load_or_init(&path).unwrap();
        assert_eq!(config, GalleryConfig::default());
        assert!(path.exists());

        // an edited file is read back, not overwritten
        std::fs::write(&path, r#"{ "transition_ms": 120 }"#).unwrap();
        let config = GalleryConfig::load_or_init(&path).unwrap();
        assert_eq!(config.transition(), Duration::from_millis(120));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("image-browser-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(GalleryConfig::load_from(&path), Err(ConfigError::Json(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let mut config = GalleryConfig::default();
        config.measure_settle_timeout_ms = 0;
        assert!(config.measure_settle_timeout().is_none());
    }
}
