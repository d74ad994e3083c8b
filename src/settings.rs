use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to write settings: {0}")]
    Serialize(#[from] ron::Error),
}

/// Per-track conventions that vary between hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSettings {
    /// Channel that marks a rhythm track
    pub rhythm_channel: u8,
    pub rhythm_instrument_name: String,
    /// Display name for unnamed tracks is `"<prefix> <channel>"`
    pub untitled_prefix: String,
    pub conductor_name: String,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            rhythm_channel: 9,
            rhythm_instrument_name: "Standard Drum Kit".to_string(),
            untitled_prefix: "Track".to_string(),
            conductor_name: "Conductor".to_string(),
        }
    }
}

impl TrackSettings {
    pub fn from_ron(source: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let source = fs::read_to_string(path)?;
        Self::from_ron(&source)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let source = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, source)?;
        Ok(())
    }
}
