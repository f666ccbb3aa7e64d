//! Persistent panel settings, stored as `tickline.json` in the config dir.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::overlay::OverlayOptions;
use crate::snapshot::SnapshotOptions;
use crate::timecode::DEFAULT_FPS;

pub const SETTINGS_FILE_NAME: &str = "tickline.json";

/// Panel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    // Media
    pub prefer_proxy: bool,
    pub fallback_fps: f64, // Used when the sequence reports no rate

    // Sequence creation and template blocks
    pub overlay: OverlayOptions,

    // Export
    pub export_dir: Option<PathBuf>, // None = current directory
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            prefer_proxy: true,
            fallback_fps: DEFAULT_FPS,
            overlay: OverlayOptions {
                preset_path: "/path/to/V3A2.sqpreset".to_string(),
                template_path: "/path/to/subtitle_block.mogrt".to_string(),
                ..Default::default()
            },
            export_dir: None,
        }
    }
}

impl PanelSettings {
    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            prefer_proxy: self.prefer_proxy,
            fallback_fps: self.fallback_fps,
        }
    }

    /// Load settings; a missing file gives the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}
