use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::AUDIO_OUTPUT_FRAMES;

/// Engine-wide tunables, persisted as JSON in the user config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub version: u32,
    /// Samples per channel copied into an audio texture each frame.
    pub audio_frames: usize,
    /// Audio ring capacity, in multiples of `audio_frames`.
    pub ring_multiplier: usize,
    pub sample_rate: u32,
    pub output_channels: usize,
    /// Fixed seed for `random()`; `None` seeds from the OS.
    pub random_seed: Option<u64>,
    pub hot_reload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            audio_frames: AUDIO_OUTPUT_FRAMES,
            ring_multiplier: 2,
            sample_rate: 48_000,
            output_channels: 2,
            random_seed: None,
            hot_reload: true,
        }
    }
}

impl EngineConfig {
    pub fn ring_capacity(&self) -> usize {
        self.audio_frames.saturating_mul(self.ring_multiplier.max(1))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("shader-filter").join("config.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        if let Some(path) = Self::default_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
