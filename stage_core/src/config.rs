//! Configuration system.
//!
//! Loads stage configuration from JSON strings (file IO left to the app).

use serde::{Deserialize, Serialize};

/// Root configuration shared by the core and the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Initial surface width in pixels (headless viewer only).
    #[serde(default = "default_surface_width")]
    pub surface_width: f32,
    /// Initial surface height in pixels (headless viewer only).
    #[serde(default = "default_surface_height")]
    pub surface_height: f32,
    /// Fraction of the surface height an attached model fills.
    #[serde(default = "default_margin_factor")]
    pub margin_factor: f32,
    /// Case-insensitive substring that marks a motion group as idle.
    #[serde(default = "default_idle_pattern")]
    pub idle_pattern: String,
    /// Render tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// File name suffix identifying the manifest inside a model folder.
    #[serde(default = "default_manifest_suffix")]
    pub manifest_suffix: String,
    /// Height reported by headless instances, in model units.
    #[serde(default = "default_intrinsic_height")]
    pub default_intrinsic_height: f32,
}

fn default_surface_width() -> f32 {
    800.0
}

fn default_surface_height() -> f32 {
    600.0
}

fn default_margin_factor() -> f32 {
    0.8
}

fn default_idle_pattern() -> String {
    "idle".to_string()
}

fn default_tick_hz() -> u32 {
    60
}

fn default_manifest_suffix() -> String {
    ".model3.json".to_string()
}

fn default_intrinsic_height() -> f32 {
    2048.0
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
            margin_factor: default_margin_factor(),
            idle_pattern: default_idle_pattern(),
            tick_hz: default_tick_hz(),
            manifest_suffix: default_manifest_suffix(),
            default_intrinsic_height: default_intrinsic_height(),
        }
    }
}

impl StageConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = StageConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, StageConfig::default());
        assert_eq!(cfg.margin_factor, 0.8);
        assert_eq!(cfg.idle_pattern, "idle");
    }

    #[test]
    fn partial_override() {
        let cfg = StageConfig::from_json_str(r#"{"tick_hz": 30, "surface_height": 1080}"#).unwrap();
        assert_eq!(cfg.tick_hz, 30);
        assert_eq!(cfg.surface_height, 1080.0);
        assert_eq!(cfg.surface_width, 800.0);
    }
}
