use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "CanvasConfig::default_width")]
    pub width: f32,
    #[serde(default = "CanvasConfig::default_height")]
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// World gravity in engine space (pixels per second squared, +Y down).
    #[serde(default = "PhysicsConfig::default_gravity")]
    pub gravity: [f32; 2],
    #[serde(default = "PhysicsConfig::default_ground")]
    pub ground: bool,
    #[serde(default)]
    pub walls: bool,
    #[serde(default = "PhysicsConfig::default_thickness")]
    pub thickness: f32,
    #[serde(default = "PhysicsConfig::default_min_body_size")]
    pub min_body_size: f32,
    /// Distance below which a body's bottom edge counts as resting on the ground.
    #[serde(default = "PhysicsConfig::default_ground_tolerance")]
    pub ground_tolerance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default = "RuntimeConfig::default_frame_dt")]
    pub frame_dt: f32,
    #[serde(default = "RuntimeConfig::default_clone_limit")]
    pub clone_limit: usize,
    #[serde(default = "RuntimeConfig::default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default = "RuntimeConfig::default_audio_history")]
    pub audio_history: usize,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfigOverrides {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub clone_limit: Option<usize>,
    pub seed: Option<u64>,
}

impl CanvasConfig {
    const fn default_width() -> f32 {
        480.0
    }

    const fn default_height() -> f32 {
        360.0
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: Self::default_width(), height: Self::default_height() }
    }
}

impl PhysicsConfig {
    const fn default_gravity() -> [f32; 2] {
        [0.0, 980.0]
    }

    const fn default_ground() -> bool {
        true
    }

    const fn default_thickness() -> f32 {
        20.0
    }

    const fn default_min_body_size() -> f32 {
        32.0
    }

    const fn default_ground_tolerance() -> f32 {
        1.5
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Self::default_gravity(),
            ground: Self::default_ground(),
            walls: false,
            thickness: Self::default_thickness(),
            min_body_size: Self::default_min_body_size(),
            ground_tolerance: Self::default_ground_tolerance(),
        }
    }
}

impl RuntimeConfig {
    const fn default_frame_dt() -> f32 {
        1.0 / 60.0
    }

    const fn default_clone_limit() -> usize {
        300
    }

    const fn default_log_capacity() -> usize {
        200
    }

    const fn default_audio_history() -> usize {
        64
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &RuntimeConfigOverrides) {
        if let Some(width) = overrides.width {
            self.canvas.width = width;
        }
        if let Some(height) = overrides.height {
            self.canvas.height = height;
        }
        if let Some(limit) = overrides.clone_limit {
            self.clone_limit = limit;
        }
        if let Some(seed) = overrides.seed {
            self.random_seed = Some(seed);
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            physics: PhysicsConfig::default(),
            frame_dt: Self::default_frame_dt(),
            clone_limit: Self::default_clone_limit(),
            log_capacity: Self::default_log_capacity(),
            audio_history: Self::default_audio_history(),
            random_seed: None,
        }
    }
}

impl RuntimeConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.clone_limit.is_none() && self.seed.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.clone_limit.is_some() {
            fields.push("clone_limit");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        fields
    }
}
