use crate::blocks::BlockProgram;
use crate::variables::VariableDefinition;
use anyhow::{Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything the editor hands over for one playable scene: catalogs plus one entry
/// per scene object with its block program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub costumes: Vec<CostumeDefinition>,
    #[serde(default)]
    pub sounds: Vec<SoundDefinition>,
    #[serde(default)]
    pub entities: Vec<EntityDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Position in user space (center origin, +Y up).
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Degrees, counter-clockwise; 0 faces right.
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "EntityDescription::default_scale")]
    pub scale: f32,
    #[serde(default = "EntityDescription::default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub depth: i32,
    /// Nominal size used for bounds when no costume is loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[f32; 2]>,
    /// Costume ids from the scene catalog, in switching order.
    #[serde(default)]
    pub costumes: Vec<String>,
    #[serde(default)]
    pub costume: usize,
    /// Reusable component this object instantiates, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<BodyConfig>,
    #[serde(default)]
    pub program: BlockProgram,
}

impl EntityDescription {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: Self::default_scale(),
            visible: Self::default_visible(),
            depth: 0,
            size: None,
            costumes: Vec::new(),
            costume: 0,
            component: None,
            physics: None,
            program: BlockProgram::default(),
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some([width, height]);
        self
    }

    pub fn with_program(mut self, program: BlockProgram) -> Self {
        self.program = program;
        self
    }

    const fn default_scale() -> f32 {
        1.0
    }

    const fn default_visible() -> bool {
        true
    }
}

/// Physics settings carried by an entity; presence means a body is created on load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    #[serde(default = "BodyConfig::default_gravity_scale")]
    pub gravity_scale: f32,
    /// When false the body opts out of world gravity and receives an explicit
    /// per-tick force of `gravity * gravity_scale` instead.
    #[serde(default = "BodyConfig::default_use_world_gravity")]
    pub use_world_gravity: bool,
    #[serde(default = "BodyConfig::default_fixed_rotation")]
    pub fixed_rotation: bool,
    #[serde(default = "BodyConfig::default_restitution")]
    pub restitution: f32,
    #[serde(default = "BodyConfig::default_friction")]
    pub friction: f32,
}

impl BodyConfig {
    const fn default_gravity_scale() -> f32 {
        1.0
    }

    const fn default_use_world_gravity() -> bool {
        true
    }

    const fn default_fixed_rotation() -> bool {
        true
    }

    const fn default_restitution() -> f32 {
        0.1
    }

    const fn default_friction() -> f32 {
        0.6
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            gravity_scale: Self::default_gravity_scale(),
            use_world_gravity: Self::default_use_world_gravity(),
            fixed_rotation: Self::default_fixed_rotation(),
            restitution: Self::default_restitution(),
            friction: Self::default_friction(),
        }
    }
}

/// Rectangle of non-transparent pixels inside a costume image, in image pixels
/// from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostumeDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default = "CostumeDefinition::default_extent")]
    pub width: f32,
    #[serde(default = "CostumeDefinition::default_extent")]
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<PixelBounds>,
}

impl CostumeDefinition {
    const fn default_extent() -> f32 {
        64.0
    }

    pub fn new(id: impl Into<String>, width: f32, height: f32) -> Self {
        let id = id.into();
        Self { name: id.clone(), id, image: String::new(), width, height, bounds: None }
    }

    pub fn with_bounds(mut self, bounds: PixelBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Size of the visible-pixel rectangle, or the whole image without bounds.
    pub fn visible_size(&self) -> Vec2 {
        match self.bounds {
            Some(bounds) => Vec2::new(bounds.width, bounds.height),
            None => Vec2::new(self.width, self.height),
        }
    }

    /// Offset of the visible rectangle's center from the image center, in image
    /// pixels with +Y down.
    pub fn visible_offset(&self) -> Vec2 {
        match self.bounds {
            Some(bounds) => {
                Vec2::new(bounds.x + bounds.width * 0.5 - self.width * 0.5, bounds.y + bounds.height * 0.5 - self.height * 0.5)
            }
            None => Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    /// Length of the decoded clip in seconds, when the host knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
}

impl SoundDefinition {
    pub fn new(id: impl Into<String>, duration: Option<f64>) -> Self {
        let id = id.into();
        Self { name: id.clone(), id, source: String::new(), duration, trim_start: None, trim_end: None }
    }

    pub fn playback_duration(&self) -> Option<f64> {
        let duration = self.duration?;
        let start = self.trim_start.unwrap_or(0.0).clamp(0.0, duration);
        let end = self.trim_end.unwrap_or(duration).clamp(start, duration);
        Some(end - start)
    }
}

impl SceneDescription {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading scene file {}", path.display()))?;
        serde_json::from_slice::<SceneDescription>(&bytes)
            .with_context(|| format!("Parsing scene file {}", path.display()))
    }

    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Parsing scene description")
    }

    pub fn costume(&self, id: &str) -> Option<&CostumeDefinition> {
        self.costumes.iter().find(|costume| costume.id == id)
    }
}
