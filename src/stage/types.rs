use crate::scene::{BodyConfig, CostumeDefinition};
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};
use serde::{Deserialize, Serialize};

/// Engine-space transform: pixels from the canvas top-left, +Y down, rotation in
/// radians (positive turns clockwise on screen). Relative to the parent when the
/// entity carries a [`Parent`].
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}
impl Default for Transform {
    fn default() -> Self {
        Self { translation: Vec2::ZERO, rotation: 0.0, scale: Vec2::splat(1.0) }
    }
}
#[derive(Component, Clone, Copy)]
pub struct Parent(pub Entity);
#[derive(Component, Default)]
pub struct Children(pub Vec<Entity>);

#[derive(Component, Clone, Debug)]
pub struct StageTag {
    pub id: String,
}

#[derive(Component, Clone, Debug)]
pub struct Appearance {
    pub costumes: Vec<CostumeDefinition>,
    pub current: usize,
    pub visible: bool,
    pub depth: i32,
    /// Bounds used when no costume is loaded.
    pub base_size: Vec2,
}

impl Appearance {
    pub fn costume(&self) -> Option<&CostumeDefinition> {
        self.costumes.get(self.current)
    }

    /// Unscaled size of what is drawn: the active costume's visible pixels, or the
    /// nominal size without a costume.
    pub fn visual_size(&self) -> Vec2 {
        self.costume().map(CostumeDefinition::visible_size).unwrap_or(self.base_size)
    }

    pub fn find_costume(&self, key: &str) -> Option<usize> {
        self.costumes
            .iter()
            .position(|costume| costume.id == key)
            .or_else(|| self.costumes.iter().position(|costume| costume.name.eq_ignore_ascii_case(key)))
    }
}

/// Present on clones only; names the template-bearing original.
#[derive(Component, Clone, Debug)]
pub struct Lineage {
    pub original: String,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Stopped;

#[derive(Component, Clone, Debug)]
pub struct ComponentRef(pub String);

#[derive(Component, Clone, Copy)]
pub struct RapierBody {
    pub handle: RigidBodyHandle,
}
#[derive(Component, Clone, Copy)]
pub struct RapierCollider {
    pub handle: ColliderHandle,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct BodySettings(pub BodyConfig);

/// Number of ground contacts currently reported by the physics engine.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct GroundContact {
    pub contacts: u32,
}

/// Everything needed to create a live entity. Templates keep one of these so clones
/// can be spawned after the original is gone.
#[derive(Debug, Clone)]
pub struct EntitySpawn {
    pub id: String,
    pub name: Option<String>,
    /// User-space position (center origin, +Y up).
    pub position: Vec2,
    /// Degrees counter-clockwise.
    pub rotation: f32,
    pub scale: Vec2,
    pub visible: bool,
    pub depth: i32,
    pub costumes: Vec<CostumeDefinition>,
    pub costume: usize,
    pub base_size: Vec2,
    pub component: Option<String>,
    pub body: Option<BodyConfig>,
    pub lineage: Option<String>,
}

impl EntitySpawn {
    pub const DEFAULT_SIZE: Vec2 = Vec2::new(64.0, 64.0);

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            visible: true,
            depth: 0,
            costumes: Vec::new(),
            costume: 0,
            base_size: Self::DEFAULT_SIZE,
            component: None,
            body: None,
            lineage: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.base_size = Vec2::new(width, height);
        self
    }

    pub fn with_costumes(mut self, costumes: Vec<CostumeDefinition>) -> Self {
        self.costumes = costumes;
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_body(mut self, body: BodyConfig) -> Self {
        self.body = Some(body);
        self
    }
}

/// User-space view of an entity for hosts and test fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale: [f32; 2],
    pub visible: bool,
    pub depth: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    pub stopped: bool,
    pub has_body: bool,
}
