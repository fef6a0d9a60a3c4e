//! Live entities on the canvas: an ECS world holding transforms, appearance and
//! physics bodies, plus the fixed-step schedule that drives rapier.

mod coords;
mod hierarchy;
mod physics;
mod profiler;
mod sensing;
mod systems;
mod types;

pub use coords::*;
pub use hierarchy::*;
pub use physics::*;
pub use profiler::*;
pub use sensing::*;
pub use systems::*;
pub use types::*;

use crate::config::RuntimeConfig;
use crate::scene::BodyConfig;
use crate::wrap_angle;
use anyhow::{bail, Result};
use bevy_ecs::prelude::{Entity, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;
use glam::Vec2;
use rapier2d::prelude::{Rotation, Vector};
use std::collections::HashMap;

pub struct Stage {
    pub world: World,
    schedule_fixed: Schedule,
    ids: HashMap<String, Entity>,
    /// Registration order; iteration, click ties and touch pairing follow it.
    order: Vec<String>,
    canvas: CanvasSpace,
}

impl Stage {
    pub fn new(config: &RuntimeConfig) -> Self {
        let canvas = CanvasSpace::new(config.canvas.width, config.canvas.height);
        let params = PhysicsParams::from_config(&config.physics);
        let bounds = WorldBounds {
            size: Vec2::new(canvas.width, canvas.height),
            thickness: config.physics.thickness,
            ground: config.physics.ground,
            walls: config.physics.walls,
        };
        let mut world = World::new();
        world.insert_resource(TimeDelta(0.0));
        world.insert_resource(params);
        world.insert_resource(bounds);
        world.insert_resource(RapierState::new(&params, &bounds));
        world.insert_resource(PhysicsEvents::default());
        world.insert_resource(PhaseProfiler::new());

        let mut schedule_fixed = Schedule::default();
        schedule_fixed.add_systems(
            (sys_pin_attached_bodies, sys_apply_custom_gravity, sys_step_rapier, sys_sync_from_rapier).chain(),
        );

        Self { world, schedule_fixed, ids: HashMap::new(), order: Vec::new(), canvas }
    }

    pub fn canvas(&self) -> CanvasSpace {
        self.canvas
    }

    pub fn params(&self) -> PhysicsParams {
        *self.world.resource::<PhysicsParams>()
    }

    /// Resizes the canvas keeping every root entity at the same user-space position.
    pub fn set_canvas_size(&mut self, width: f32, height: f32) -> bool {
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let shift = CanvasSpace::new(width, height).half_extents() - self.canvas.half_extents();
        self.canvas = CanvasSpace::new(width, height);
        let roots: Vec<Entity> =
            self.entities_in_order().filter(|&entity| self.parent_of(entity).is_none()).collect();
        for entity in roots {
            if let Some(mut transform) = self.world.get_mut::<Transform>(entity) {
                transform.translation += shift;
            }
            self.sync_body(entity);
        }
        let size = Vec2::new(width, height);
        self.world.resource_mut::<WorldBounds>().size = size;
        self.world.resource_mut::<RapierState>().resize_bounds(size);
        true
    }

    pub fn spawn(&mut self, spawn: &EntitySpawn) -> Result<Entity> {
        if spawn.id.trim().is_empty() {
            bail!("entity id must not be empty");
        }
        if self.ids.contains_key(&spawn.id) {
            bail!("entity '{}' already exists", spawn.id);
        }
        let transform = Transform {
            translation: self.canvas.user_to_engine(spawn.position),
            rotation: CanvasSpace::user_rotation_to_engine(spawn.rotation),
            scale: spawn.scale,
        };
        let appearance = Appearance {
            costumes: spawn.costumes.clone(),
            current: spawn.costume.min(spawn.costumes.len().saturating_sub(1)),
            visible: spawn.visible,
            depth: spawn.depth,
            base_size: spawn.base_size,
        };
        let mut entity = self.world.spawn((transform, appearance, StageTag { id: spawn.id.clone() }));
        if let Some(component) = &spawn.component {
            entity.insert(ComponentRef(component.clone()));
        }
        if let Some(original) = &spawn.lineage {
            entity.insert(Lineage { original: original.clone() });
        }
        let entity = entity.id();
        if let Some(body) = &spawn.body {
            self.enable_physics(entity, body);
        }
        self.ids.insert(spawn.id.clone(), entity);
        self.order.push(spawn.id.clone());
        Ok(entity)
    }

    /// Removes the entity and its body. Children are released in place rather than
    /// removed with it.
    pub fn despawn(&mut self, id: &str) -> bool {
        let Some(entity) = self.ids.remove(id) else {
            return false;
        };
        self.order.retain(|existing| existing != id);
        for child in self.children_of(entity) {
            self.detach(child);
        }
        self.detach(entity);
        if let Some(handle) = self.world.get::<RapierBody>(entity).map(|b| b.handle) {
            self.world.resource_mut::<RapierState>().remove_body(handle);
        }
        self.world.despawn(entity)
    }

    pub fn clear(&mut self) {
        for entity in self.ids.drain().map(|(_, entity)| entity) {
            self.world.despawn(entity);
        }
        self.order.clear();
        self.world.resource_mut::<RapierState>().clear_dynamic();
        self.world.resource_mut::<PhysicsEvents>().clear();
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.ids.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn id_of(&self, entity: Entity) -> Option<&str> {
        self.world.get::<StageTag>(entity).map(|tag| tag.id.as_str())
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn entities_in_order(&self) -> impl Iterator<Item = Entity> + '_ {
        self.order.iter().filter_map(|id| self.ids.get(id).copied())
    }

    /// Runs one fixed physics step and returns what it reported.
    pub fn step(&mut self, dt: f32) -> PhysicsEvents {
        self.world.resource_mut::<TimeDelta>().0 = dt;
        self.schedule_fixed.run(&mut self.world);
        std::mem::take(&mut *self.world.resource_mut::<PhysicsEvents>())
    }

    pub fn profiler_mut(&mut self) -> bevy_ecs::world::Mut<'_, PhaseProfiler> {
        self.world.resource_mut::<PhaseProfiler>()
    }

    pub fn phase_timings(&self) -> Vec<PhaseTiming> {
        self.world.resource::<PhaseProfiler>().timings()
    }

    // ---------- physics ----------

    /// Gives the entity a dynamic box body sized to its current visual bounds.
    /// Returns false when it already has one.
    pub fn enable_physics(&mut self, entity: Entity, config: &BodyConfig) -> bool {
        if self.world.get::<RapierBody>(entity).is_some() {
            return false;
        }
        let (Some(world), Some(size)) =
            (self.world_transform(entity), self.world.get::<Appearance>(entity).map(Appearance::visual_size))
        else {
            return false;
        };
        let half = size * world.scale.abs() * 0.5;
        let min_size = self.params().min_body_size;
        let (body, collider) = self.world.resource_mut::<RapierState>().spawn_dynamic_body(
            entity,
            world.translation,
            world.rotation,
            half,
            min_size,
            config,
        );
        if self.parent_of(entity).is_some() {
            self.world.resource_mut::<RapierState>().set_kinematic(body, true);
        }
        self.world.entity_mut(entity).insert((
            RapierBody { handle: body },
            RapierCollider { handle: collider },
            BodySettings(*config),
            GroundContact::default(),
        ));
        true
    }

    pub fn has_body(&self, entity: Entity) -> bool {
        self.world.get::<RapierBody>(entity).is_some()
    }

    pub fn body_config(&self, entity: Entity) -> Option<BodyConfig> {
        self.world.get::<BodySettings>(entity).map(|settings| settings.0)
    }

    /// Velocity in user space (+Y up). Fails for entities without a body.
    pub fn set_user_velocity(&mut self, entity: Entity, velocity: Vec2) -> bool {
        let Some(handle) = self.world.get::<RapierBody>(entity).map(|b| b.handle) else {
            return false;
        };
        let engine = CanvasSpace::user_vector_to_engine(velocity);
        let mut rapier = self.world.resource_mut::<RapierState>();
        match rapier.body_mut(handle) {
            Some(body) => {
                body.set_linvel(Vector::new(engine.x, engine.y), true);
                true
            }
            None => false,
        }
    }

    pub fn user_velocity(&self, entity: Entity) -> Option<Vec2> {
        let handle = self.world.get::<RapierBody>(entity)?.handle;
        let velocity = self.world.resource::<RapierState>().body(handle)?.linvel();
        Some(CanvasSpace::engine_vector_to_user(Vec2::new(velocity.x, velocity.y)))
    }

    pub fn set_gravity_scale(&mut self, entity: Entity, scale: f32) -> bool {
        let Some(handle) = self.world.get::<RapierBody>(entity).map(|b| b.handle) else {
            return false;
        };
        let use_world_gravity = match self.world.get_mut::<BodySettings>(entity) {
            Some(mut settings) => {
                settings.0.gravity_scale = scale;
                settings.0.use_world_gravity
            }
            None => true,
        };
        if use_world_gravity {
            self.world.resource_mut::<RapierState>().set_gravity_scale(handle, scale);
        }
        true
    }

    /// Pushes the entity's resolved world transform into its body, if any.
    fn sync_body(&mut self, entity: Entity) {
        let Some(handle) = self.world.get::<RapierBody>(entity).map(|b| b.handle) else {
            return;
        };
        let Some(world) = self.world_transform(entity) else {
            return;
        };
        let mut rapier = self.world.resource_mut::<RapierState>();
        if let Some(body) = rapier.body_mut(handle) {
            body.set_translation(Vector::new(world.translation.x, world.translation.y), true);
            body.set_rotation(Rotation::new(world.rotation), true);
        }
    }

    // ---------- transforms (user space) ----------

    /// Moves the entity so its world transform becomes `world`, keeping any parent
    /// link intact.
    /// Rejects non-finite transforms; rotation is stored wrapped.
    pub fn set_world_transform(&mut self, entity: Entity, mut world: Transform) -> bool {
        if !world.translation.is_finite() || !world.rotation.is_finite() || !world.scale.is_finite() {
            return false;
        }
        world.rotation = wrap_angle(world.rotation);
        let stored = match self.parent_of(entity).and_then(|parent| self.world_transform(parent)) {
            Some(parent_world) => relative_to(&parent_world, &world),
            None => world,
        };
        match self.world.get_mut::<Transform>(entity) {
            Some(mut transform) => *transform = stored,
            None => return false,
        }
        self.sync_body(entity);
        true
    }

    pub fn user_position(&self, entity: Entity) -> Option<Vec2> {
        self.world_transform(entity).map(|world| self.canvas.engine_to_user(world.translation))
    }

    pub fn set_user_position(&mut self, entity: Entity, position: Vec2) -> bool {
        let Some(mut world) = self.world_transform(entity) else {
            return false;
        };
        world.translation = self.canvas.user_to_engine(position);
        self.set_world_transform(entity, world)
    }

    /// Degrees counter-clockwise in (-180, 180].
    pub fn user_rotation(&self, entity: Entity) -> Option<f32> {
        self.world_transform(entity).map(|world| CanvasSpace::engine_rotation_to_user(world.rotation))
    }

    pub fn set_user_rotation(&mut self, entity: Entity, degrees: f32) -> bool {
        let Some(mut world) = self.world_transform(entity) else {
            return false;
        };
        world.rotation = CanvasSpace::user_rotation_to_engine(degrees);
        self.set_world_transform(entity, world)
    }

    pub fn scale(&self, entity: Entity) -> Option<Vec2> {
        self.world_transform(entity).map(|world| world.scale)
    }

    /// Visual scale only; an existing body keeps its size.
    pub fn set_scale(&mut self, entity: Entity, scale: Vec2) -> bool {
        let Some(mut world) = self.world_transform(entity) else {
            return false;
        };
        world.scale = scale;
        self.set_world_transform(entity, world)
    }

    // ---------- appearance ----------

    pub fn appearance(&self, entity: Entity) -> Option<&Appearance> {
        self.world.get::<Appearance>(entity)
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) -> bool {
        match self.world.get_mut::<Appearance>(entity) {
            Some(mut appearance) => {
                appearance.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_depth(&mut self, entity: Entity, depth: i32) -> bool {
        match self.world.get_mut::<Appearance>(entity) {
            Some(mut appearance) => {
                appearance.depth = depth;
                true
            }
            None => false,
        }
    }

    /// Selects a costume by id or name. Returns false for unknown costumes.
    pub fn switch_costume(&mut self, entity: Entity, key: &str) -> bool {
        let Some(mut appearance) = self.world.get_mut::<Appearance>(entity) else {
            return false;
        };
        match appearance.find_costume(key) {
            Some(index) => {
                appearance.current = index;
                true
            }
            None => false,
        }
    }

    pub fn next_costume(&mut self, entity: Entity) -> bool {
        let Some(mut appearance) = self.world.get_mut::<Appearance>(entity) else {
            return false;
        };
        if appearance.costumes.is_empty() {
            return false;
        }
        appearance.current = (appearance.current + 1) % appearance.costumes.len();
        true
    }

    // ---------- stopped flag ----------

    pub fn set_stopped(&mut self, entity: Entity, stopped: bool) {
        if stopped {
            self.world.entity_mut(entity).insert(Stopped);
        } else {
            self.world.entity_mut(entity).remove::<Stopped>();
        }
    }

    pub fn is_stopped(&self, entity: Entity) -> bool {
        self.world.get::<Stopped>(entity).is_some()
    }

    pub fn clear_stopped(&mut self) {
        let entities: Vec<Entity> = self.entities_in_order().collect();
        for entity in entities {
            self.set_stopped(entity, false);
        }
    }

    // ---------- host views ----------

    /// Current state expressed as a spawn description, so a copy can be recreated.
    pub fn spawn_spec(&self, entity: Entity) -> Option<EntitySpawn> {
        let id = self.id_of(entity)?.to_string();
        let world = self.world_transform(entity)?;
        let appearance = self.world.get::<Appearance>(entity)?;
        Some(EntitySpawn {
            id,
            name: None,
            position: self.canvas.engine_to_user(world.translation),
            rotation: CanvasSpace::engine_rotation_to_user(world.rotation),
            scale: world.scale,
            visible: appearance.visible,
            depth: appearance.depth,
            costumes: appearance.costumes.clone(),
            costume: appearance.current,
            base_size: appearance.base_size,
            component: self.component_of(entity).map(str::to_string),
            body: self.body_config(entity),
            lineage: self.world.get::<Lineage>(entity).map(|l| l.original.clone()),
        })
    }

    pub fn snapshot(&self, entity: Entity) -> Option<EntitySnapshot> {
        let world = self.world_transform(entity)?;
        let appearance = self.world.get::<Appearance>(entity)?;
        let position = self.canvas.engine_to_user(world.translation);
        Some(EntitySnapshot {
            id: self.id_of(entity)?.to_string(),
            x: position.x,
            y: position.y,
            rotation: CanvasSpace::engine_rotation_to_user(world.rotation),
            scale: world.scale.to_array(),
            visible: appearance.visible,
            depth: appearance.depth,
            costume: appearance.costume().map(|c| c.id.clone()),
            parent: self.parent_of(entity).and_then(|p| self.id_of(p)).map(str::to_string),
            original: self.world.get::<Lineage>(entity).map(|l| l.original.clone()),
            stopped: self.is_stopped(entity),
            has_body: self.has_body(entity),
        })
    }
}
