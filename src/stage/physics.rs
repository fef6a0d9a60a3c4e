use crate::config::PhysicsConfig;
use crate::scene::BodyConfig;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::geometry::{CollisionEvent, CollisionEventFlags};
use rapier2d::pipeline::{ActiveEvents, EventHandler};
use rapier2d::prelude::{
    CCDSolver, Collider, ColliderBuilder, ColliderHandle, ColliderSet, ContactPair, DefaultBroadPhase,
    ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryPipeline, Real, RigidBody, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType, Vector,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// World-level physics parameters in engine space.
#[derive(Resource, Clone, Copy, Debug)]
pub struct PhysicsParams {
    pub gravity: Vec2,
    pub min_body_size: f32,
    pub ground_tolerance: f32,
}

impl PhysicsParams {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            gravity: Vec2::new(config.gravity[0], config.gravity[1]),
            min_body_size: config.min_body_size,
            ground_tolerance: config.ground_tolerance,
        }
    }
}

/// Static geometry around the canvas, in engine space.
#[derive(Resource, Clone, Copy, Debug)]
pub struct WorldBounds {
    pub size: Vec2,
    pub thickness: f32,
    pub ground: bool,
    pub walls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionEventKind {
    Started,
    Stopped,
}

/// Who sits behind a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collidee {
    Entity(Entity),
    Ground,
    Wall,
}

struct CollisionEventCollector {
    collision_events: Mutex<Vec<CollisionEvent>>,
}

impl CollisionEventCollector {
    fn new() -> Self {
        Self { collision_events: Mutex::new(Vec::new()) }
    }

    fn drain(&self) -> Vec<CollisionEvent> {
        if let Ok(mut events) = self.collision_events.lock() {
            std::mem::take(&mut *events)
        } else {
            Vec::new()
        }
    }
}

impl EventHandler for CollisionEventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.collision_events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[derive(Resource)]
pub struct RapierState {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    collider_entities: HashMap<ColliderHandle, Entity>,
    ground_collider: Option<ColliderHandle>,
    wall_colliders: Vec<ColliderHandle>,
    static_bodies: Vec<RigidBodyHandle>,
    event_collector: CollisionEventCollector,
    bounds: WorldBounds,
}

impl RapierState {
    pub fn new(params: &PhysicsParams, bounds: &WorldBounds) -> Self {
        let mut state = Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vec_to_rapier(params.gravity),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            collider_entities: HashMap::new(),
            ground_collider: None,
            wall_colliders: Vec::new(),
            static_bodies: Vec::new(),
            event_collector: CollisionEventCollector::new(),
            bounds: *bounds,
        };
        state.init_bounds();
        state
    }

    /// Ground slab whose top face is the canvas bottom, plus optional side walls.
    fn init_bounds(&mut self) {
        let thickness = self.bounds.thickness;
        let size = self.bounds.size;
        if self.bounds.ground {
            let center = Vector::new(size.x * 0.5, size.y + thickness);
            let half = Vector::new(size.x * 0.5 + thickness * 2.0, thickness);
            self.ground_collider = Some(self.insert_static_collider(center, half));
        }
        if self.bounds.walls {
            let half = Vector::new(thickness, size.y * 0.5 + thickness);
            for x in [-thickness, size.x + thickness] {
                let handle = self.insert_static_collider(Vector::new(x, size.y * 0.5), half);
                self.wall_colliders.push(handle);
            }
        }
    }

    /// Rebuilds the static geometry for a new canvas size.
    pub fn resize_bounds(&mut self, size: Vec2) {
        for handle in std::mem::take(&mut self.static_bodies) {
            self.remove_body(handle);
        }
        self.ground_collider = None;
        self.wall_colliders.clear();
        self.bounds.size = size;
        self.init_bounds();
    }

    fn insert_static_collider(&mut self, center: Vector<Real>, half: Vector<Real>) -> ColliderHandle {
        let body = RigidBodyBuilder::fixed().translation(center).build();
        let body_handle = self.bodies.insert(body);
        self.static_bodies.push(body_handle);
        let collider = ColliderBuilder::cuboid(half.x, half.y)
            .restitution(0.0)
            .friction(0.8)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders.insert_with_parent(collider, body_handle, &mut self.bodies)
    }

    /// Creates a dynamic box body. `half` is clamped so the full box is at least
    /// `min_size` on each side.
    pub fn spawn_dynamic_body(
        &mut self,
        entity: Entity,
        position: Vec2,
        rotation: f32,
        half: Vec2,
        min_size: f32,
        config: &BodyConfig,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let half = half.max(Vec2::splat(min_size * 0.5));
        let gravity_scale = if config.use_world_gravity { config.gravity_scale } else { 0.0 };
        let mut builder = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y))
            .rotation(rotation)
            .gravity_scale(gravity_scale);
        if config.fixed_rotation {
            builder = builder.lock_rotations();
        }
        let body_handle = self.bodies.insert(builder.build());
        let collider = ColliderBuilder::cuboid(half.x, half.y)
            .restitution(config.restitution)
            .friction(config.friction)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider_handle = self.colliders.insert_with_parent(collider, body_handle, &mut self.bodies);
        self.collider_entities.insert(collider_handle, entity);
        (body_handle, collider_handle)
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        let collider_handles: Vec<ColliderHandle> = self
            .bodies
            .get(handle)
            .map(|body| body.colliders().iter().copied().collect())
            .unwrap_or_default();
        for collider in collider_handles {
            self.collider_entities.remove(&collider);
        }
        let _ = self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn clear_dynamic(&mut self) {
        let to_remove: Vec<RigidBodyHandle> = self
            .bodies
            .iter()
            .filter(|(handle, _)| !self.static_bodies.contains(handle))
            .map(|(handle, _)| handle)
            .collect();
        for handle in to_remove {
            self.remove_body(handle);
        }
    }

    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        let hooks = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &hooks,
            &self.event_collector,
        );
        self.query_pipeline.update(&self.colliders);
    }

    fn collidee(&self, handle: ColliderHandle) -> Option<Collidee> {
        if self.ground_collider == Some(handle) {
            return Some(Collidee::Ground);
        }
        if self.wall_colliders.contains(&handle) {
            return Some(Collidee::Wall);
        }
        self.collider_entities.get(&handle).copied().map(Collidee::Entity)
    }

    pub fn drain_collision_events(&mut self) -> Vec<(CollisionEventKind, Collidee, Collidee)> {
        let mut out = Vec::new();
        for event in self.event_collector.drain() {
            let (kind, a, b, flags) = match event {
                CollisionEvent::Started(a, b, flags) => (CollisionEventKind::Started, a, b, flags),
                CollisionEvent::Stopped(a, b, flags) => (CollisionEventKind::Stopped, a, b, flags),
            };
            if flags.contains(CollisionEventFlags::SENSOR) {
                continue;
            }
            if let (Some(first), Some(second)) = (self.collidee(a), self.collidee(b)) {
                out.push((kind, first, second));
            }
        }
        out
    }

    /// Per-body gravity for bodies that opted out of world gravity.
    pub fn apply_custom_gravity(&mut self, handle: RigidBodyHandle, scale: f32) {
        let gravity = self.gravity;
        if let Some(body) = self.bodies.get_mut(handle) {
            let mass = body.mass();
            body.reset_forces(false);
            body.add_force(gravity * (mass * scale), true);
        }
    }

    pub fn set_gravity_scale(&mut self, handle: RigidBodyHandle, scale: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_gravity_scale(scale, true);
        }
    }

    /// Attached bodies follow their parent; detached ones simulate again.
    pub fn set_kinematic(&mut self, handle: RigidBodyHandle, kinematic: bool) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let body_type =
                if kinematic { RigidBodyType::KinematicPositionBased } else { RigidBodyType::Dynamic };
            body.set_body_type(body_type, true);
        }
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Engine-space y of the ground plane's top face.
    pub fn ground_line(&self) -> Option<f32> {
        self.bounds.ground.then_some(self.bounds.size.y)
    }
}

fn vec_to_rapier(v: Vec2) -> Vector<Real> {
    Vector::new(v.x, v.y)
}
