use super::hierarchy::resolve_world;
use super::physics::{Collidee, CollisionEventKind, RapierState};
use super::profiler::PhaseProfiler;
use super::types::*;
use bevy_ecs::prelude::*;
use bevy_ecs::system::{Res, ResMut};
use glam::Vec2;
use rapier2d::prelude::{Rotation, Vector};

#[derive(Resource, Clone, Copy)]
pub struct TimeDelta(pub f32);

/// Contacts reported by the last physics step, consumed by the runtime.
#[derive(Resource, Default)]
pub struct PhysicsEvents {
    pub ground: Vec<(Entity, bool)>,
    pub contacts: Vec<(CollisionEventKind, Entity, Entity)>,
}

impl PhysicsEvents {
    pub fn clear(&mut self) {
        self.ground.clear();
        self.contacts.clear();
    }
}

/// Bodies of attached entities are kinematic and pinned to their world transform.
pub fn sys_pin_attached_bodies(
    mut profiler: ResMut<PhaseProfiler>,
    mut rapier: ResMut<RapierState>,
    attached: Query<(Entity, &RapierBody), With<Parent>>,
    nodes: Query<(&Transform, Option<&Parent>)>,
) {
    let _span = profiler.scope("sys_pin_attached_bodies");
    for (entity, body) in &attached {
        let Some(world) = resolve_world(entity, |e| nodes.get(e).ok().map(|(t, p)| (*t, p.map(|p| p.0)))) else {
            continue;
        };
        if let Some(rb) = rapier.body_mut(body.handle) {
            rb.set_translation(Vector::new(world.translation.x, world.translation.y), true);
            rb.set_rotation(Rotation::new(world.rotation), true);
        }
    }
}

pub fn sys_apply_custom_gravity(
    mut profiler: ResMut<PhaseProfiler>,
    mut rapier: ResMut<RapierState>,
    query: Query<(&RapierBody, &BodySettings), Without<Parent>>,
) {
    let _span = profiler.scope("sys_apply_custom_gravity");
    for (body, settings) in &query {
        if !settings.0.use_world_gravity {
            rapier.apply_custom_gravity(body.handle, settings.0.gravity_scale);
        }
    }
}

pub fn sys_step_rapier(
    mut profiler: ResMut<PhaseProfiler>,
    mut rapier: ResMut<RapierState>,
    mut events: ResMut<PhysicsEvents>,
    mut grounds: Query<&mut GroundContact>,
    dt: Res<TimeDelta>,
) {
    let _span = profiler.scope("sys_step_rapier");
    if dt.0 > 0.0 {
        rapier.step(dt.0);
    }
    for (kind, a, b) in rapier.drain_collision_events() {
        match (a, b) {
            (Collidee::Entity(entity), Collidee::Ground) | (Collidee::Ground, Collidee::Entity(entity)) => {
                if let Ok(mut contact) = grounds.get_mut(entity) {
                    let was_grounded = contact.contacts > 0;
                    contact.contacts = match kind {
                        CollisionEventKind::Started => contact.contacts + 1,
                        CollisionEventKind::Stopped => contact.contacts.saturating_sub(1),
                    };
                    let grounded = contact.contacts > 0;
                    if grounded != was_grounded {
                        events.ground.push((entity, grounded));
                    }
                }
            }
            (Collidee::Entity(first), Collidee::Entity(second)) => events.contacts.push((kind, first, second)),
            _ => {}
        }
    }
}

pub fn sys_sync_from_rapier(
    mut profiler: ResMut<PhaseProfiler>,
    rapier: Res<RapierState>,
    mut query: Query<(&RapierBody, &mut Transform), Without<Parent>>,
) {
    let _span = profiler.scope("sys_sync_from_rapier");
    for (body_handle, mut transform) in &mut query {
        if let Some(body) = rapier.body(body_handle.handle) {
            let translation = body.translation();
            transform.translation = Vec2::new(translation.x, translation.y);
            transform.rotation = body.rotation().angle();
        }
    }
}
