use super::physics::RapierState;
use super::types::{Appearance, ComponentRef, GroundContact, Lineage, RapierCollider, Stopped};
use super::Stage;
use crate::blocks::SensingTarget;
use bevy_ecs::prelude::Entity;
use glam::Vec2;

/// Axis-aligned rectangle in engine space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self { min: center - half, max: center + half }
    }

    /// Inclusive overlap test; touching edges count.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x && self.min.y <= other.max.y && self.max.y >= other.min.y
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

impl Stage {
    /// Rotated visual rectangle of the entity reduced to an AABB, using the active
    /// costume's visible pixels (or the nominal size) times the current scale.
    pub fn visual_bounds(&self, entity: Entity) -> Option<Bounds> {
        let appearance = self.world.get::<Appearance>(entity)?;
        let transform = self.world_transform(entity)?;
        let scale = transform.scale.abs();
        let half = appearance.visual_size() * scale * 0.5;
        let offset = appearance.costume().map(|c| c.visible_offset()).unwrap_or(Vec2::ZERO) * transform.scale;
        let rotation = Vec2::from_angle(transform.rotation);
        let center = transform.translation + rotation.rotate(offset);
        let (sin, cos) = (rotation.y.abs(), rotation.x.abs());
        let extent = Vec2::new(half.x * cos + half.y * sin, half.x * sin + half.y * cos);
        Some(Bounds::from_center(center, extent))
    }

    pub fn body_bounds(&self, entity: Entity) -> Option<Bounds> {
        let handle = self.world.get::<RapierCollider>(entity)?.handle;
        let rapier = self.world.resource::<RapierState>();
        let aabb = rapier.collider(handle)?.compute_aabb();
        Some(Bounds { min: Vec2::new(aabb.mins.x, aabb.mins.y), max: Vec2::new(aabb.maxs.x, aabb.maxs.y) })
    }

    /// Physics-body bounds when both sides have bodies, visual bounds otherwise.
    pub fn entities_overlap(&self, a: Entity, b: Entity) -> bool {
        if let (Some(first), Some(second)) = (self.body_bounds(a), self.body_bounds(b)) {
            return first.overlaps(&second);
        }
        match (self.visual_bounds(a), self.visual_bounds(b)) {
            (Some(first), Some(second)) => first.overlaps(&second),
            _ => false,
        }
    }

    fn sensing_bounds(&self, entity: Entity) -> Option<Bounds> {
        self.body_bounds(entity).or_else(|| self.visual_bounds(entity))
    }

    /// Stopped and hidden entities are invisible to sensing.
    pub fn is_sensable(&self, entity: Entity) -> bool {
        self.world.get::<Stopped>(entity).is_none()
            && self.world.get::<Appearance>(entity).is_some_and(|appearance| appearance.visible)
    }

    pub fn touching_edge(&self, entity: Entity) -> bool {
        let Some(bounds) = self.visual_bounds(entity) else {
            return false;
        };
        let size = Vec2::new(self.canvas.width, self.canvas.height);
        bounds.min.x <= 0.0 || bounds.min.y <= 0.0 || bounds.max.x >= size.x || bounds.max.y >= size.y
    }

    /// Bodies report ground from physics contact events; entities without a body
    /// compare their bottom edge with the ground line.
    pub fn on_ground(&self, entity: Entity) -> bool {
        if let Some(contact) = self.world.get::<GroundContact>(entity) {
            if contact.contacts > 0 {
                return true;
            }
            if self.world.get::<RapierCollider>(entity).is_some() {
                return false;
            }
        }
        let rapier = self.world.resource::<RapierState>();
        let Some(ground) = rapier.ground_line() else {
            return false;
        };
        let tolerance = self.params().ground_tolerance;
        self.visual_bounds(entity).is_some_and(|bounds| bounds.max.y >= ground - tolerance)
    }

    /// Hit test against the active costume's visible rectangle in the entity's local
    /// frame, so rotation is respected. Falls back to the bounding box when no
    /// costume is loaded.
    pub fn hit_test(&self, entity: Entity, point: Vec2) -> bool {
        let Some(appearance) = self.world.get::<Appearance>(entity) else {
            return false;
        };
        let Some(costume) = appearance.costume() else {
            return self.visual_bounds(entity).is_some_and(|bounds| bounds.contains(point));
        };
        let Some(transform) = self.world_transform(entity) else {
            return false;
        };
        let local = Vec2::from_angle(-transform.rotation).rotate(point - transform.translation);
        let scale = Vec2::new(
            if transform.scale.x.abs() < f32::EPSILON { f32::EPSILON } else { transform.scale.x },
            if transform.scale.y.abs() < f32::EPSILON { f32::EPSILON } else { transform.scale.y },
        );
        let unscaled = local / scale;
        let half = costume.visible_size() * 0.5;
        let relative = unscaled - costume.visible_offset();
        relative.x.abs() <= half.x && relative.y.abs() <= half.y
    }

    pub fn lineage_root(&self, entity: Entity) -> Option<String> {
        match self.world.get::<Lineage>(entity) {
            Some(lineage) => Some(lineage.original.clone()),
            None => self.id_of(entity).map(str::to_string),
        }
    }

    pub fn is_clone(&self, entity: Entity) -> bool {
        self.world.get::<Lineage>(entity).is_some()
    }

    pub fn component_of(&self, entity: Entity) -> Option<&str> {
        self.world.get::<ComponentRef>(entity).map(|c| c.0.as_str())
    }

    /// Does `other` satisfy an entity-like target from `viewer`'s point of view?
    pub fn matches_target(&self, viewer: Entity, other: Entity, target: &SensingTarget) -> bool {
        if viewer == other {
            return false;
        }
        match target {
            SensingTarget::Entity(id) => self.id_of(other) == Some(id.as_str()),
            SensingTarget::ComponentGroup(component) => self.component_of(other) == Some(component.as_str()),
            SensingTarget::MyClones => {
                self.is_clone(other) && self.lineage_root(other) == self.lineage_root(viewer)
            }
            SensingTarget::Edge | SensingTarget::Ground | SensingTarget::Pointer => false,
        }
    }

    /// `pointer` is in engine space.
    pub fn is_touching(&self, entity: Entity, target: &SensingTarget, pointer: Vec2) -> bool {
        if !self.is_sensable(entity) {
            return false;
        }
        match target {
            SensingTarget::Edge => self.touching_edge(entity),
            SensingTarget::Ground => self.on_ground(entity),
            SensingTarget::Pointer => self.hit_test(entity, pointer),
            _ => self.entities_in_order().any(|other| {
                self.matches_target(entity, other, target)
                    && self.is_sensable(other)
                    && self.entities_overlap(entity, other)
            }),
        }
    }

    /// Distance between centers, or to the pointer. Group targets use the nearest
    /// match. `None` when nothing matches.
    pub fn distance_to(&self, entity: Entity, target: &SensingTarget, pointer: Vec2) -> Option<f32> {
        let origin = self.world_transform(entity)?.translation;
        match target {
            SensingTarget::Pointer => Some(origin.distance(pointer)),
            SensingTarget::Edge => {
                let size = Vec2::new(self.canvas.width, self.canvas.height);
                Some(origin.x.min(origin.y).min(size.x - origin.x).min(size.y - origin.y).max(0.0))
            }
            SensingTarget::Ground => {
                let ground = self.world.resource::<RapierState>().ground_line()?;
                let bottom = self.sensing_bounds(entity).map(|b| b.max.y).unwrap_or(origin.y);
                Some((ground - bottom).max(0.0))
            }
            _ => self
                .entities_in_order()
                .filter(|&other| self.matches_target(entity, other, target))
                .filter_map(|other| self.world_transform(other))
                .map(|transform| origin.distance(transform.translation))
                .reduce(f32::min),
        }
    }

    /// Every sensable entity overlapping `entity`, in registration order, optionally
    /// restricted to an entity-like filter.
    pub fn all_touching(&self, entity: Entity, filter: Option<&SensingTarget>) -> Vec<Entity> {
        if !self.is_sensable(entity) {
            return Vec::new();
        }
        self.entities_in_order()
            .filter(|&other| other != entity && self.is_sensable(other))
            .filter(|&other| match filter {
                Some(target) if target.is_entity_like() => self.matches_target(entity, other, target),
                _ => true,
            })
            .filter(|&other| self.entities_overlap(entity, other))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_overlap() {
        let a = Bounds::from_center(Vec2::ZERO, Vec2::splat(5.0));
        let b = Bounds::from_center(Vec2::new(10.0, 0.0), Vec2::splat(5.0));
        let c = Bounds::from_center(Vec2::new(10.5, 0.0), Vec2::splat(5.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
