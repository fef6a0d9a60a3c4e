use super::types::{Children, Parent, RapierBody, Transform};
use super::Stage;
use super::physics::RapierState;
use anyhow::{bail, Result};
use bevy_ecs::prelude::Entity;
use glam::Vec2;

/// Guards against malformed chains; attach refuses cycles so this is never reached
/// in practice.
const MAX_DEPTH: usize = 64;

/// World transform of `local` placed under `parent`.
pub fn compose(parent: &Transform, local: &Transform) -> Transform {
    let offset = Vec2::from_angle(parent.rotation).rotate(local.translation * parent.scale);
    Transform {
        translation: parent.translation + offset,
        rotation: parent.rotation + local.rotation,
        scale: parent.scale * local.scale,
    }
}

/// Inverse of [`compose`]: re-expresses a world transform in `parent`'s local space.
pub fn relative_to(parent: &Transform, world: &Transform) -> Transform {
    let unrotated = Vec2::from_angle(-parent.rotation).rotate(world.translation - parent.translation);
    Transform {
        translation: unrotated / safe_scale(parent.scale),
        rotation: world.rotation - parent.rotation,
        scale: world.scale / safe_scale(parent.scale),
    }
}

fn safe_scale(scale: Vec2) -> Vec2 {
    Vec2::new(
        if scale.x.abs() < f32::EPSILON { f32::EPSILON } else { scale.x },
        if scale.y.abs() < f32::EPSILON { f32::EPSILON } else { scale.y },
    )
}

/// Walks the parent chain of `entity` through `lookup`, which returns the stored
/// transform and parent of a node.
pub fn resolve_world<F>(entity: Entity, lookup: F) -> Option<Transform>
where
    F: Fn(Entity) -> Option<(Transform, Option<Entity>)>,
{
    let (mut world, mut parent) = lookup(entity)?;
    let mut depth = 0;
    while let Some(next) = parent {
        depth += 1;
        if depth > MAX_DEPTH {
            break;
        }
        let Some((parent_transform, grandparent)) = lookup(next) else {
            break;
        };
        world = compose(&parent_transform, &world);
        parent = grandparent;
    }
    Some(world)
}

impl Stage {
    pub fn world_transform(&self, entity: Entity) -> Option<Transform> {
        resolve_world(entity, |e| {
            let transform = *self.world.get::<Transform>(e)?;
            Some((transform, self.world.get::<Parent>(e).map(|p| p.0)))
        })
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<Parent>(entity).map(|p| p.0)
    }

    fn is_ancestor(&self, candidate: Entity, of: Entity) -> bool {
        let mut current = self.parent_of(of);
        let mut depth = 0;
        while let Some(node) = current {
            if node == candidate {
                return true;
            }
            depth += 1;
            if depth > MAX_DEPTH {
                return false;
            }
            current = self.parent_of(node);
        }
        false
    }

    /// Re-parents `child` under `parent` without moving it on screen. An existing
    /// attachment is released first.
    pub fn attach(&mut self, child: Entity, parent: Entity) -> Result<()> {
        if child == parent {
            bail!("an entity cannot be attached to itself");
        }
        if self.is_ancestor(child, parent) {
            bail!("attaching would create a cycle");
        }
        if self.parent_of(child).is_some() {
            self.detach(child);
        }
        let (Some(child_world), Some(parent_world)) = (self.world_transform(child), self.world_transform(parent))
        else {
            bail!("attach target is not a live entity");
        };
        let local = relative_to(&parent_world, &child_world);
        if let Some(mut transform) = self.world.get_mut::<Transform>(child) {
            *transform = local;
        }
        self.world.entity_mut(child).insert(Parent(parent));
        match self.world.get_mut::<Children>(parent) {
            Some(mut children) => children.0.push(child),
            None => {
                self.world.entity_mut(parent).insert(Children(vec![child]));
            }
        }
        if let Some(handle) = self.world.get::<RapierBody>(child).map(|b| b.handle) {
            self.world.resource_mut::<RapierState>().set_kinematic(handle, true);
        }
        Ok(())
    }

    /// Restores `child` to world space. Returns false when it was not attached.
    pub fn detach(&mut self, child: Entity) -> bool {
        let Some(parent) = self.parent_of(child) else {
            return false;
        };
        let world = self.world_transform(child);
        if let Some(mut siblings) = self.world.get_mut::<Children>(parent) {
            siblings.0.retain(|&sibling| sibling != child);
        }
        self.world.entity_mut(child).remove::<Parent>();
        if let (Some(world), Some(mut transform)) = (world, self.world.get_mut::<Transform>(child)) {
            *transform = world;
        }
        if let Some(handle) = self.world.get::<RapierBody>(child).map(|b| b.handle) {
            let mut rapier = self.world.resource_mut::<RapierState>();
            rapier.set_kinematic(handle, false);
            if let (Some(world), Some(body)) = (world, rapier.body_mut(handle)) {
                body.set_translation(rapier2d::prelude::Vector::new(world.translation.x, world.translation.y), true);
            }
        }
        true
    }

    pub fn children_of(&self, entity: Entity) -> Vec<Entity> {
        self.world.get::<Children>(entity).map(|c| c.0.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Transform, b: Transform) -> bool {
        a.translation.abs_diff_eq(b.translation, 1e-3)
            && (a.rotation - b.rotation).abs() < 1e-5
            && a.scale.abs_diff_eq(b.scale, 1e-5)
    }

    #[test]
    fn relative_then_compose_is_identity() {
        let parent = Transform { translation: Vec2::new(100.0, 50.0), rotation: 0.7, scale: Vec2::new(2.0, 0.5) };
        let world = Transform { translation: Vec2::new(-30.0, 12.5), rotation: -1.2, scale: Vec2::new(1.5, 3.0) };
        let local = relative_to(&parent, &world);
        assert!(approx(compose(&parent, &local), world));
    }

    #[test]
    fn chain_resolution_composes_ancestors() {
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let parent = Transform { translation: Vec2::new(10.0, 0.0), ..Default::default() };
        let child = Transform { translation: Vec2::new(5.0, 5.0), ..Default::default() };
        let world = resolve_world(b, |e| {
            if e == a {
                Some((parent, None))
            } else if e == b {
                Some((child, Some(a)))
            } else {
                None
            }
        })
        .expect("chain resolves");
        assert_eq!(world.translation, Vec2::new(15.0, 5.0));
    }
}
