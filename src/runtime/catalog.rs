use crate::compiler::{Behavior, BehaviorId, EventMask, Trigger};
use crate::stage::EntitySpawn;
use std::rc::Rc;

/// Behaviors registered on one entity, in registration order. Behaviors are shared
/// by reference between an original, its template and every clone.
#[derive(Debug, Clone, Default)]
pub struct BehaviorCatalog {
    behaviors: Vec<Rc<Behavior>>,
    mask: EventMask,
}

impl BehaviorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the behavior is already registered.
    pub fn register(&mut self, behavior: Rc<Behavior>) -> bool {
        if self.contains(behavior.id) {
            return false;
        }
        self.mask |= behavior.trigger.mask();
        self.behaviors.push(behavior);
        true
    }

    pub fn contains(&self, id: BehaviorId) -> bool {
        self.behaviors.iter().any(|behavior| behavior.id == id)
    }

    pub fn get(&self, id: BehaviorId) -> Option<&Rc<Behavior>> {
        self.behaviors.iter().find(|behavior| behavior.id == id)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    pub fn handles(&self, events: EventMask) -> bool {
        self.mask.intersects(events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Behavior>> {
        self.behaviors.iter()
    }

    /// Behaviors whose trigger satisfies `filter`, cloned out so the caller may run
    /// them while mutating the runtime.
    pub fn matching(&self, filter: impl Fn(&Trigger) -> bool) -> Vec<Rc<Behavior>> {
        self.behaviors.iter().filter(|behavior| filter(&behavior.trigger)).cloned().collect()
    }
}

/// What a clone is made from: the original's initial spawn data and its full
/// catalog, captured once the start phase has registered every lazy forever.
#[derive(Debug)]
pub struct Template {
    pub spawn: EntitySpawn,
    pub catalog: BehaviorCatalog,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Body;

    fn behavior(trigger: Trigger) -> Rc<Behavior> {
        let body: Body = Vec::new().into();
        Rc::new(Behavior::new(trigger, body))
    }

    #[test]
    fn registration_is_idempotent_per_behavior() {
        let mut catalog = BehaviorCatalog::new();
        let forever = behavior(Trigger::Forever);
        assert!(catalog.register(Rc::clone(&forever)));
        assert!(!catalog.register(Rc::clone(&forever)));
        assert!(catalog.register(behavior(Trigger::Click)));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.handles(EventMask::CLICK));
        assert!(!catalog.handles(EventMask::MESSAGE));
    }

    #[test]
    fn matching_preserves_registration_order() {
        let mut catalog = BehaviorCatalog::new();
        let first = behavior(Trigger::Message("go".into()));
        let second = behavior(Trigger::Start);
        let third = behavior(Trigger::Message("go".into()));
        for entry in [&first, &second, &third] {
            catalog.register(Rc::clone(entry));
        }
        let ids: Vec<_> = catalog.matching(|t| matches!(t, Trigger::Message(_))).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
    }
}
