use super::Runtime;
use crate::blocks::SensingTarget;
use crate::compiler::{Behavior, BehaviorId, EventMask, Trigger};
use crate::events::GameEvent;
use crate::input::KeyCode;
use bevy_ecs::prelude::Entity;
use glam::Vec2;
use std::collections::HashSet;
use std::rc::Rc;

impl Runtime {
    /// Non-stopped entities that have a catalog, in registration order.
    fn dispatch_targets(&self, events: EventMask) -> Vec<(String, Entity)> {
        self.stage
            .ids()
            .iter()
            .filter(|id| self.catalogs.get(id.as_str()).is_some_and(|catalog| catalog.handles(events)))
            .filter_map(|id| self.stage.entity(id).map(|entity| (id.clone(), entity)))
            .filter(|(_, entity)| !self.stage.is_stopped(*entity))
            .collect()
    }

    fn behaviors_for(&self, id: &str, filter: impl Fn(&Trigger) -> bool) -> Vec<Rc<Behavior>> {
        self.catalogs.get(id).map(|catalog| catalog.matching(filter)).unwrap_or_default()
    }

    fn entity_live(&self, id: &str) -> bool {
        self.stage.entity(id).is_some_and(|entity| !self.stage.is_stopped(entity))
    }

    pub(crate) fn run_forevers(&mut self) {
        if !self.forevers_active {
            return;
        }
        for (id, _) in self.dispatch_targets(EventMask::FOREVER) {
            for behavior in self.behaviors_for(&id, |trigger| *trigger == Trigger::Forever) {
                if !self.is_running() {
                    return;
                }
                if self.entity_live(&id) {
                    self.launch(&id, &behavior);
                }
            }
        }
    }

    /// Lazily adds a forever behavior registered by a statement-level `forever`.
    pub(crate) fn register_forever(&mut self, id: &str, behavior: Rc<Behavior>) -> bool {
        match self.catalogs.get_mut(id) {
            Some(catalog) => catalog.register(behavior),
            None => false,
        }
    }

    /// Delivers touching behaviors: once per unordered overlapping pair, then the
    /// world targets (edge, ground, pointer) once per entity. Each behavior fires at
    /// most once per entity per frame.
    pub(crate) fn deliver_touching(&mut self) {
        self.touching_pairs.clear();
        let listeners = self.dispatch_targets(EventMask::TOUCHING);
        if listeners.is_empty() {
            self.previous_pairs.clear();
            return;
        }
        let listening: HashSet<&str> = listeners.iter().map(|(id, _)| id.as_str()).collect();
        let candidates: Vec<(String, Entity)> = self
            .stage
            .ids()
            .iter()
            .filter_map(|id| self.stage.entity(id).map(|entity| (id.clone(), entity)))
            .filter(|(_, entity)| self.stage.is_sensable(*entity))
            .collect();

        let mut overlapping = Vec::new();
        for (index, (a_id, a)) in candidates.iter().enumerate() {
            for (b_id, b) in &candidates[index + 1..] {
                if !listening.contains(a_id.as_str()) && !listening.contains(b_id.as_str()) {
                    continue;
                }
                if self.stage.entities_overlap(*a, *b) {
                    overlapping.push((a_id.clone(), *a, b_id.clone(), *b));
                }
            }
        }
        drop(listening);

        let mut fired: HashSet<(String, BehaviorId)> = HashSet::new();
        for (a_id, a, b_id, b) in overlapping {
            if !self.is_running() {
                return;
            }
            let key = GameEvent::ordered_pair(&a_id, &b_id);
            if !self.touching_pairs.insert(key.clone()) {
                continue;
            }
            if !self.previous_pairs.contains(&key) {
                self.events.push(GameEvent::touching_started(&a_id, &b_id));
            }
            self.deliver_pair_side(&a_id, a, b, &mut fired);
            self.deliver_pair_side(&b_id, b, a, &mut fired);
        }

        for (id, entity) in listeners {
            let world_targets = self.behaviors_for(&id, |trigger| {
                matches!(trigger, Trigger::Touching(target) if !target.is_entity_like())
            });
            for behavior in world_targets {
                let Trigger::Touching(target) = &behavior.trigger else {
                    continue;
                };
                if !self.is_running() || !self.entity_live(&id) {
                    break;
                }
                let pointer = self.input.pointer();
                if self.stage.is_touching(entity, target, pointer) && fired.insert((id.clone(), behavior.id)) {
                    self.launch(&id, &behavior);
                }
            }
        }
        self.previous_pairs = self.touching_pairs.clone();
    }

    fn deliver_pair_side(
        &mut self,
        viewer_id: &str,
        viewer: Entity,
        other: Entity,
        fired: &mut HashSet<(String, BehaviorId)>,
    ) {
        let behaviors = self.behaviors_for(viewer_id, |trigger| {
            matches!(trigger, Trigger::Touching(target) if target.is_entity_like())
        });
        for behavior in behaviors {
            let Trigger::Touching(target) = &behavior.trigger else {
                continue;
            };
            if !self.entity_live(viewer_id) || !self.stage.matches_target(viewer, other, target) {
                continue;
            }
            if fired.insert((viewer_id.to_string(), behavior.id)) {
                self.launch(viewer_id, &behavior);
            }
        }
    }

    /// Delivers a snapshot of the inbox, first message first.
    pub(crate) fn deliver_messages(&mut self, inbox: Vec<String>) {
        for message in inbox {
            let mut handlers = 0;
            for (id, _) in self.dispatch_targets(EventMask::MESSAGE) {
                let matching = self.behaviors_for(&id, |trigger| {
                    matches!(trigger, Trigger::Message(name) if name == &message)
                });
                for behavior in matching {
                    if !self.is_running() {
                        return;
                    }
                    if self.entity_live(&id) && self.launch(&id, &behavior) {
                        handlers += 1;
                    }
                }
            }
            self.events.push(GameEvent::MessageDelivered { message, handlers });
        }
    }

    /// Queues `message` for delivery on the next tick.
    pub fn broadcast(&mut self, message: &str) {
        let message = message.trim();
        if message.is_empty() {
            return;
        }
        self.inbox.push(message.to_string());
        self.push_log(crate::runtime_log::LogKind::Event, format!("broadcast {message}"));
    }

    /// Presses a key and triggers matching key behaviors right away while running.
    /// Returns false for unrecognised key names.
    pub fn key_down(&mut self, raw: &str) -> bool {
        let Some(key) = KeyCode::parse(raw) else {
            return false;
        };
        self.input.press(key.clone());
        if !self.is_running() {
            return true;
        }
        for (id, _) in self.dispatch_targets(EventMask::KEY) {
            let matching = self.behaviors_for(&id, |trigger| {
                matches!(trigger, Trigger::KeyDown(wanted) if wanted.accepts(&key))
            });
            for behavior in matching {
                if self.entity_live(&id) {
                    self.launch(&id, &behavior);
                }
            }
        }
        true
    }

    pub fn key_up(&mut self, raw: &str) -> bool {
        match KeyCode::parse(raw) {
            Some(key) => {
                self.input.release(&key);
                true
            }
            None => false,
        }
    }

    /// Pointer position in engine space (canvas pixels from the top-left).
    pub fn pointer_moved(&mut self, position: Vec2) {
        self.input.set_pointer(position);
    }

    /// Presses the pointer at an engine-space position. The topmost entity under
    /// it receives click behaviors; its id is returned.
    pub fn pointer_down(&mut self, position: Vec2) -> Option<String> {
        self.input.set_pointer(position);
        self.input.set_pointer_pressed(true);
        if !self.is_running() {
            return None;
        }
        let mut hit: Option<(i32, String)> = None;
        for entity in self.stage.entities_in_order() {
            if !self.stage.is_sensable(entity) || !self.stage.hit_test(entity, position) {
                continue;
            }
            let depth = self.stage.appearance(entity).map(|appearance| appearance.depth).unwrap_or_default();
            if hit.as_ref().map_or(true, |(best, _)| depth >= *best) {
                if let Some(id) = self.stage.id_of(entity) {
                    hit = Some((depth, id.to_string()));
                }
            }
        }
        let (_, id) = hit?;
        for behavior in self.behaviors_for(&id, |trigger| *trigger == Trigger::Click) {
            if self.entity_live(&id) {
                self.launch(&id, &behavior);
            }
        }
        Some(id)
    }

    pub fn pointer_up(&mut self) {
        self.input.set_pointer_pressed(false);
    }

    pub(crate) fn sense_touching(&self, id: &str, target: &SensingTarget) -> bool {
        self.stage.entity(id).is_some_and(|entity| self.stage.is_touching(entity, target, self.input.pointer()))
    }
}
