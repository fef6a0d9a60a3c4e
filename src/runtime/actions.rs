//! Entity-level operations used by compiled blocks. Every call names its entity by
//! id; unknown ids are no-ops that report failure.

use super::Runtime;
use crate::blocks::{SensingTarget, POINTER_TOKEN, MOUSE_TOKEN};
use crate::compiler::Glide;
use crate::input::KeyCode;
use crate::runtime_log::LogKind;
use crate::stage::CanvasSpace;
use crate::value::Value;
use bevy_ecs::prelude::Entity;
use glam::Vec2;
use rand::Rng;

impl Runtime {
    fn entity_of(&self, id: &str) -> Option<Entity> {
        self.stage.entity(id)
    }

    // ---------- motion ----------

    pub(crate) fn place_user(&mut self, id: &str, position: Vec2) -> bool {
        match self.entity_of(id) {
            Some(entity) => self.stage.set_user_position(entity, position),
            None => false,
        }
    }

    /// Moves along the current direction; direction 0 faces right, 90 faces up.
    pub fn move_steps(&mut self, id: &str, steps: f32) -> bool {
        let (Some(position), Some(direction)) = (self.entity_position(id), self.entity_direction(id)) else {
            return false;
        };
        let heading = Vec2::from_angle(direction.to_radians());
        self.place_user(id, position + heading * steps)
    }

    pub fn turn(&mut self, id: &str, degrees: f32) -> bool {
        match self.entity_direction(id) {
            Some(direction) => self.point_in_direction(id, direction + degrees),
            None => false,
        }
    }

    pub fn point_in_direction(&mut self, id: &str, degrees: f32) -> bool {
        match self.entity_of(id) {
            Some(entity) => self.stage.set_user_rotation(entity, degrees),
            None => false,
        }
    }

    /// Moves to absolute user coordinates; `None` keeps that axis.
    pub fn go_to(&mut self, id: &str, x: Option<f32>, y: Option<f32>) -> bool {
        let Some(current) = self.entity_position(id) else {
            return false;
        };
        self.place_user(id, Vec2::new(x.unwrap_or(current.x), y.unwrap_or(current.y)))
    }

    pub fn change_position(&mut self, id: &str, offset: Vec2) -> bool {
        match self.entity_position(id) {
            Some(current) => self.place_user(id, current + offset),
            None => false,
        }
    }

    /// Target position for go-to and point-towards: another entity or the pointer.
    fn target_position(&self, target: &str) -> Option<Vec2> {
        match target.trim() {
            POINTER_TOKEN | MOUSE_TOKEN => Some(self.pointer_position()),
            other => self.entity_position(other),
        }
    }

    pub fn point_towards(&mut self, id: &str, target: &str) -> bool {
        let (Some(origin), Some(goal)) = (self.entity_position(id), self.target_position(target)) else {
            return false;
        };
        let delta = goal - origin;
        if delta.length_squared() <= f32::EPSILON {
            return true;
        }
        self.point_in_direction(id, delta.y.atan2(delta.x).to_degrees())
    }

    pub fn go_to_target(&mut self, id: &str, target: &str) -> bool {
        match self.target_position(target) {
            Some(goal) => self.place_user(id, goal),
            None => false,
        }
    }

    /// Starts a glide. Non-positive durations jump straight to the target and
    /// return `None`.
    pub fn begin_glide(&mut self, id: &str, seconds: f64, target: Vec2) -> Option<Glide> {
        let from = self.entity_position(id)?;
        if seconds <= 0.0 {
            self.place_user(id, target);
            return None;
        }
        Some(Glide { from, to: target, start: self.now(), duration: seconds })
    }

    // ---------- physics ----------

    pub fn enable_physics(&mut self, id: &str) -> bool {
        let Some(entity) = self.entity_of(id) else {
            return false;
        };
        let config = self.stage.body_config(entity).unwrap_or_default();
        let enabled = self.stage.enable_physics(entity, &config);
        if enabled {
            self.push_log(LogKind::Action, format!("{id} physics enabled"));
        }
        enabled
    }

    pub fn set_velocity(&mut self, id: &str, velocity: Vec2) -> bool {
        self.entity_of(id).is_some_and(|entity| self.stage.set_user_velocity(entity, velocity))
    }

    pub fn set_gravity_scale(&mut self, id: &str, scale: f32) -> bool {
        self.entity_of(id).is_some_and(|entity| self.stage.set_gravity_scale(entity, scale))
    }

    // ---------- looks ----------

    pub fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        self.entity_of(id).is_some_and(|entity| self.stage.set_visible(entity, visible))
    }

    pub fn switch_costume(&mut self, id: &str, key: &str) -> bool {
        let Some(entity) = self.entity_of(id) else {
            return false;
        };
        let switched = self.stage.switch_costume(entity, key);
        if switched {
            self.note_body_resize(id, entity);
        }
        switched
    }

    pub fn next_costume(&mut self, id: &str) -> bool {
        let Some(entity) = self.entity_of(id) else {
            return false;
        };
        let switched = self.stage.next_costume(entity);
        if switched {
            self.note_body_resize(id, entity);
        }
        switched
    }

    fn note_body_resize(&self, id: &str, entity: Entity) {
        if self.stage.has_body(entity) {
            self.push_log(LogKind::Info, format!("{id} changed costume; its physics body keeps the previous size"));
        }
    }

    /// Uniform scale factor (1 = costume size).
    pub fn set_scale(&mut self, id: &str, scale: f32) -> bool {
        let scale = scale.max(0.0);
        self.entity_of(id).is_some_and(|entity| self.stage.set_scale(entity, Vec2::splat(scale)))
    }

    pub fn change_scale(&mut self, id: &str, delta: f32) -> bool {
        match self.entity_scale(id) {
            Some(current) => self.set_scale(id, current + delta),
            None => false,
        }
    }

    pub fn set_depth(&mut self, id: &str, depth: i32) -> bool {
        self.entity_of(id).is_some_and(|entity| self.stage.set_depth(entity, depth))
    }

    // ---------- sound ----------

    /// Starts a sound by id or name and returns its playback handle.
    pub fn play_sound(&mut self, id: &str, key: &str) -> Option<u64> {
        let sound = self
            .sounds
            .get(key)
            .or_else(|| self.sounds.values().find(|sound| sound.name.eq_ignore_ascii_case(key)))?
            .clone();
        let now = self.now();
        let (handle, _) = self.audio.play(id, &sound, now);
        self.push_log(LogKind::Action, format!("{id} played sound {}", sound.id));
        Some(handle)
    }

    pub fn stop_all_sounds(&mut self) {
        self.audio.stop_all();
    }

    // ---------- control ----------

    pub fn request_scene_switch(&mut self, scene: &str) {
        self.pending_scene = Some(scene.to_string());
        self.events.push(crate::events::GameEvent::SceneSwitchRequested { scene: scene.to_string() });
        self.push_log(LogKind::Event, format!("scene switch to {scene} requested"));
    }

    pub fn reset_timer(&mut self) {
        self.clock.reset_timer();
    }

    pub(crate) fn log_user(&self, id: &str, message: &str) {
        self.push_log(LogKind::User, format!("{id}: {message}"));
    }

    // ---------- variables ----------

    pub fn variable(&self, id: &str, key: &str) -> Value {
        self.variables.get(id, key)
    }

    pub fn set_variable(&mut self, id: &str, key: &str, value: &Value) -> bool {
        self.variables.set(id, key, value)
    }

    pub fn change_variable(&mut self, id: &str, key: &str, delta: f64) -> bool {
        self.variables.change_by(id, key, delta)
    }

    // ---------- queries ----------

    pub fn entity_position(&self, id: &str) -> Option<Vec2> {
        self.stage.user_position(self.entity_of(id)?)
    }

    pub fn entity_direction(&self, id: &str) -> Option<f32> {
        self.stage.user_rotation(self.entity_of(id)?)
    }

    pub fn entity_costume(&self, id: &str) -> Option<usize> {
        self.stage.appearance(self.entity_of(id)?).map(|appearance| appearance.current)
    }

    pub fn entity_scale(&self, id: &str) -> Option<f32> {
        self.stage.scale(self.entity_of(id)?).map(|scale| scale.x)
    }

    pub fn is_on_ground(&self, id: &str) -> bool {
        self.entity_of(id).is_some_and(|entity| self.stage.on_ground(entity))
    }

    pub fn is_clone(&self, id: &str) -> bool {
        self.entity_of(id).is_some_and(|entity| self.stage.is_clone(entity))
    }

    pub(crate) fn sense_distance(&self, id: &str, target: &SensingTarget) -> Option<f32> {
        self.stage.distance_to(self.entity_of(id)?, target, self.input.pointer())
    }

    /// First overlapping entity in registration order, optionally filtered.
    pub(crate) fn touching_object(&self, id: &str, filter: Option<&SensingTarget>) -> Option<String> {
        let entity = self.entity_of(id)?;
        let first = self.stage.all_touching(entity, filter).into_iter().next()?;
        self.stage.id_of(first).map(str::to_string)
    }

    pub fn is_key_held(&self, key: &KeyCode) -> bool {
        self.input.is_held(key)
    }

    /// Pointer position in user space.
    pub fn pointer_position(&self) -> Vec2 {
        self.stage.canvas().engine_to_user(self.input.pointer())
    }

    pub fn is_pointer_pressed(&self) -> bool {
        self.input.pointer_pressed()
    }

    pub fn timer(&self) -> f64 {
        self.clock.timer()
    }

    /// Uniform draw between the bounds in either order; whole numbers only when
    /// `integral`.
    pub(crate) fn random_between(&mut self, a: f64, b: f64, integral: bool) -> f64 {
        if !a.is_finite() || !b.is_finite() {
            return 0.0;
        }
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        if integral {
            let (low, high) = (low.ceil() as i64, high.floor() as i64);
            if low >= high {
                return low as f64;
            }
            self.rng.gen_range(low..=high) as f64
        } else if high - low <= f64::EPSILON {
            low
        } else if (high - low).is_finite() {
            self.rng.gen_range(low..high)
        } else {
            // The span overflows f64; interpolate so every term stays finite.
            let t: f64 = self.rng.gen();
            low * (1.0 - t) + high * t
        }
    }

    pub fn user_to_engine(&self, point: Vec2) -> Vec2 {
        self.stage.canvas().user_to_engine(point)
    }

    pub fn engine_to_user(&self, point: Vec2) -> Vec2 {
        self.stage.canvas().engine_to_user(point)
    }

    pub fn user_velocity(&self, id: &str) -> Option<Vec2> {
        self.stage.user_velocity(self.entity_of(id)?)
    }

    pub fn canvas(&self) -> CanvasSpace {
        self.stage.canvas()
    }
}
