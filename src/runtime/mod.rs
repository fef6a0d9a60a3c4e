//! The game loop: owns the stage, variables and behavior catalogs of one play
//! session and schedules compiled behaviors frame by frame.

mod actions;
mod catalog;
mod clones;
mod dispatch;
mod task;

pub use catalog::*;
pub use clones::CLONE_SEPARATOR;

use crate::audio::{AudioManager, PlaybackRequest};
use crate::compiler::{compile_program, CompiledProgram, Trigger};
use crate::config::RuntimeConfig;
use crate::events::{EventBus, GameEvent};
use crate::input::InputState;
use crate::runtime_log::{debug, LogEntry, LogKind, RuntimeLog};
use crate::scene::{CostumeDefinition, EntityDescription, SceneDescription, SoundDefinition};
use crate::stage::{CollisionEventKind, EntitySnapshot, EntitySpawn, PhaseTiming, Stage};
use crate::time::SimClock;
use crate::variables::{VariableDefinition, VariableStore};
use anyhow::{bail, Context, Result};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};
use task::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

pub struct Runtime {
    config: RuntimeConfig,
    state: RunState,
    stage: Stage,
    variables: VariableStore,
    costumes: HashMap<String, CostumeDefinition>,
    sounds: HashMap<String, SoundDefinition>,
    catalogs: HashMap<String, BehaviorCatalog>,
    templates: HashMap<String, Rc<Template>>,
    scheduler: Scheduler,
    forevers_active: bool,
    inbox: Vec<String>,
    touching_pairs: HashSet<(String, String)>,
    previous_pairs: HashSet<(String, String)>,
    input: InputState,
    audio: AudioManager,
    log: RuntimeLog,
    events: EventBus,
    clock: SimClock,
    rng: StdRng,
    pending_scene: Option<String>,
    clone_serial: u64,
    clone_depth: u32,
    pending_clone_starts: VecDeque<String>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            stage: Stage::new(&config),
            log: RuntimeLog::new(config.log_capacity),
            audio: AudioManager::new(config.audio_history),
            config,
            state: RunState::Idle,
            variables: VariableStore::new(),
            costumes: HashMap::new(),
            sounds: HashMap::new(),
            catalogs: HashMap::new(),
            templates: HashMap::new(),
            scheduler: Scheduler::default(),
            forevers_active: false,
            inbox: Vec::new(),
            touching_pairs: HashSet::new(),
            previous_pairs: HashSet::new(),
            input: InputState::new(),
            events: EventBus::default(),
            clock: SimClock::new(),
            rng,
            pending_scene: None,
            clone_serial: 0,
            clone_depth: 0,
            pending_clone_starts: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn catalog(&self, id: &str) -> Option<&BehaviorCatalog> {
        self.catalogs.get(id)
    }

    // ---------- log & outputs ----------

    pub fn now(&self) -> f64 {
        self.clock.elapsed_seconds()
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub(crate) fn push_log(&self, kind: LogKind, message: impl Into<String>) {
        self.log.push(self.now(), kind, message);
    }

    pub(crate) fn log_error(&self, message: impl Into<String>) {
        self.push_log(LogKind::Error, message);
    }

    pub fn log(&self) -> &RuntimeLog {
        &self.log
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    pub fn audio(&self) -> &AudioManager {
        &self.audio
    }

    pub fn take_playback_requests(&mut self) -> Vec<PlaybackRequest> {
        self.audio.take_requests()
    }

    /// Host notification that a sound finished; wakes play-until-done waits.
    pub fn complete_signal(&mut self, handle: u64) -> bool {
        self.audio.complete(handle)
    }

    pub fn pending_scene_switch(&self) -> Option<&str> {
        self.pending_scene.as_deref()
    }

    pub fn take_pending_scene_switch(&mut self) -> Option<String> {
        self.pending_scene.take()
    }

    pub fn entity_snapshot(&self, id: &str) -> Option<EntitySnapshot> {
        self.stage.snapshot(self.stage.entity(id)?)
    }

    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.stage.entities_in_order().filter_map(|entity| self.stage.snapshot(entity)).collect()
    }

    pub fn phase_timings(&self) -> Vec<PhaseTiming> {
        self.stage.phase_timings()
    }

    pub fn active_task_count(&self) -> usize {
        self.scheduler.waiting_count()
    }

    pub fn set_canvas_size(&mut self, width: f32, height: f32) -> bool {
        self.stage.set_canvas_size(width, height)
    }

    // ---------- catalogs & registration ----------

    pub fn define_variables(&mut self, definitions: impl IntoIterator<Item = VariableDefinition>) {
        self.variables.define_all(definitions);
    }

    pub fn add_costumes(&mut self, costumes: impl IntoIterator<Item = CostumeDefinition>) {
        for costume in costumes {
            self.costumes.insert(costume.id.clone(), costume);
        }
    }

    pub fn add_sounds(&mut self, sounds: impl IntoIterator<Item = SoundDefinition>) {
        for sound in sounds {
            self.sounds.insert(sound.id.clone(), sound);
        }
    }

    /// Creates a live entity with an empty catalog and an empty local variable map.
    pub fn register_entity(&mut self, spawn: EntitySpawn) -> Result<()> {
        self.stage.spawn(&spawn)?;
        self.catalogs.insert(spawn.id.clone(), BehaviorCatalog::new());
        self.variables.register_entity(&spawn.id);
        self.events.push(GameEvent::EntityRegistered { id: spawn.id.clone() });
        Ok(())
    }

    /// Adds compiled behaviors to an entity's catalog and logs compile diagnostics.
    pub fn register_behaviors(&mut self, id: &str, compiled: &CompiledProgram) -> Result<usize> {
        for diagnostic in &compiled.diagnostics {
            self.log_error(format!("{id}: {diagnostic}"));
        }
        let Some(catalog) = self.catalogs.get_mut(id) else {
            bail!("cannot register behaviors: no entity '{id}'");
        };
        Ok(compiled.behaviors.iter().filter(|behavior| catalog.register(Rc::clone(behavior))).count())
    }

    /// Registers one scene object: entity, compiled program and template.
    pub fn load_entity(&mut self, description: &EntityDescription) -> Result<()> {
        let mut costumes = Vec::with_capacity(description.costumes.len());
        for costume_id in &description.costumes {
            match self.costumes.get(costume_id) {
                Some(costume) => costumes.push(costume.clone()),
                None => self.log_error(format!("{}: unknown costume '{costume_id}'", description.id)),
            }
        }
        let mut spawn = EntitySpawn::new(description.id.clone())
            .at(description.x, description.y)
            .with_costumes(costumes);
        if let Some([width, height]) = description.size {
            spawn = spawn.with_size(width, height);
        }
        spawn.name = description.name.clone();
        spawn.rotation = description.rotation;
        spawn.scale = Vec2::splat(description.scale);
        spawn.visible = description.visible;
        spawn.depth = description.depth;
        spawn.costume = description.costume;
        spawn.component = description.component.clone();
        spawn.body = description.physics;
        self.register_entity(spawn).with_context(|| format!("registering entity '{}'", description.id))?;
        let compiled = compile_program(&description.program);
        self.register_behaviors(&description.id, &compiled)?;
        self.save_template(&description.id)
    }

    /// Replaces every entity and template with the scene's. Global variable values
    /// survive; locals go with their entities.
    pub fn load_scene(&mut self, scene: &SceneDescription) -> Result<()> {
        self.stop_all();
        self.clear_entities();
        self.pending_scene = None;
        self.define_variables(scene.variables.iter().cloned());
        self.add_costumes(scene.costumes.iter().cloned());
        self.add_sounds(scene.sounds.iter().cloned());
        for description in &scene.entities {
            self.load_entity(description)?;
        }
        self.push_log(LogKind::Info, format!("scene '{}' loaded with {} entities", scene.name, scene.entities.len()));
        Ok(())
    }

    fn clear_entities(&mut self) {
        self.stage.clear();
        self.catalogs.clear();
        self.templates.clear();
        self.variables.clear_entities();
        self.touching_pairs.clear();
        self.previous_pairs.clear();
        self.pending_clone_starts.clear();
        self.clone_serial = 0;
    }

    // ---------- lifecycle ----------

    /// Idle -> Running: runs start behaviors entity by entity, then snapshots
    /// templates and activates forevers once they have all finished.
    pub fn start(&mut self) {
        if self.is_running() {
            self.push_log(LogKind::Info, "start ignored: already running");
            return;
        }
        self.state = RunState::Running;
        self.stage.clear_stopped();
        self.forevers_active = false;
        self.clock.reset_timer();
        debug::set_current(&self.log);
        let mut queue = VecDeque::new();
        for id in self.stage.ids() {
            if let Some(catalog) = self.catalogs.get(id) {
                for behavior in catalog.matching(|trigger| *trigger == Trigger::Start) {
                    queue.push_back((id.clone(), behavior));
                }
            }
        }
        self.push_log(LogKind::Info, format!("started with {} start scripts", queue.len()));
        self.scheduler.begin_start_phase(queue);
        self.advance_start_phase();
    }

    /// Refreshes each original's template with its catalog as it stands after the
    /// start phase, then turns forevers on.
    pub(crate) fn finish_start_phase(&mut self) {
        let originals: Vec<String> = self
            .stage
            .ids()
            .iter()
            .filter(|id| self.stage.entity(id).is_some_and(|entity| !self.stage.is_clone(entity)))
            .cloned()
            .collect();
        for id in originals {
            let (Some(template), Some(catalog)) = (self.templates.get(&id), self.catalogs.get(&id)) else {
                continue;
            };
            let refreshed = Template { spawn: template.spawn.clone(), catalog: catalog.clone() };
            self.templates.insert(id, Rc::new(refreshed));
        }
        self.forevers_active = true;
        self.push_log(LogKind::Info, "start phase complete");
    }

    pub fn update(&mut self) {
        self.update_with_delta(self.config.frame_dt);
    }

    /// One frame: physics and clock, pending start work, parked tasks, forevers,
    /// touching, then the messages that were queued before this frame began.
    pub fn update_with_delta(&mut self, dt: f32) {
        if !self.is_running() {
            return;
        }
        let dt = dt.max(0.0);
        let inbox = std::mem::take(&mut self.inbox);
        self.clock.tick(Duration::from_secs_f32(dt));

        let started = Instant::now();
        let physics = self.stage.step(dt);
        for (entity, grounded) in physics.ground {
            if let Some(id) = self.stage.id_of(entity) {
                self.events.push(GameEvent::GroundContact { id: id.to_string(), grounded });
            }
        }
        for (kind, first, second) in physics.contacts {
            if let (Some(a), Some(b)) = (self.stage.id_of(first), self.stage.id_of(second)) {
                let event = GameEvent::body_contact(a, b, kind == CollisionEventKind::Started);
                self.events.push(event);
            }
        }
        self.audio.prune(self.now());
        self.record_phase("physics", started);

        let started = Instant::now();
        self.advance_start_phase();
        self.resume_tasks();
        self.record_phase("tasks", started);

        let started = Instant::now();
        self.run_forevers();
        self.record_phase("forever", started);

        let started = Instant::now();
        if self.is_running() {
            self.deliver_touching();
        }
        self.record_phase("touching", started);

        let started = Instant::now();
        if self.is_running() {
            self.deliver_messages(inbox);
        }
        self.record_phase("messages", started);
    }

    fn record_phase(&mut self, name: &'static str, started: Instant) {
        self.stage.profiler_mut().record(name, started.elapsed());
    }

    /// Running -> Idle: every entity is marked stopped and parked tasks are dropped.
    pub fn stop_all(&mut self) {
        if !self.is_running() {
            return;
        }
        self.state = RunState::Idle;
        let entities: Vec<_> = self.stage.entities_in_order().collect();
        for entity in entities {
            self.stage.set_stopped(entity, true);
        }
        self.scheduler.clear();
        self.forevers_active = false;
        self.inbox.clear();
        self.pending_clone_starts.clear();
        self.audio.stop_all();
        self.events.push(GameEvent::Stopped);
        self.push_log(LogKind::Info, "stopped");
    }

    /// Stops one entity; its parked tasks exit when they next resume.
    pub fn stop_entity(&mut self, id: &str) -> bool {
        let Some(entity) = self.stage.entity(id) else {
            return false;
        };
        self.stage.set_stopped(entity, true);
        self.push_log(LogKind::Action, format!("{id} stopped"));
        true
    }

    /// Ends the session: stops everything, removes every entity and template and
    /// resets variables, input, audio and the clock.
    pub fn cleanup(&mut self) {
        self.stop_all();
        self.clear_entities();
        self.variables.reset_values();
        self.input.clear();
        self.audio.clear();
        self.events.clear();
        self.clock.reset();
        self.pending_scene = None;
        debug::clear_current(&self.log);
        self.stage.profiler_mut().reset();
    }
}
