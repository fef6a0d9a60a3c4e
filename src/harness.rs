//! Headless fixture runner: loads a scene, feeds scripted input frame by frame and
//! records what the runtime logged. Used by the `block_harness` binary and tests.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::runtime::Runtime;
use crate::runtime_log::LogKind;
use crate::scene::SceneDescription;
use crate::stage::EntitySnapshot;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessFixture {
    /// Inline scene; takes precedence over `scene_path`.
    #[serde(default)]
    pub scene: Option<SceneDescription>,
    /// Scene file, relative to the fixture file when loaded through [`load_fixture`].
    #[serde(default)]
    pub scene_path: Option<PathBuf>,
    /// Scenes reachable through `switch_scene`, by name.
    #[serde(default)]
    pub scenes: BTreeMap<String, SceneDescription>,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub config: Option<RuntimeConfig>,
    #[serde(default)]
    pub inputs: Vec<ScriptedInput>,
}

/// Input applied right before step `step` runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptedInput {
    pub step: usize,
    #[serde(flatten)]
    pub action: InputAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputAction {
    KeyDown { key: String },
    KeyUp { key: String },
    /// Engine-space coordinates: canvas pixels from the top-left corner.
    PointerMove { x: f32, y: f32 },
    PointerDown { x: f32, y: f32 },
    PointerUp,
    Broadcast { message: String },
    CompleteSound { handle: u64 },
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessOutput {
    pub scene: String,
    pub steps: usize,
    pub dt: f32,
    pub startup: Vec<String>,
    pub results: Vec<StepResult>,
    pub final_entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step: usize,
    pub logs: Vec<String>,
    /// Error-kind entries among `logs`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sounds: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicked: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_switch: Option<String>,
}

fn default_steps() -> usize {
    60
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

fn default_seed() -> u64 {
    1
}

fn is_zero(count: &usize) -> bool {
    *count == 0
}

impl HarnessFixture {
    pub fn with_scene(scene: SceneDescription, steps: usize) -> Self {
        Self {
            scene: Some(scene),
            scene_path: None,
            scenes: BTreeMap::new(),
            steps,
            dt: default_dt(),
            seed: default_seed(),
            config: None,
            inputs: Vec::new(),
        }
    }

    pub fn input(mut self, step: usize, action: InputAction) -> Self {
        self.inputs.push(ScriptedInput { step, action });
        self
    }

    fn initial_scene(&self) -> Result<SceneDescription> {
        if let Some(scene) = &self.scene {
            return Ok(scene.clone());
        }
        match &self.scene_path {
            Some(path) => SceneDescription::load_from_path(path),
            None => bail!("fixture needs either 'scene' or 'scene_path'"),
        }
    }
}

pub fn run_fixture(fixture: &HarnessFixture) -> Result<HarnessOutput> {
    let scene = fixture.initial_scene()?;
    let mut config = fixture.config.clone().unwrap_or_default();
    config.random_seed = Some(fixture.seed);
    config.frame_dt = fixture.dt;

    let mut runtime = Runtime::new(config);
    runtime.load_scene(&scene).with_context(|| format!("loading scene '{}'", scene.name))?;
    runtime.start();
    let (startup, _) = drain_logs(&runtime);
    runtime.drain_events();

    let mut results = Vec::with_capacity(fixture.steps);
    for step in 0..fixture.steps {
        let mut clicked = None;
        for scripted in fixture.inputs.iter().filter(|scripted| scripted.step == step) {
            if let Some(id) = apply_input(&mut runtime, &scripted.action) {
                clicked = Some(id);
            }
        }
        runtime.update_with_delta(fixture.dt);

        let scene_switch = runtime.take_pending_scene_switch();
        if let Some(name) = &scene_switch {
            let Some(next) = fixture.scenes.get(name) else {
                bail!("step {step}: scene '{name}' is not part of the fixture");
            };
            runtime.load_scene(next).with_context(|| format!("step {step}: switching to scene '{name}'"))?;
            runtime.start();
        }

        let sounds = runtime
            .take_playback_requests()
            .into_iter()
            .map(|request| format!("{} {} #{}", request.entity, request.sound, request.handle))
            .collect();
        let events = runtime.drain_events().iter().map(ToString::to_string).collect();
        let (logs, errors) = drain_logs(&runtime);
        results.push(StepResult { step, logs, errors, events, sounds, clicked, scene_switch });
    }

    Ok(HarnessOutput {
        scene: scene.name,
        steps: fixture.steps,
        dt: fixture.dt,
        startup,
        results,
        final_entities: runtime.snapshots(),
    })
}

fn apply_input(runtime: &mut Runtime, action: &InputAction) -> Option<String> {
    match action {
        InputAction::KeyDown { key } => {
            if !runtime.key_down(key) {
                log::warn!("[block-harness] unknown key '{key}'");
            }
        }
        InputAction::KeyUp { key } => {
            runtime.key_up(key);
        }
        InputAction::PointerMove { x, y } => runtime.pointer_moved(Vec2::new(*x, *y)),
        InputAction::PointerDown { x, y } => return runtime.pointer_down(Vec2::new(*x, *y)),
        InputAction::PointerUp => runtime.pointer_up(),
        InputAction::Broadcast { message } => runtime.broadcast(message),
        InputAction::CompleteSound { handle } => {
            runtime.complete_signal(*handle);
        }
        InputAction::Stop => runtime.stop_all(),
    }
    None
}

fn drain_logs(runtime: &Runtime) -> (Vec<String>, usize) {
    let entries = runtime.log().entries();
    runtime.log().clear();
    let errors = entries.iter().filter(|entry| entry.kind == LogKind::Error).count();
    (entries.iter().map(ToString::to_string).collect(), errors)
}

impl HarnessOutput {
    /// One line per step that logged, clicked, played or switched, then the final entities.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("scene '{}': {} steps at dt {:.4}", self.scene, self.steps, self.dt)];
        for result in &self.results {
            let mut parts = Vec::new();
            if !result.logs.is_empty() {
                parts.push(format!("{} logs ({} errors)", result.logs.len(), result.errors));
            }
            if !result.sounds.is_empty() {
                parts.push(format!("{} sounds", result.sounds.len()));
            }
            if let Some(id) = &result.clicked {
                parts.push(format!("clicked {id}"));
            }
            if let Some(name) = &result.scene_switch {
                parts.push(format!("switched to {name}"));
            }
            if !parts.is_empty() {
                lines.push(format!("step {:>4}: {}", result.step, parts.join(", ")));
            }
        }
        let total_errors: usize = self.results.iter().map(|result| result.errors).sum();
        lines.push(format!("{} entities live, {total_errors} errors", self.final_entities.len()));
        for snapshot in &self.final_entities {
            lines.push(format!(
                "  {} at ({:.1}, {:.1}) facing {:.1}{}",
                snapshot.id,
                snapshot.x,
                snapshot.y,
                snapshot.rotation,
                if snapshot.stopped { " [stopped]" } else { "" }
            ));
        }
        lines
    }

    /// Where `self` first departs from `expected`, if anywhere.
    pub fn first_difference(&self, expected: &HarnessOutput) -> Option<String> {
        if self.scene != expected.scene || self.steps != expected.steps || self.dt != expected.dt {
            return Some(format!(
                "header: expected scene '{}' x{} steps, got '{}' x{}",
                expected.scene, expected.steps, self.scene, self.steps
            ));
        }
        if self.startup != expected.startup {
            return Some(format!("startup log: expected {:?}, got {:?}", expected.startup, self.startup));
        }
        if let Some((actual, wanted)) =
            self.results.iter().zip(&expected.results).find(|(actual, wanted)| actual != wanted)
        {
            return Some(format!("step {}: expected {wanted:?}, got {actual:?}", wanted.step));
        }
        if self.final_entities != expected.final_entities {
            return Some(format!(
                "final entities: expected {:?}, got {:?}",
                expected.final_entities, self.final_entities
            ));
        }
        None
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating output directory '{}'", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("writing harness output to '{}'", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("serializing harness output")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening golden file '{}'", path.display()))?;
        serde_json::from_reader(file).context("parsing golden JSON")
    }
}

pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<HarnessFixture> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening fixture '{}'", path.display()))?;
    let mut fixture: HarnessFixture = serde_json::from_reader(file).with_context(|| "parsing fixture JSON")?;
    if let Some(scene_path) = fixture.scene_path.take() {
        let resolved = match path.parent() {
            Some(parent) if scene_path.is_relative() => parent.join(scene_path),
            _ => scene_path,
        };
        fixture.scene_path = Some(resolved);
    }
    Ok(fixture)
}
