//! Turns block programs into behaviors: one per top-level hat block.
//!
//! Statement bodies become [`Stmt`] lists executed by the runtime's task scheduler;
//! value slots become [`Expr`] closures evaluated at the point of use. Nothing here
//! touches live state: every reference is kept as the id found in the block's fields.

mod expr;
mod stmt;

use crate::blocks::{BlockKind, BlockNode, BlockProgram, SensingTarget};
use crate::input::KeyCode;
use crate::runtime::Runtime;
use crate::value::Value;
use anyhow::Result;
use bitflags::bitflags;
use glam::Vec2;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statement slot holding a hat's (or control block's) body.
pub const BODY_SLOT: &str = "DO";
pub const ELSE_SLOT: &str = "ELSE";

/// Evaluation context of a running behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    pub entity: String,
    pub behavior: BehaviorId,
}

pub type Expr = Rc<dyn Fn(&mut Runtime, &ExecContext) -> Value>;
pub type Action = Rc<dyn Fn(&mut Runtime, &ExecContext) -> Result<Flow>>;
pub type Body = Rc<[Stmt]>;

#[derive(Clone)]
pub enum Stmt {
    Action(Action),
    If { condition: Expr, then: Body, otherwise: Option<Body> },
    Repeat { times: Expr, body: Body },
    RepeatUntil { condition: Expr, body: Body },
    WaitUntil(Expr),
    ForEach { variable: String, count: Expr, body: Body },
}

impl fmt::Debug for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Action(_) => f.write_str("Action"),
            Stmt::If { then, otherwise, .. } => {
                write!(f, "If(then: {}, else: {:?})", then.len(), otherwise.as_ref().map(|b| b.len()))
            }
            Stmt::Repeat { body, .. } => write!(f, "Repeat({})", body.len()),
            Stmt::RepeatUntil { body, .. } => write!(f, "RepeatUntil({})", body.len()),
            Stmt::WaitUntil(_) => f.write_str("WaitUntil"),
            Stmt::ForEach { variable, body, .. } => write!(f, "ForEach({variable}, {})", body.len()),
        }
    }
}

/// What an action asks of the scheduler.
pub enum Flow {
    Continue,
    Suspend(Suspension),
    /// End the running task.
    Stop,
}

/// Why a task is parked and what lets it resume.
#[derive(Clone)]
pub enum Suspension {
    NextTick,
    /// Simulation time in seconds.
    Until(f64),
    Condition(Expr),
    Glide(Glide),
    /// Sound playback handle; resumes when the playback ends or is completed by the host.
    Sound(u64),
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspension::NextTick => f.write_str("NextTick"),
            Suspension::Until(time) => write!(f, "Until({time:.3})"),
            Suspension::Condition(_) => f.write_str("Condition"),
            Suspension::Glide(glide) => write!(f, "{glide:?}"),
            Suspension::Sound(handle) => write!(f, "Sound({handle})"),
        }
    }
}

/// Tween from `from` to `to` in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glide {
    pub from: Vec2,
    pub to: Vec2,
    pub start: f64,
    pub duration: f64,
}

impl Glide {
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            ((now - self.start) / self.duration).clamp(0.0, 1.0) as f32
        }
    }

    pub fn position(&self, now: f64) -> Vec2 {
        self.from.lerp(self.to, self.progress(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BehaviorId(u64);

impl BehaviorId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BehaviorId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Start,
    CloneStart,
    KeyDown(KeyCode),
    Click,
    Touching(SensingTarget),
    Message(String),
    Forever,
}

impl Trigger {
    pub fn mask(&self) -> EventMask {
        match self {
            Trigger::Start => EventMask::START,
            Trigger::CloneStart => EventMask::CLONE_START,
            Trigger::KeyDown(_) => EventMask::KEY,
            Trigger::Click => EventMask::CLICK,
            Trigger::Touching(_) => EventMask::TOUCHING,
            Trigger::Message(_) => EventMask::MESSAGE,
            Trigger::Forever => EventMask::FOREVER,
        }
    }
}

bitflags! {
    /// Event kinds a program needs the dispatcher to deliver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u8 {
        const START = 1 << 0;
        const CLONE_START = 1 << 1;
        const KEY = 1 << 2;
        const CLICK = 1 << 3;
        const TOUCHING = 1 << 4;
        const MESSAGE = 1 << 5;
        const FOREVER = 1 << 6;
    }
}

pub struct Behavior {
    pub id: BehaviorId,
    pub trigger: Trigger,
    pub body: Body,
}

impl Behavior {
    pub fn new(trigger: Trigger, body: Body) -> Self {
        Self { id: BehaviorId::next(), trigger, body }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("statements", &self.body.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    /// Slash-separated location, e.g. `2/DO/0/TIMES`.
    pub path: String,
    pub block: String,
    pub message: String,
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.block, self.path, self.message)
    }
}

#[derive(Debug, Default)]
pub struct CompiledProgram {
    pub behaviors: Vec<Rc<Behavior>>,
    pub required: EventMask,
    pub diagnostics: Vec<CompileDiagnostic>,
}

impl CompiledProgram {
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

pub fn compile_program(program: &BlockProgram) -> CompiledProgram {
    let mut compiler = Compiler::default();
    let mut compiled = CompiledProgram::default();
    for (index, node) in program.blocks.iter().enumerate() {
        let path = index.to_string();
        let Some(kind) = BlockKind::parse(&node.kind) else {
            compiler.diagnose(&path, node, "unknown block type");
            continue;
        };
        if !kind.is_hat() {
            // Orphan stack: never executes.
            continue;
        }
        let Some(trigger) = compiler.trigger(kind, node, &path) else {
            continue;
        };
        let body = compiler.body(node.statement_body(BODY_SLOT), &format!("{path}/{BODY_SLOT}"));
        compiled.required |= trigger.mask();
        compiled.behaviors.push(Rc::new(Behavior::new(trigger, body)));
    }
    compiled.diagnostics = compiler.diagnostics;
    compiled
}

#[derive(Default)]
pub(crate) struct Compiler {
    diagnostics: Vec<CompileDiagnostic>,
}

impl Compiler {
    pub(crate) fn diagnose(&mut self, path: &str, node: &BlockNode, message: impl Into<String>) {
        self.diagnostics.push(CompileDiagnostic {
            path: path.to_string(),
            block: node.kind.clone(),
            message: message.into(),
        });
    }

    fn trigger(&mut self, kind: BlockKind, node: &BlockNode, path: &str) -> Option<Trigger> {
        let trigger = match kind {
            BlockKind::WhenGameStarts => Trigger::Start,
            BlockKind::WhenCloneStarts => Trigger::CloneStart,
            BlockKind::WhenClicked => Trigger::Click,
            BlockKind::EveryFrame => Trigger::Forever,
            BlockKind::WhenKeyPressed => {
                let raw = node.field_text("KEY").unwrap_or_default();
                match KeyCode::parse(&raw) {
                    Some(key) => Trigger::KeyDown(key),
                    None => {
                        self.diagnose(path, node, format!("unknown key '{raw}'"));
                        return None;
                    }
                }
            }
            BlockKind::WhenTouching => {
                let raw = node.field_text("TARGET").unwrap_or_default();
                match SensingTarget::parse(&raw) {
                    Some(target) => Trigger::Touching(target),
                    None => {
                        self.diagnose(path, node, "touch hat has no target");
                        return None;
                    }
                }
            }
            BlockKind::WhenMessageReceived => {
                let message = node.field_text("MESSAGE").unwrap_or_default();
                if message.trim().is_empty() {
                    self.diagnose(path, node, "message hat has no message name");
                    return None;
                }
                Trigger::Message(message.trim().to_string())
            }
            _ => return None,
        };
        Some(trigger)
    }
}
