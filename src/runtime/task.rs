use super::Runtime;
use crate::compiler::{Behavior, BehaviorId, Body, ExecContext, Expr, Flow, Stmt, Suspension};
use crate::value::Value;
use smallvec::SmallVec;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

/// Small slack so waits computed from accumulated f32 frame deltas do not slip a tick.
const TIME_EPSILON: f64 = 1e-6;

enum FrameKind {
    Sequence,
    Repeat { remaining: u64 },
    RepeatUntil { condition: Expr },
    ForEach { variable: String, index: u64, count: u64 },
}

struct Frame {
    body: Body,
    pc: usize,
    kind: FrameKind,
    /// Set when an iteration finished; the loop test runs when the task resumes.
    iteration_done: bool,
}

impl Frame {
    fn new(body: Body, kind: FrameKind) -> Self {
        Self { body, pc: 0, kind, iteration_done: false }
    }
}

/// One running instance of a behavior on one entity.
pub(crate) struct Task {
    pub(crate) entity: String,
    pub(crate) behavior: BehaviorId,
    frames: SmallVec<[Frame; 4]>,
    waiting: Option<Suspension>,
}

impl Task {
    pub(crate) fn new(entity: &str, behavior: &Behavior) -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame::new(Rc::clone(&behavior.body), FrameKind::Sequence));
        Self { entity: entity.to_string(), behavior: behavior.id, frames, waiting: None }
    }

    fn context(&self) -> ExecContext {
        ExecContext { entity: self.entity.clone(), behavior: self.behavior }
    }

    fn key(&self) -> (String, BehaviorId) {
        (self.entity.clone(), self.behavior)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskStatus {
    Finished,
    Suspended,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    waiting: Vec<Task>,
    /// Non-start instances currently parked; they are not triggered again until done.
    active: HashSet<(String, BehaviorId)>,
    start_queue: VecDeque<(String, Rc<Behavior>)>,
    start_task: Option<Task>,
    in_start_phase: bool,
}

impl Scheduler {
    pub(crate) fn clear(&mut self) {
        self.waiting.clear();
        self.active.clear();
        self.start_queue.clear();
        self.start_task = None;
        self.in_start_phase = false;
    }

    pub(crate) fn begin_start_phase(&mut self, queue: VecDeque<(String, Rc<Behavior>)>) {
        self.start_queue = queue;
        self.start_task = None;
        self.in_start_phase = true;
    }

    pub(crate) fn in_start_phase(&self) -> bool {
        self.in_start_phase
    }

    pub(crate) fn waiting_count(&self) -> usize {
        self.waiting.len() + usize::from(self.start_task.is_some())
    }

    pub(crate) fn is_active(&self, entity: &str, behavior: BehaviorId) -> bool {
        self.active.contains(&(entity.to_string(), behavior))
    }
}

impl Runtime {
    pub(crate) fn task_alive(&self, task: &Task) -> bool {
        self.is_running()
            && self.stage.entity(&task.entity).is_some_and(|entity| !self.stage.is_stopped(entity))
    }

    /// Runs `behavior` for `entity` now. Returns false when the runtime is idle or an
    /// earlier instance of the same behavior is still suspended.
    pub(crate) fn launch(&mut self, entity: &str, behavior: &Rc<Behavior>) -> bool {
        if !self.is_running() || self.scheduler.is_active(entity, behavior.id) {
            return false;
        }
        let mut task = Task::new(entity, behavior);
        self.scheduler.active.insert(task.key());
        match self.run_task(&mut task) {
            TaskStatus::Suspended => self.scheduler.waiting.push(task),
            TaskStatus::Finished => {
                self.scheduler.active.remove(&task.key());
            }
        }
        true
    }

    /// Executes statements until the task suspends or runs out of work.
    pub(crate) fn run_task(&mut self, task: &mut Task) -> TaskStatus {
        let ctx = task.context();
        loop {
            if !self.task_alive(task) {
                return TaskStatus::Finished;
            }
            let Some(frame) = task.frames.last_mut() else {
                return TaskStatus::Finished;
            };
            if frame.iteration_done {
                frame.iteration_done = false;
                let again = match &mut frame.kind {
                    FrameKind::Sequence => false,
                    FrameKind::Repeat { remaining } => {
                        *remaining = remaining.saturating_sub(1);
                        *remaining > 0
                    }
                    FrameKind::RepeatUntil { condition } => {
                        let condition = Rc::clone(condition);
                        !condition(self, &ctx).as_bool()
                    }
                    FrameKind::ForEach { variable, index, count } => {
                        *index += 1;
                        let next = *index <= *count;
                        if next {
                            self.variables.set(&ctx.entity, variable, &Value::Number(*index as f64));
                        }
                        next
                    }
                };
                if again {
                    frame.pc = 0;
                } else {
                    task.frames.pop();
                    continue;
                }
            }
            let Some(frame) = task.frames.last_mut() else {
                return TaskStatus::Finished;
            };
            if frame.pc >= frame.body.len() {
                if matches!(frame.kind, FrameKind::Sequence) {
                    task.frames.pop();
                    continue;
                }
                frame.iteration_done = true;
                task.waiting = Some(Suspension::NextTick);
                return TaskStatus::Suspended;
            }
            let statement = frame.body[frame.pc].clone();
            frame.pc += 1;
            match statement {
                Stmt::Action(action) => match action(self, &ctx) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Suspend(suspension)) => {
                        task.waiting = Some(suspension);
                        return TaskStatus::Suspended;
                    }
                    Ok(Flow::Stop) => return TaskStatus::Finished,
                    Err(err) => {
                        self.log_error(format!("{} aborted a script: {err:#}", ctx.entity));
                        return TaskStatus::Finished;
                    }
                },
                Stmt::If { condition, then, otherwise } => {
                    let branch = if condition(self, &ctx).as_bool() { Some(then) } else { otherwise };
                    if let Some(body) = branch.filter(|body| !body.is_empty()) {
                        task.frames.push(Frame::new(body, FrameKind::Sequence));
                    }
                }
                Stmt::Repeat { times, body } => {
                    let times = times(self, &ctx).as_number().round();
                    if times >= 1.0 {
                        task.frames.push(Frame::new(body, FrameKind::Repeat { remaining: times as u64 }));
                    }
                }
                Stmt::RepeatUntil { condition, body } => {
                    if !condition(self, &ctx).as_bool() {
                        task.frames.push(Frame::new(body, FrameKind::RepeatUntil { condition }));
                    }
                }
                Stmt::WaitUntil(condition) => {
                    if !condition(self, &ctx).as_bool() {
                        task.waiting = Some(Suspension::Condition(condition));
                        return TaskStatus::Suspended;
                    }
                }
                Stmt::ForEach { variable, count, body } => {
                    let count = count(self, &ctx).as_number().floor();
                    if count >= 1.0 {
                        self.variables.set(&ctx.entity, &variable, &Value::Number(1.0));
                        let kind = FrameKind::ForEach { variable, index: 1, count: count as u64 };
                        task.frames.push(Frame::new(body, kind));
                    }
                }
            }
        }
    }

    /// Checks (and advances, for glides) what the task waits on. Clears the
    /// suspension when it is satisfied.
    fn suspension_ready(&mut self, task: &mut Task) -> bool {
        let Some(waiting) = task.waiting.clone() else {
            return true;
        };
        let ready = match waiting {
            Suspension::NextTick => true,
            Suspension::Until(deadline) => self.now() + TIME_EPSILON >= deadline,
            Suspension::Condition(condition) => condition(self, &task.context()).as_bool(),
            Suspension::Glide(glide) => {
                let now = self.now();
                self.place_user(&task.entity, glide.position(now));
                glide.progress(now) >= 1.0
            }
            Suspension::Sound(handle) => !self.audio.is_playing(handle),
        };
        if ready {
            task.waiting = None;
        }
        ready
    }

    /// Resumes every parked task whose suspension is satisfied, in the order they
    /// were parked.
    pub(crate) fn resume_tasks(&mut self) {
        let parked = std::mem::take(&mut self.scheduler.waiting);
        let mut still_waiting = Vec::with_capacity(parked.len());
        for mut task in parked {
            if !self.task_alive(&task) {
                self.scheduler.active.remove(&task.key());
                continue;
            }
            if !self.suspension_ready(&mut task) {
                still_waiting.push(task);
                continue;
            }
            match self.run_task(&mut task) {
                TaskStatus::Suspended => still_waiting.push(task),
                TaskStatus::Finished => {
                    self.scheduler.active.remove(&task.key());
                }
            }
        }
        if !self.is_running() {
            return;
        }
        let launched = std::mem::replace(&mut self.scheduler.waiting, still_waiting);
        self.scheduler.waiting.extend(launched);
    }

    /// Runs queued start behaviors one at a time. A start behavior that suspends
    /// holds the phase until it completes on a later tick.
    pub(crate) fn advance_start_phase(&mut self) {
        if !self.scheduler.in_start_phase {
            return;
        }
        loop {
            if !self.is_running() {
                self.scheduler.clear();
                return;
            }
            let mut task = match self.scheduler.start_task.take() {
                Some(mut task) => {
                    if self.task_alive(&task) && !self.suspension_ready(&mut task) {
                        self.scheduler.start_task = Some(task);
                        return;
                    }
                    task
                }
                None => match self.scheduler.start_queue.pop_front() {
                    Some((entity, behavior)) => Task::new(&entity, &behavior),
                    None => break,
                },
            };
            if self.run_task(&mut task) == TaskStatus::Suspended {
                self.scheduler.start_task = Some(task);
                return;
            }
        }
        self.scheduler.in_start_phase = false;
        self.finish_start_phase();
    }
}
