use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    EntityRegistered { id: String },
    EntityDeleted { id: String },
    CloneSpawned { id: String, original: String },
    CloneRejected { original: String, live_clones: usize },
    TouchingStarted { a: String, b: String },
    GroundContact { id: String, grounded: bool },
    /// Two physics bodies started or stopped colliding; ids are ordered.
    BodyContact { a: String, b: String, started: bool },
    MessageDelivered { message: String, handlers: usize },
    SceneSwitchRequested { scene: String },
    Stopped,
}

impl GameEvent {
    pub(crate) fn ordered_pair(a: &str, b: &str) -> (String, String) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        (first.to_string(), second.to_string())
    }

    pub fn touching_started(a: &str, b: &str) -> Self {
        let (a, b) = Self::ordered_pair(a, b);
        GameEvent::TouchingStarted { a, b }
    }

    pub fn body_contact(a: &str, b: &str, started: bool) -> Self {
        let (a, b) = Self::ordered_pair(a, b);
        GameEvent::BodyContact { a, b, started }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::EntityRegistered { id } => write!(f, "EntityRegistered id={id}"),
            GameEvent::EntityDeleted { id } => write!(f, "EntityDeleted id={id}"),
            GameEvent::CloneSpawned { id, original } => write!(f, "CloneSpawned id={id} original={original}"),
            GameEvent::CloneRejected { original, live_clones } => {
                write!(f, "CloneRejected original={original} live_clones={live_clones}")
            }
            GameEvent::TouchingStarted { a, b } => write!(f, "TouchingStarted a={a} b={b}"),
            GameEvent::GroundContact { id, grounded } => write!(f, "GroundContact id={id} grounded={grounded}"),
            GameEvent::BodyContact { a, b, started } => write!(f, "BodyContact a={a} b={b} started={started}"),
            GameEvent::MessageDelivered { message, handlers } => {
                write!(f, "MessageDelivered message={message} handlers={handlers}")
            }
            GameEvent::SceneSwitchRequested { scene } => write!(f, "SceneSwitchRequested scene={scene}"),
            GameEvent::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Default, Debug)]
pub struct EventBus {
    events: Vec<GameEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
