use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    Event,
    Action,
    Error,
    User,
}

impl LogKind {
    pub fn label(self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Event => "event",
            LogKind::Action => "action",
            LogKind::Error => "error",
            LogKind::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: f64,
    pub kind: LogKind,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>8.3}] {:<6} {}", self.time, self.kind.label(), self.message)
    }
}

#[derive(Debug)]
struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

/// Bounded debug log shared with the host's debug panel. Every entry is mirrored to
/// the `log` facade.
#[derive(Debug, Clone)]
pub struct RuntimeLog {
    buffer: Rc<RefCell<LogBuffer>>,
}

impl RuntimeLog {
    pub const DEFAULT_CAPACITY: usize = 200;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buffer: Rc::new(RefCell::new(LogBuffer { entries: VecDeque::with_capacity(capacity), capacity })) }
    }

    pub fn push(&self, time: f64, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            LogKind::Error => log::error!(target: "kestrel_blocks", "{message}"),
            LogKind::User => log::info!(target: "kestrel_blocks::user", "{message}"),
            LogKind::Event | LogKind::Action => log::debug!(target: "kestrel_blocks", "{message}"),
            LogKind::Info => log::info!(target: "kestrel_blocks", "{message}"),
        }
        let mut buffer = self.buffer.borrow_mut();
        if buffer.entries.len() == buffer.capacity {
            buffer.entries.pop_front();
        }
        buffer.entries.push_back(LogEntry { time, kind, message });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer.borrow().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.borrow().capacity
    }

    pub fn clear(&self) {
        self.buffer.borrow_mut().entries.clear();
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.buffer.borrow().entries.iter().filter(|entry| entry.kind == kind).count()
    }

    fn downgrade(&self) -> Weak<RefCell<LogBuffer>> {
        Rc::downgrade(&self.buffer)
    }
}

impl Default for RuntimeLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

thread_local! {
    static CURRENT_SESSION: RefCell<Weak<RefCell<LogBuffer>>> = RefCell::new(Weak::new());
}

/// Debug-only view of the play session running on this thread.
pub mod debug {
    use super::{LogEntry, RuntimeLog, CURRENT_SESSION};
    use std::rc::Weak;

    pub(crate) fn set_current(log: &RuntimeLog) {
        CURRENT_SESSION.with(|slot| *slot.borrow_mut() = log.downgrade());
    }

    pub(crate) fn clear_current(log: &RuntimeLog) {
        CURRENT_SESSION.with(|slot| {
            let mut slot = slot.borrow_mut();
            if Weak::ptr_eq(&*slot, &log.downgrade()) {
                *slot = Weak::new();
            }
        });
    }

    /// Snapshot of the current session's log, if a session is running.
    pub fn current_log() -> Option<Vec<LogEntry>> {
        CURRENT_SESSION.with(|slot| {
            slot.borrow().upgrade().map(|buffer| buffer.borrow().entries.iter().cloned().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_entries() {
        let log = RuntimeLog::new(3);
        for i in 0..5 {
            log.push(i as f64, LogKind::Info, format!("entry {i}"));
        }
        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn current_session_tracks_registration() {
        let log = RuntimeLog::new(8);
        log.push(0.0, LogKind::User, "hello");
        debug::set_current(&log);
        assert_eq!(debug::current_log().map(|entries| entries.len()), Some(1));
        debug::clear_current(&log);
        assert!(debug::current_log().is_none());
    }
}
