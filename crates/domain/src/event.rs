//! Engine events. These are the internal signals produced by the recipe
//! engine and timer manager; the event handler (in `cl-gateway`) translates
//! them into outbound UI events and assistant nudges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    StepReady {
        step_id: String,
    },
    StepStart {
        step_id: String,
        descr: String,
        step_type: String,
        duration_secs: Option<i64>,
        duration_str: Option<String>,
    },
    TimerSet {
        step_id: String,
        duration_secs: i64,
    },
    TimerStarted {
        timer_id: String,
        step_id: Option<String>,
        duration_secs: i64,
        label: String,
    },
    TimerDone {
        step_id: String,
        descr: String,
        requires_confirm: bool,
    },
    TimerCancelled {
        timer_id: String,
        step_id: Option<String>,
        label: String,
        remaining_secs: i64,
    },
    TimerListUpdate {
        count: usize,
    },
    ReminderTick {
        step_id: String,
    },
    StepCompleted {
        step_id: String,
    },
    AllCompleted {
        recipe_title: String,
    },
    Message {
        message: String,
    },
    Error {
        msg: String,
    },
}

/// An engine event plus the time it was emitted, delivered to a session's
/// event sink in emission order (I7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Event {
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// A sink that an engine delivers events to, in emission order. Shared
/// across tokio tasks via `Arc`; implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// An in-memory sink useful for tests: records every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind.clone()).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}
