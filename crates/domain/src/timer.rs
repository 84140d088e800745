//! `ActiveTimer`: the metadata half of a timer's lifecycle. Owning the
//! cancellable worker task is the timer manager's job (`cl-engine`); this
//! type is the value the UI and `get_timer_state` surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An independently-lived timer. Conventionally `id = "timer_<step_id>"`
/// for step-bound timers; ad-hoc kitchen timers use an opaque id and
/// carry no `step_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTimer {
    pub id: String,
    pub step_id: Option<String>,
    pub label: String,
    pub duration_secs: i64,
    pub started_at: DateTime<Utc>,
}

impl ActiveTimer {
    pub fn new(id: impl Into<String>, step_id: Option<String>, label: impl Into<String>, duration_secs: i64) -> Self {
        ActiveTimer {
            id: id.into(),
            step_id,
            label: label.into(),
            duration_secs,
            started_at: Utc::now(),
        }
    }

    /// Seconds remaining as of `now`, floored at zero.
    pub fn remaining_secs_at(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = (now - self.started_at).num_seconds();
        (self.duration_secs - elapsed).max(0)
    }

    pub fn remaining_secs(&self) -> i64 {
        self.remaining_secs_at(Utc::now())
    }

    pub fn end_ts(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::seconds(self.duration_secs)
    }
}

/// The "legacy shape" timer state `get_timer_state` returns for UI
/// consumers: duration, absolute end timestamp, and derived remaining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerState {
    pub duration_secs: i64,
    pub end_ts: DateTime<Utc>,
    pub remaining_secs: i64,
}

impl From<&ActiveTimer> for TimerState {
    fn from(timer: &ActiveTimer) -> Self {
        TimerState {
            duration_secs: timer.duration_secs,
            end_ts: timer.end_ts(),
            remaining_secs: timer.remaining_secs(),
        }
    }
}
