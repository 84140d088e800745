//! Owns every timer for one engine. Has no knowledge of the DAG: callers
//! tell it what a step's duration/confirm/reminder settings are, and it
//! notifies completion back through an opaque channel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cl_domain::duration::parse_iso_duration;
use cl_domain::error::{Error, Result};
use cl_domain::event::{Event, EventKind, EventSink};
use cl_domain::recipe::Step;
use cl_domain::timer::{ActiveTimer, TimerState};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sent back to the owning engine actor when a timer naturally elapses
/// (not when it is cancelled).
#[derive(Debug, Clone)]
pub struct TimerCompletion {
    pub step_id: String,
    pub requires_confirm: bool,
}

struct TimerMeta {
    duration_secs: i64,
    end_ts: DateTime<Utc>,
}

struct TimerHandle {
    timer: ActiveTimer,
    cancel: CancellationToken,
    #[allow(dead_code)]
    join: tokio::task::JoinHandle<()>,
}

struct ReminderHandle {
    cancel: CancellationToken,
    #[allow(dead_code)]
    join: tokio::task::JoinHandle<()>,
}

type Timers = Arc<RwLock<HashMap<String, TimerHandle>>>;
type StepIndex = Arc<RwLock<HashMap<String, String>>>;
type Metadata = Arc<RwLock<HashMap<String, TimerMeta>>>;
type Reminders = Arc<RwLock<HashMap<String, ReminderHandle>>>;

pub struct TimerManager {
    timers: Timers,
    step_index: StepIndex,
    metadata: Metadata,
    reminders: Reminders,
    sink: Arc<dyn EventSink>,
    completions: mpsc::UnboundedSender<TimerCompletion>,
}

impl TimerManager {
    pub fn new(sink: Arc<dyn EventSink>, completions: mpsc::UnboundedSender<TimerCompletion>) -> Self {
        TimerManager {
            timers: Arc::new(RwLock::new(HashMap::new())),
            step_index: Arc::new(RwLock::new(HashMap::new())),
            metadata: Arc::new(RwLock::new(HashMap::new())),
            reminders: Arc::new(RwLock::new(HashMap::new())),
            sink,
            completions,
        }
    }

    /// Registers end-timestamp metadata for UI consumers. Must be called
    /// before the worker for the same timer starts, so any `recipe_state`
    /// snapshot taken afterward already reflects the running timer.
    pub fn set_timer_metadata(&self, step_id: &str, duration_secs: i64) {
        self.metadata.write().insert(
            step_id.to_string(),
            TimerMeta {
                duration_secs,
                end_ts: Utc::now() + ChronoDuration::seconds(duration_secs),
            },
        );
    }

    pub fn get_timer_state(&self, step_id: &str) -> Option<TimerState> {
        let meta = self.metadata.read();
        meta.get(step_id).map(|m| TimerState {
            duration_secs: m.duration_secs,
            end_ts: m.end_ts,
            remaining_secs: (m.end_ts - Utc::now()).num_seconds().max(0),
        })
    }

    /// Starts a bare timer. Fails with `TimerAlreadyRunning` if `id` is
    /// already in use.
    pub fn start_timer(
        &self,
        id: &str,
        step_id: Option<String>,
        label: &str,
        duration_secs: i64,
        requires_confirm: bool,
        reminder_every_secs: Option<i64>,
    ) -> Result<ActiveTimer> {
        if self.timers.read().contains_key(id) {
            return Err(Error::TimerAlreadyRunning(id.to_string()));
        }

        let timer = ActiveTimer::new(id, step_id.clone(), label, duration_secs);
        let cancel = CancellationToken::new();
        let join = self.spawn_worker(
            id.to_string(),
            step_id.clone(),
            label.to_string(),
            duration_secs,
            requires_confirm,
            reminder_every_secs,
            cancel.clone(),
        );

        self.timers.write().insert(
            id.to_string(),
            TimerHandle {
                timer: timer.clone(),
                cancel,
                join,
            },
        );
        if let Some(sid) = &step_id {
            self.step_index.write().insert(sid.clone(), id.to_string());
        }
        Ok(timer)
    }

    /// Convenience that derives id/label/duration/confirm/reminder from
    /// the step itself. Fails with `TimerDurationError` if the step is
    /// not a timer step or carries no duration.
    pub fn start_timer_for_step(&self, step: &Step) -> Result<ActiveTimer> {
        let duration_secs = step
            .duration_secs()
            .ok_or_else(|| Error::TimerDurationError(step.id.clone()))?;
        let reminder_every = step
            .reminder
            .as_ref()
            .map(|r| parse_iso_duration(&r.every))
            .filter(|secs| *secs > 0);
        let id = format!("timer_{}", step.id);
        self.start_timer(
            &id,
            Some(step.id.clone()),
            &step.descr,
            duration_secs,
            step.requires_confirm,
            reminder_every,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_worker(
        &self,
        timer_id: String,
        step_id: Option<String>,
        descr: String,
        duration_secs: i64,
        requires_confirm: bool,
        reminder_every_secs: Option<i64>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let sink = self.sink.clone();
        let completions = self.completions.clone();
        let reminders = self.reminders.clone();
        let timers = self.timers.clone();
        let step_index = self.step_index.clone();
        let metadata = self.metadata.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(duration_secs.max(0) as u64)) => {
                    sink.emit(Event::new(EventKind::TimerDone {
                        step_id: step_id.clone().unwrap_or_default(),
                        descr: descr.clone(),
                        requires_confirm,
                    }));

                    // Natural completion retires the timer bookkeeping; a
                    // cancelled timer is retired by `cancel_timer` instead.
                    timers.write().remove(&timer_id);
                    if let Some(sid) = &step_id {
                        step_index.write().remove(sid);
                        metadata.write().remove(sid);
                    }

                    if let Some(sid) = step_id {
                        if requires_confirm {
                            if let Some(interval_secs) = reminder_every_secs {
                                spawn_reminder(sid.clone(), interval_secs, sink.clone(), &reminders);
                            }
                        }
                        let _ = completions.send(TimerCompletion {
                            step_id: sid,
                            requires_confirm,
                        });
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("timer cancelled before completion");
                }
            }
        })
    }

    /// Cancels a timer by id. Idempotent: returns `Ok(false)` if not
    /// found unless `raise_if_not_found` is set. Emits `TimerCancelled`
    /// iff `emit_event` is true.
    pub fn cancel_timer(&self, id: &str, emit_event: bool, raise_if_not_found: bool) -> Result<bool> {
        let removed = self.timers.write().remove(id);
        let Some(handle) = removed else {
            if raise_if_not_found {
                return Err(Error::TimerNotFound(id.to_string()));
            }
            return Ok(false);
        };
        handle.cancel.cancel();
        if let Some(step_id) = &handle.timer.step_id {
            self.step_index.write().remove(step_id);
            self.metadata.write().remove(step_id);
        }
        if emit_event {
            self.sink.emit(Event::new(EventKind::TimerCancelled {
                timer_id: handle.timer.id.clone(),
                step_id: handle.timer.step_id.clone(),
                label: handle.timer.label.clone(),
                remaining_secs: handle.timer.remaining_secs(),
            }));
        }
        Ok(true)
    }

    pub fn cancel_timer_for_step(&self, step_id: &str, emit_event: bool, raise_if_not_found: bool) -> Result<bool> {
        let timer_id = self.step_index.read().get(step_id).cloned();
        match timer_id {
            Some(id) => self.cancel_timer(&id, emit_event, raise_if_not_found),
            None => {
                if raise_if_not_found {
                    Err(Error::TimerNotFound(step_id.to_string()))
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Cancels a reminder loop for a step, if one is running. Separate
    /// from `cancel_timer` because `confirm_step_done` needs to silence
    /// reminders without necessarily touching a still-running timer.
    pub fn cancel_reminders_for_step(&self, step_id: &str) -> bool {
        match self.reminders.write().remove(step_id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_active_timer_for_step(&self, step_id: &str) -> bool {
        self.step_index.read().contains_key(step_id)
    }

    pub fn get_timer_for_step(&self, step_id: &str) -> Option<ActiveTimer> {
        let timer_id = self.step_index.read().get(step_id).cloned()?;
        self.timers.read().get(&timer_id).map(|h| h.timer.clone())
    }

    /// All active timers, sorted by remaining time ascending.
    pub fn get_all_active_timers(&self) -> Vec<ActiveTimer> {
        let mut timers: Vec<ActiveTimer> = self.timers.read().values().map(|h| h.timer.clone()).collect();
        timers.sort_by_key(|t| t.remaining_secs());
        timers
    }

    /// Cancels every timer and reminder without emitting completion or
    /// cancellation events. Used on engine stop.
    pub fn cancel_all(&self) {
        let mut timers = self.timers.write();
        for (_, handle) in timers.drain() {
            handle.cancel.cancel();
        }
        drop(timers);
        let mut reminders = self.reminders.write();
        for (_, handle) in reminders.drain() {
            handle.cancel.cancel();
        }
        drop(reminders);
        self.step_index.write().clear();
        self.metadata.write().clear();
    }
}

fn spawn_reminder(step_id: String, interval_secs: i64, sink: Arc<dyn EventSink>, reminders: &Reminders) {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task_step_id = step_id.clone();
    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => break,
                _ = tokio::time::sleep(std::time::Duration::from_secs(interval_secs.max(1) as u64)) => {
                    sink.emit(Event::new(EventKind::ReminderTick {
                        step_id: task_step_id.clone(),
                    }));
                }
            }
        }
    });
    reminders.write().insert(step_id, ReminderHandle { cancel, join });
}
