//! The per-session recipe engine: a single actor task owning the step
//! table and the timer manager. All mutation is driven through the
//! actor's command channel so concurrent callers and timer-completion
//! callbacks serialize naturally (I7).

use std::sync::Arc;

use cl_domain::error::{Error, Result};
use cl_domain::event::{Event, EventKind, EventSink};
use cl_domain::recipe::{Recipe, Step, StepStatus, UnlockWhen};
use cl_domain::timer::TimerState;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::timer_manager::TimerManager;

#[derive(Debug, Clone, Serialize)]
pub struct StepSnapshot {
    pub id: String,
    pub descr: String,
    pub status: StepStatus,
    pub step_type: cl_domain::recipe::StepType,
    pub depends_on: Vec<String>,
    pub next: Vec<String>,
    pub timer: Option<TimerState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSnapshot {
    pub recipe_id: String,
    pub recipe_title: String,
    pub running: bool,
    pub completed_steps: Vec<String>,
    pub steps: Vec<StepSnapshot>,
}

enum Command {
    Start(oneshot::Sender<Result<()>>),
    StartStep(String, oneshot::Sender<Result<()>>),
    StartTimerForStep(String, oneshot::Sender<Result<()>>),
    ConfirmStepDone(String, bool, oneshot::Sender<Result<()>>),
    CancelTimer(String, oneshot::Sender<Result<()>>),
    GetState(oneshot::Sender<RecipeSnapshot>),
    GetActiveSteps(oneshot::Sender<Vec<Step>>),
    Stop(oneshot::Sender<()>),
}

/// A cheap, cloneable reference to a running engine actor.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    pub async fn start(&self) -> Result<()> {
        self.call(Command::Start).await
    }

    pub async fn start_step(&self, step_id: impl Into<String>) -> Result<()> {
        let step_id = step_id.into();
        self.call(|tx| Command::StartStep(step_id, tx)).await
    }

    pub async fn start_timer_for_step(&self, step_id: impl Into<String>) -> Result<()> {
        let step_id = step_id.into();
        self.call(|tx| Command::StartTimerForStep(step_id, tx)).await
    }

    pub async fn confirm_step_done(&self, step_id: impl Into<String>, force_cancel_timer: bool) -> Result<()> {
        let step_id = step_id.into();
        self.call(|tx| Command::ConfirmStepDone(step_id, force_cancel_timer, tx))
            .await
    }

    /// Cancels a timer by its timer id (not step id), regardless of
    /// which step it belongs to. Used by the REST timer-cancel route.
    pub async fn cancel_timer(&self, timer_id: impl Into<String>) -> Result<()> {
        let timer_id = timer_id.into();
        self.call(|tx| Command::CancelTimer(timer_id, tx)).await
    }

    pub async fn get_state(&self) -> Result<RecipeSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::GetState(tx))
            .map_err(|_| Error::Other("engine actor is gone".into()))?;
        rx.await.map_err(|_| Error::Other("engine actor dropped reply".into()))
    }

    pub async fn get_active_steps(&self) -> Result<Vec<Step>> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::GetActiveSteps(tx))
            .map_err(|_| Error::Other("engine actor is gone".into()))?;
        rx.await.map_err(|_| Error::Other("engine actor dropped reply".into()))
    }

    pub async fn stop(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Stop(tx))
            .map_err(|_| Error::Other("engine actor is gone".into()))?;
        rx.await.map_err(|_| Error::Other("engine actor dropped reply".into()))
    }

    async fn call<F>(&self, make: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> Command,
    {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .map_err(|_| Error::Other("engine actor is gone".into()))?;
        rx.await.map_err(|_| Error::Other("engine actor dropped reply".into()))?
    }
}

/// Spawns the actor task for `recipe` and returns a handle to it. The
/// actor runs until `stop()` is called or the handle (and every clone)
/// is dropped.
pub fn spawn_engine(recipe: Recipe, sink: Arc<dyn EventSink>) -> EngineHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let timer_manager = TimerManager::new(sink.clone(), completion_tx);

    let actor = EngineActor {
        recipe,
        running: false,
        timer_manager,
        sink,
    };

    tokio::spawn(actor.run(cmd_rx, completion_rx));

    EngineHandle { tx: cmd_tx }
}

struct EngineActor {
    recipe: Recipe,
    running: bool,
    timer_manager: TimerManager,
    sink: Arc<dyn EventSink>,
}

impl EngineActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut completion_rx: mpsc::UnboundedReceiver<crate::timer_manager::TimerCompletion>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Start(reply)) => {
                            let _ = reply.send(self.start());
                        }
                        Some(Command::StartStep(step_id, reply)) => {
                            let _ = reply.send(self.start_step(&step_id));
                        }
                        Some(Command::StartTimerForStep(step_id, reply)) => {
                            let _ = reply.send(self.start_timer_for_step(&step_id));
                        }
                        Some(Command::ConfirmStepDone(step_id, force, reply)) => {
                            let _ = reply.send(self.confirm_step_done(&step_id, force));
                        }
                        Some(Command::CancelTimer(timer_id, reply)) => {
                            let _ = reply.send(self.cancel_timer(&timer_id));
                        }
                        Some(Command::GetState(reply)) => {
                            let _ = reply.send(self.get_state());
                        }
                        Some(Command::GetActiveSteps(reply)) => {
                            let _ = reply.send(self.get_active_steps());
                        }
                        Some(Command::Stop(reply)) => {
                            self.stop();
                            let _ = reply.send(());
                        }
                        None => break,
                    }
                }
                completion = completion_rx.recv() => {
                    match completion {
                        Some(c) => self.on_timer_complete(&c.step_id, c.requires_confirm),
                        None => {}
                    }
                }
            }
        }
    }

    fn emit(&self, kind: EventKind) {
        self.sink.emit(Event::new(kind));
    }

    fn start(&mut self) -> Result<()> {
        let frontier_ids: Vec<String> = self
            .recipe
            .steps()
            .iter()
            .filter(|s| s.depends_on.is_empty())
            .map(|s| s.id.clone())
            .collect();

        if frontier_ids.is_empty() {
            self.emit(EventKind::Error {
                msg: "recipe has no initial steps".to_string(),
            });
            return Ok(());
        }

        for id in &frontier_ids {
            if let Some(step) = self.recipe.step_mut(id) {
                step.status = StepStatus::Ready;
            }
            self.emit(EventKind::StepReady { step_id: id.clone() });
        }

        self.running = true;

        let auto_start_candidates: Vec<&String> = frontier_ids
            .iter()
            .filter(|id| self.recipe.step(id).map(|s| s.auto_start).unwrap_or(false))
            .collect();
        if auto_start_candidates.len() == 1 {
            let id = auto_start_candidates[0].clone();
            self.start_step(&id)?;
        }

        Ok(())
    }

    fn start_step(&mut self, step_id: &str) -> Result<()> {
        let step = self
            .recipe
            .step(step_id)
            .ok_or_else(|| Error::StepNotFound(step_id.to_string()))?;
        if step.status != StepStatus::Ready {
            return Err(Error::StepNotReady(step_id.to_string()));
        }

        let on_enter_messages: Vec<String> = step.on_enter.iter().map(|a| a.say.clone()).collect();
        let descr = step.descr.clone();
        let step_type = step.step_type;
        let duration_secs = step.duration_secs();
        let duration_str = duration_secs.map(cl_domain::duration::format_human);

        if let Some(step) = self.recipe.step_mut(step_id) {
            step.status = StepStatus::Active;
        }

        for msg in on_enter_messages {
            self.emit(EventKind::Message { message: msg });
        }

        self.emit(EventKind::StepStart {
            step_id: step_id.to_string(),
            descr,
            step_type: format!("{step_type:?}").to_lowercase(),
            duration_secs,
            duration_str,
        });

        Ok(())
    }

    fn start_timer_for_step(&mut self, step_id: &str) -> Result<()> {
        let step = self
            .recipe
            .step(step_id)
            .ok_or_else(|| Error::StepNotFound(step_id.to_string()))?;
        if step.status != StepStatus::Active {
            return Err(Error::ToolPrecondition(format!(
                "step {step_id} is not active"
            )));
        }
        if step.step_type != cl_domain::recipe::StepType::Timer {
            return Err(Error::TimerDurationError(step_id.to_string()));
        }
        if self.timer_manager.has_active_timer_for_step(step_id) {
            return Err(Error::TimerAlreadyRunning(step_id.to_string()));
        }
        let duration_secs = step
            .duration_secs()
            .ok_or_else(|| Error::TimerDurationError(step_id.to_string()))?;
        let step = step.clone();

        self.timer_manager.set_timer_metadata(step_id, duration_secs);
        self.emit(EventKind::TimerSet {
            step_id: step_id.to_string(),
            duration_secs,
        });

        let timer = self.timer_manager.start_timer_for_step(&step)?;

        self.emit(EventKind::TimerStarted {
            timer_id: timer.id.clone(),
            step_id: timer.step_id.clone(),
            duration_secs: timer.duration_secs,
            label: timer.label.clone(),
        });
        self.emit(EventKind::TimerListUpdate {
            count: self.timer_manager.get_all_active_timers().len(),
        });

        Ok(())
    }

    fn confirm_step_done(&mut self, step_id: &str, force_cancel_timer: bool) -> Result<()> {
        let step = self
            .recipe
            .step(step_id)
            .ok_or_else(|| Error::StepNotFound(step_id.to_string()))?;
        if step.status != StepStatus::Active && step.status != StepStatus::WaitingAck {
            return Err(Error::StepAlreadyCompleted(step_id.to_string()));
        }

        if self.timer_manager.has_active_timer_for_step(step_id) && !force_cancel_timer {
            let remaining = self
                .timer_manager
                .get_timer_for_step(step_id)
                .map(|t| t.remaining_secs())
                .unwrap_or(0);
            return Err(Error::TimerActive {
                step_id: step_id.to_string(),
                remaining_secs: remaining,
            });
        }

        self.complete_step(step_id)
    }

    fn complete_step(&mut self, step_id: &str) -> Result<()> {
        self.timer_manager.cancel_reminders_for_step(step_id);
        let had_timer = self.timer_manager.has_active_timer_for_step(step_id);
        if had_timer {
            self.timer_manager.cancel_timer_for_step(step_id, true, false)?;
        }

        let next_ids = match self.recipe.step_mut(step_id) {
            Some(step) => {
                step.status = StepStatus::Completed;
                step.next.clone()
            }
            None => return Err(Error::StepNotFound(step_id.to_string())),
        };
        self.emit(EventKind::StepCompleted {
            step_id: step_id.to_string(),
        });

        self.unlock_successors(&next_ids);

        if self.recipe.steps().iter().all(|s| s.status == StepStatus::Completed) {
            self.running = false;
            self.emit(EventKind::AllCompleted {
                recipe_title: self.recipe.title.clone(),
            });
        }

        Ok(())
    }

    /// Evaluates each candidate's unlock predicate in document order and
    /// applies the single-successor auto-start rule (I4).
    fn unlock_successors(&mut self, candidate_ids: &[String]) {
        let completed = self.recipe.completed_ids();
        let mut newly_ready = Vec::new();

        for id in candidate_ids {
            let Some(step) = self.recipe.step(id) else {
                continue;
            };
            if step.status != StepStatus::Pending {
                continue;
            }
            let satisfied = match step.unlock_when {
                UnlockWhen::All => step.depends_on.iter().all(|d| completed.contains(d)),
                UnlockWhen::Any => step.depends_on.iter().any(|d| completed.contains(d)),
            };
            if satisfied {
                newly_ready.push(id.clone());
            }
        }

        for id in &newly_ready {
            if let Some(step) = self.recipe.step_mut(id) {
                step.status = StepStatus::Ready;
            }
            self.emit(EventKind::StepReady { step_id: id.clone() });
        }

        if newly_ready.len() == 1 {
            let id = &newly_ready[0];
            if self.recipe.step(id).map(|s| s.auto_start).unwrap_or(false) {
                let _ = self.start_step(id);
            }
        }
    }

    fn on_timer_complete(&mut self, step_id: &str, requires_confirm: bool) {
        if requires_confirm {
            if let Some(step) = self.recipe.step_mut(step_id) {
                step.status = StepStatus::WaitingAck;
            }
        } else {
            let _ = self.complete_step(step_id);
        }
    }

    fn cancel_timer(&mut self, timer_id: &str) -> Result<()> {
        self.timer_manager.cancel_timer(timer_id, true, true)?;
        self.emit(EventKind::TimerListUpdate {
            count: self.timer_manager.get_all_active_timers().len(),
        });
        Ok(())
    }

    fn get_state(&self) -> RecipeSnapshot {
        RecipeSnapshot {
            recipe_id: self.recipe.id.clone(),
            recipe_title: self.recipe.title.clone(),
            running: self.running,
            completed_steps: self
                .recipe
                .steps()
                .iter()
                .filter(|s| s.status == StepStatus::Completed)
                .map(|s| s.id.clone())
                .collect(),
            steps: self
                .recipe
                .steps()
                .iter()
                .map(|s| StepSnapshot {
                    id: s.id.clone(),
                    descr: s.descr.clone(),
                    status: s.status,
                    step_type: s.step_type,
                    depends_on: s.depends_on.clone(),
                    next: s.next.clone(),
                    timer: self.timer_manager.get_timer_state(&s.id),
                })
                .collect(),
        }
    }

    fn get_active_steps(&self) -> Vec<Step> {
        self.recipe
            .steps()
            .iter()
            .filter(|s| s.status == StepStatus::Active || s.status == StepStatus::WaitingAck)
            .cloned()
            .collect()
    }

    fn stop(&mut self) {
        self.timer_manager.cancel_all();
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_domain::event::{EventKind, RecordingSink};
    use cl_domain::recipe::Recipe;
    use std::sync::Arc;

    fn recipe(steps_json: &str) -> Recipe {
        let raw = format!(
            r#"{{"recipe": {{"id": "r1", "title": "Sheet Pan Dinner"}}, "steps": {steps_json}}}"#
        );
        Recipe::from_json_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn s1_auto_start_single_initial_step() {
        let r = recipe(
            r#"[{"id":"prep","descr":"prep","type":"immediate","auto_start":true,"requires_confirm":true}]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink.clone());
        handle.start().await.unwrap();

        let kinds = sink.kinds();
        assert!(matches!(kinds[0], EventKind::StepReady { ref step_id } if step_id == "prep"));
        assert!(matches!(kinds[1], EventKind::StepStart { ref step_id, .. } if step_id == "prep"));

        let state = handle.get_state().await.unwrap();
        let prep = state.steps.iter().find(|s| s.id == "prep").unwrap();
        assert_eq!(prep.status, StepStatus::Active);
    }

    #[tokio::test]
    async fn s2_parallel_unlock_suppression() {
        let r = recipe(
            r#"[
                {"id":"preheat","descr":"preheat oven","type":"immediate","auto_start":true,"next":["roast","prep_veg"]},
                {"id":"roast","descr":"roast","type":"immediate","auto_start":true,"depends_on":["preheat"]},
                {"id":"prep_veg","descr":"prep veg","type":"immediate","auto_start":true,"depends_on":["preheat"]}
            ]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink.clone());
        handle.start().await.unwrap();
        handle.confirm_step_done("preheat", false).await.unwrap();

        let kinds = sink.kinds();
        let has_step_start_for = |id: &str| {
            kinds.iter().any(|k| matches!(k, EventKind::StepStart { step_id, .. } if step_id == id))
        };
        assert!(has_step_start_for("preheat"));
        assert!(!has_step_start_for("roast"));
        assert!(!has_step_start_for("prep_veg"));

        let state = handle.get_state().await.unwrap();
        let roast = state.steps.iter().find(|s| s.id == "roast").unwrap();
        let prep_veg = state.steps.iter().find(|s| s.id == "prep_veg").unwrap();
        assert_eq!(roast.status, StepStatus::Ready);
        assert_eq!(prep_veg.status, StepStatus::Ready);
    }

    #[tokio::test]
    async fn s3_timer_decoupling() {
        let r = recipe(
            r#"[{"id":"roast","descr":"roast the chicken","type":"timer","duration":"PT50M","requires_confirm":true,"auto_start":true}]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink.clone());
        handle.start().await.unwrap();

        let state = handle.get_state().await.unwrap();
        let roast = state.steps.iter().find(|s| s.id == "roast").unwrap();
        assert_eq!(roast.status, StepStatus::Active);
        assert!(roast.timer.is_none());
        assert!(!sink.kinds().iter().any(|k| matches!(k, EventKind::TimerStarted { .. })));

        handle.start_timer_for_step("roast").await.unwrap();
        let state = handle.get_state().await.unwrap();
        let roast = state.steps.iter().find(|s| s.id == "roast").unwrap();
        let timer = roast.timer.as_ref().unwrap();
        assert!(timer.remaining_secs > 2990 && timer.remaining_secs <= 3000);
        assert!(sink.kinds().iter().any(|k| matches!(k, EventKind::TimerStarted { .. })));
    }

    #[tokio::test]
    async fn s5_confirm_blocked_by_running_timer() {
        let r = recipe(
            r#"[{"id":"roast","descr":"roast","type":"timer","duration":"PT50M","requires_confirm":true,"auto_start":true}]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink);
        handle.start().await.unwrap();
        handle.start_timer_for_step("roast").await.unwrap();

        let err = handle.confirm_step_done("roast", false).await.unwrap_err();
        assert!(matches!(err, Error::TimerActive { .. }));
    }

    #[tokio::test]
    async fn s6_all_completed_terminus() {
        let r = recipe(
            r#"[
                {"id":"a","descr":"a","type":"immediate","auto_start":true,"next":["b"]},
                {"id":"b","descr":"b","type":"immediate","auto_start":true,"depends_on":["a"]}
            ]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink.clone());
        handle.start().await.unwrap();
        handle.confirm_step_done("a", false).await.unwrap();
        handle.confirm_step_done("b", false).await.unwrap();

        let state = handle.get_state().await.unwrap();
        assert!(!state.running);
        assert!(sink
            .kinds()
            .iter()
            .any(|k| matches!(k, EventKind::AllCompleted { .. })));
    }

    #[tokio::test]
    async fn confirm_on_already_completed_step_is_a_no_op() {
        let r = recipe(r#"[{"id":"a","descr":"a","type":"immediate","auto_start":true}]"#);
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink);
        handle.start().await.unwrap();
        handle.confirm_step_done("a", false).await.unwrap();
        let err = handle.confirm_step_done("a", false).await.unwrap_err();
        assert!(matches!(err, Error::StepAlreadyCompleted(_)));
    }

    #[tokio::test]
    async fn cancel_timer_by_id_releases_a_blocked_confirm() {
        let r = recipe(
            r#"[{"id":"roast","descr":"roast","type":"timer","duration":"PT50M","requires_confirm":true,"auto_start":true}]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink.clone());
        handle.start().await.unwrap();
        handle.start_timer_for_step("roast").await.unwrap();
        handle.cancel_timer("timer_roast").await.unwrap();

        let state = handle.get_state().await.unwrap();
        assert!(state.steps[0].timer.is_none());
        handle.confirm_step_done("roast", false).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_unknown_timer_id_errors() {
        let r = recipe(r#"[{"id":"a","descr":"a","type":"immediate","auto_start":true}]"#);
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink);
        handle.start().await.unwrap();
        let err = handle.cancel_timer("nonexistent").await.unwrap_err();
        assert!(matches!(err, Error::TimerNotFound(_)));
    }

    #[tokio::test]
    async fn unlock_when_any_does_not_reemit_step_ready() {
        let r = recipe(
            r#"[
                {"id":"a","descr":"a","type":"immediate","auto_start":true,"next":["c"]},
                {"id":"b","descr":"b","type":"immediate","auto_start":false,"next":["c"]},
                {"id":"c","descr":"c","type":"immediate","unlock_when":"any","depends_on":["a","b"]}
            ]"#,
        );
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_engine(r, sink.clone());
        handle.start().await.unwrap();
        handle.confirm_step_done("a", false).await.unwrap();
        handle.start_step("b").await.unwrap();
        handle.confirm_step_done("b", false).await.unwrap();

        let ready_count_for_c = sink
            .kinds()
            .iter()
            .filter(|k| matches!(k, EventKind::StepReady { step_id } if step_id == "c"))
            .count();
        assert_eq!(ready_count_for_c, 1);
    }
}
