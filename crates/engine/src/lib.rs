//! The recipe engine and timer manager: the per-session DAG state
//! machine and its independent countdown timers.

pub mod engine;
pub mod timer_manager;

pub use engine::{spawn_engine, EngineHandle, RecipeSnapshot, StepSnapshot};
pub use timer_manager::{TimerCompletion, TimerManager};
