/// Shared error type used across all cookline crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("recipe invalid: {0}")]
    RecipeInvalid(String),

    #[error("config: {0}")]
    Config(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("no recipe in progress")]
    RecipeNotLoaded,

    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("step not ready: {0}")]
    StepNotReady(String),

    #[error("step blocked: {step_id}, blocked_by {blocked_by:?}")]
    StepBlocked {
        step_id: String,
        blocked_by: Vec<String>,
    },

    #[error("step already completed: {0}")]
    StepAlreadyCompleted(String),

    #[error("timer not found: {0}")]
    TimerNotFound(String),

    #[error("timer already running: {0}")]
    TimerAlreadyRunning(String),

    #[error("timer duration error: {0}")]
    TimerDurationError(String),

    #[error("timer active: {step_id}, remaining {remaining_secs}s")]
    TimerActive { step_id: String, remaining_secs: i64 },

    #[error("invalid argument: {0}")]
    ToolInvalidArgument(String),

    #[error("precondition failed: {0}")]
    ToolPrecondition(String),

    #[error("no output channel registered for session: {0}")]
    NoOutputChannel(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
