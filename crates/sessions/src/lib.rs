//! The session layer: a registry mapping session ids to running recipe
//! engines, their assistants, and their outbound UI channels.

pub mod registry;

pub use registry::{AssistantHandle, KitchenTimerState, OutputChannel, SessionRegistry};
