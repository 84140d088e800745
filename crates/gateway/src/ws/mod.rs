//! The session channel (§4.9, §6.2): a WebSocket endpoint carrying the
//! `start`/`audio`/`stop`/`interrupt` inbound envelope and the
//! `session_info`/`recipe_state`/... outbound event kinds. STT/TTS are
//! out of scope here — `audio` frames are acknowledged, not decoded.

mod session;

pub use session::session_ws;
