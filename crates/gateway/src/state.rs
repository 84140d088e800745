use std::sync::Arc;

use cl_domain::config::Config;
use cl_sessions::SessionRegistry;

use crate::recipes::RecipeRegistry;

/// Shared application state passed to every API handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
    pub recipes: Arc<RecipeRegistry>,
    /// SHA-256 of the configured API bearer token, if auth is enabled.
    pub api_token_hash: Option<Vec<u8>>,
}
