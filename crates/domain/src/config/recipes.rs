use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Recipe catalog source (§6.4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipesSource {
    Local,
    Remote,
}

impl Default for RecipesSource {
    fn default() -> Self {
        RecipesSource::Local
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipesConfig {
    #[serde(default)]
    pub source: RecipesSource,
    pub dir: Option<std::path::PathBuf>,
    pub manifest_url: Option<String>,
}
