//! Decouples the tool layer from however recipes are actually sourced
//! (local directory, remote manifest — see SPEC_FULL §3). The gateway
//! supplies the concrete implementation.

use async_trait::async_trait;
use cl_domain::error::Result;
use cl_domain::recipe::Recipe;

#[derive(Debug, Clone)]
pub struct RecipeSummary {
    pub id: String,
    pub title: String,
}

/// Async so a remote-manifest-backed provider can fetch catalog entries
/// and individual recipe documents over the network without blocking.
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    async fn list(&self) -> Vec<RecipeSummary>;

    /// Loads a recipe by id, or the registry's sole/default recipe when
    /// `recipe_id` is `None`.
    async fn load(&self, recipe_id: Option<&str>) -> Result<Recipe>;
}
