use std::path::PathBuf;

use async_trait::async_trait;
use cl_domain::config::{RecipesConfig, RecipesSource};
use cl_domain::error::{Error, Result};
use cl_domain::recipe::{Recipe, RecipeDocument};
use cl_tools::{RecipeProvider, RecipeSummary};
use parking_lot::RwLock;
use tracing::warn;

#[derive(Debug, Clone, serde::Deserialize)]
struct ManifestEntry {
    id: String,
    title: String,
    #[serde(default)]
    #[allow(dead_code)]
    estimated_total: Option<String>,
    url: String,
}

enum Catalog {
    Local {
        entries: Vec<(RecipeSummary, PathBuf)>,
    },
    Remote {
        entries: Vec<ManifestEntry>,
    },
}

/// A read-only, in-memory-cached recipe catalog. Backs both the tool
/// layer's `RecipeProvider` seam and the `GET /v1/recipes*` REST routes.
pub struct RecipeRegistry {
    catalog: RwLock<Catalog>,
    client: reqwest::Client,
}

impl RecipeRegistry {
    pub async fn load(config: &RecipesConfig) -> Result<Self> {
        let client = reqwest::Client::new();
        let catalog = Self::build_catalog(config, &client).await?;
        Ok(Self {
            catalog: RwLock::new(catalog),
            client,
        })
    }

    /// Re-scans the local directory or re-fetches the remote manifest.
    /// Individual recipe documents are still fetched lazily on `load`.
    pub async fn refresh(&self, config: &RecipesConfig) -> Result<()> {
        let catalog = Self::build_catalog(config, &self.client).await?;
        *self.catalog.write() = catalog;
        Ok(())
    }

    async fn build_catalog(config: &RecipesConfig, client: &reqwest::Client) -> Result<Catalog> {
        match config.source {
            RecipesSource::Local => {
                let dir = config.dir.clone().ok_or_else(|| {
                    Error::Config("recipes.dir is required for recipes.source = \"local\"".into())
                })?;
                Ok(Catalog::Local {
                    entries: scan_local_dir(&dir)?,
                })
            }
            RecipesSource::Remote => {
                let url = config.manifest_url.clone().ok_or_else(|| {
                    Error::Config(
                        "recipes.manifest_url is required for recipes.source = \"remote\"".into(),
                    )
                })?;
                Ok(Catalog::Remote {
                    entries: fetch_manifest(client, &url).await?,
                })
            }
        }
    }
}

fn scan_local_dir(dir: &PathBuf) -> Result<Vec<(RecipeSummary, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read recipe file, skipping");
                continue;
            }
        };
        let doc: RecipeDocument = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse recipe file, skipping");
                continue;
            }
        };
        entries.push((
            RecipeSummary {
                id: doc.recipe.id,
                title: doc.recipe.title,
            },
            path,
        ));
    }
    entries.sort_by(|a, b| a.0.id.cmp(&b.0.id));
    Ok(entries)
}

async fn fetch_manifest(client: &reqwest::Client, url: &str) -> Result<Vec<ManifestEntry>> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Other(format!("fetching recipe manifest: {e}")))?
        .error_for_status()
        .map_err(|e| Error::Other(format!("recipe manifest request failed: {e}")))?;
    resp.json()
        .await
        .map_err(|e| Error::Other(format!("parsing recipe manifest: {e}")))
}

enum Resolved {
    LocalPath(PathBuf),
    RemoteUrl(String),
    NotFound,
}

#[async_trait]
impl RecipeProvider for RecipeRegistry {
    async fn list(&self) -> Vec<RecipeSummary> {
        match &*self.catalog.read() {
            Catalog::Local { entries } => entries.iter().map(|(s, _)| s.clone()).collect(),
            Catalog::Remote { entries } => entries
                .iter()
                .map(|e| RecipeSummary {
                    id: e.id.clone(),
                    title: e.title.clone(),
                })
                .collect(),
        }
    }

    async fn load(&self, recipe_id: Option<&str>) -> Result<Recipe> {
        // Resolve the target under the lock, then do IO without holding it.
        let resolved = {
            let catalog = self.catalog.read();
            match &*catalog {
                Catalog::Local { entries } => {
                    let found = match recipe_id {
                        Some(id) => entries.iter().find(|(s, _)| s.id == id),
                        None => entries.first(),
                    };
                    match found {
                        Some((_, path)) => Resolved::LocalPath(path.clone()),
                        None => Resolved::NotFound,
                    }
                }
                Catalog::Remote { entries } => {
                    let found = match recipe_id {
                        Some(id) => entries.iter().find(|e| e.id == id),
                        None => entries.first(),
                    };
                    match found {
                        Some(e) => Resolved::RemoteUrl(e.url.clone()),
                        None => Resolved::NotFound,
                    }
                }
            }
        };

        match resolved {
            Resolved::LocalPath(path) => {
                let raw = std::fs::read_to_string(&path)?;
                Recipe::from_json_str(&raw)
            }
            Resolved::RemoteUrl(url) => {
                let resp = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Error::Other(format!("fetching recipe: {e}")))?
                    .error_for_status()
                    .map_err(|e| Error::Other(format!("recipe request failed: {e}")))?;
                let raw = resp
                    .text()
                    .await
                    .map_err(|e| Error::Other(format!("reading recipe body: {e}")))?;
                Recipe::from_json_str(&raw)
            }
            Resolved::NotFound => {
                Err(Error::RecipeNotFound(recipe_id.unwrap_or("<default>").to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_recipe(dir: &tempfile::TempDir, file: &str, id: &str, title: &str) {
        let raw = format!(
            r#"{{"recipe": {{"id": "{id}", "title": "{title}"}}, "steps": [
                {{"id": "only", "descr": "do the thing", "type": "immediate", "auto_start": true}}
            ]}}"#
        );
        std::fs::write(dir.path().join(file), raw).unwrap();
    }

    #[tokio::test]
    async fn local_catalog_lists_and_loads_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write_recipe(&dir, "a.json", "recipe-a", "Recipe A");
        write_recipe(&dir, "b.json", "recipe-b", "Recipe B");

        let config = RecipesConfig {
            source: RecipesSource::Local,
            dir: Some(dir.path().to_path_buf()),
            manifest_url: None,
        };
        let registry = RecipeRegistry::load(&config).await.unwrap();

        let listed = registry.list().await;
        assert_eq!(listed.len(), 2);

        let recipe = registry.load(Some("recipe-b")).await.unwrap();
        assert_eq!(recipe.title, "Recipe B");
    }

    #[tokio::test]
    async fn local_catalog_default_load_picks_first_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_recipe(&dir, "only.json", "solo", "Solo Recipe");

        let config = RecipesConfig {
            source: RecipesSource::Local,
            dir: Some(dir.path().to_path_buf()),
            manifest_url: None,
        };
        let registry = RecipeRegistry::load(&config).await.unwrap();
        let recipe = registry.load(None).await.unwrap();
        assert_eq!(recipe.id, "solo");
    }

    #[tokio::test]
    async fn unknown_recipe_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_recipe(&dir, "only.json", "solo", "Solo Recipe");

        let config = RecipesConfig {
            source: RecipesSource::Local,
            dir: Some(dir.path().to_path_buf()),
            manifest_url: None,
        };
        let registry = RecipeRegistry::load(&config).await.unwrap();
        let err = registry.load(Some("missing")).await.unwrap_err();
        assert!(matches!(err, Error::RecipeNotFound(_)));
    }

    #[tokio::test]
    async fn malformed_file_in_local_dir_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_recipe(&dir, "good.json", "good", "Good Recipe");
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();

        let config = RecipesConfig {
            source: RecipesSource::Local,
            dir: Some(dir.path().to_path_buf()),
            manifest_url: None,
        };
        let registry = RecipeRegistry::load(&config).await.unwrap();
        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "good");
    }
}
