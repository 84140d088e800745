use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use cl_domain::config::{Config, ConfigSeverity};
use cl_gateway::api;
use cl_gateway::cli::{Cli, Command, ConfigCommand};
use cl_gateway::recipes::RecipeRegistry;
use cl_gateway::state::AppState;
use cl_sessions::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cl_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cl_gateway::cli::load_config()?;
            let valid = cl_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cl_gateway::cli::load_config()?;
            cl_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("cookline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cl_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("cookline starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_blocking_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Recipe catalog ─────────────────────────────────────────────
    let recipes = Arc::new(
        RecipeRegistry::load(&config.recipes)
            .await
            .context("loading recipe catalog")?,
    );
    tracing::info!(source = ?config.recipes.source, "recipe catalog loaded");

    // ── Sessions ─────────────────────────────────────────────────────
    let sessions = Arc::new(SessionRegistry::new());

    // ── API token (dev mode if the env var isn't set) ─────────────────
    let api_token_hash = match std::env::var(&config.admin.api_token_env) {
        Ok(token) if !token.is_empty() => Some(Sha256::digest(token.as_bytes()).to_vec()),
        _ => {
            tracing::warn!("no API token configured; auth disabled (dev mode)");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        sessions,
        recipes,
        api_token_hash,
    };

    // ── CORS layer (config-aware) ────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router(state.clone()).layer(cors_layer).with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "cookline listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may contain a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). These are expanded into a predicate that
/// matches any port on that host. A literal `"*"` allows all origins
/// (not recommended for production).
fn build_cors_layer(cors: &cl_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let prefixes: Vec<String> = cors
        .allowed_origins
        .iter()
        .map(|o| o.trim_end_matches('*').to_string())
        .collect();

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        prefixes.iter().any(|p| origin.starts_with(p.as_str()))
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
