use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use maestro_domain::config::{Config, ConfigSeverity};
use maestro_gateway::cli::{self, Cli, Command, ConfigCommand};
use maestro_gateway::runtime::{AgentRuntime, HttpToolTransport};
use maestro_gateway::state::AppState;
use maestro_gateway::api;
use maestro_providers::{EmbeddingGateway, ProviderRegistry};
use maestro_retrieval::{DocIndexer, RetrievalEngine, VectorStore};
use maestro_sessions::{spawn_reclaimer, ContextStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _path) = cli::load_config(&cli)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, path) = cli::load_config(&cli)?;
            if !cli::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _path) = cli::load_config(&cli)?;
            cli::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("maestro {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,maestro_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the gateway with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("maestro starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Context store + reclaimer ────────────────────────────────────
    let store = Arc::new(ContextStore::new(
        config.sessions.window_max,
        config.sessions.idle_timeout_hours,
    ));
    spawn_reclaimer(store.clone(), config.sessions.sweep_interval_sec);
    tracing::info!(
        window_max = config.sessions.window_max,
        idle_hours = config.sessions.idle_timeout_hours,
        "context store ready"
    );

    // ── LLM provider ─────────────────────────────────────────────────
    let llm = Arc::new(ProviderRegistry::from_config(&config.llm));
    if !llm.is_enabled() {
        tracing::warn!(
            reason = llm.disabled_reason().unwrap_or("unknown"),
            "no LLM provider — classifier and runtime will use fallback paths"
        );
    }

    // ── Retrieval stack ──────────────────────────────────────────────
    let embedder = Arc::new(EmbeddingGateway::new(
        llm.clone(),
        config.retrieval.vector_dim,
    ));
    let vector_store = Arc::new(
        VectorStore::new(
            &config.retrieval.qdrant_url,
            &config.retrieval.collection,
            config.retrieval.vector_dim,
            embedder,
        )
        .context("initializing vector store")?,
    );
    let engine = Arc::new(RetrievalEngine::new(vector_store, &config.retrieval));
    let indexer = Arc::new(DocIndexer::new(
        engine.clone(),
        config.retrieval.chunk_size,
        config.retrieval.chunk_overlap,
    ));
    tracing::info!(
        qdrant = %config.retrieval.qdrant_url,
        collection = %config.retrieval.collection,
        dimension = config.retrieval.vector_dim,
        "retrieval engine ready"
    );

    // ── Runtime ──────────────────────────────────────────────────────
    let transport = Arc::new(
        HttpToolTransport::new(config.services.clone(), engine.clone())
            .context("initializing tool transport")?,
    );
    let runtime = Arc::new(AgentRuntime::new(
        store.clone(),
        llm.clone(),
        transport,
    ));
    tracing::info!(timeout_sec = config.services.timeout_sec, "agent runtime ready");

    let state = AppState {
        config: config.clone(),
        store,
        llm,
        engine,
        indexer,
        runtime,
    };

    // ── CORS + admission control ─────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);
    let max_concurrent = config.server.max_concurrent;
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router(state)
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "maestro listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may carry a trailing `:*` wildcard for the port segment
/// (e.g. `http://localhost:*`). A literal `"*"` allows all origins
/// (not recommended for production).
fn build_cors_layer(cors: &maestro_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            let origin_str = origin.to_str().unwrap_or("");
            // The remainder after the prefix must be digits only, so
            // "http://localhost:3000.evil.com" cannot sneak through.
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
