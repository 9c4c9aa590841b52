//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router, http,
    http::{Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use battle::application::ReleaseCodesUseCase;
use battle::domain::repository::RoomRepository;
use battle::{
    AnyQuizCatalog, BattleConfig, BroadcastEventBus, HttpQuizCatalog, JoinPolicy,
    MemoryBattleRepository, Pacing, PgBattleRepository, StaticQuizCatalog, battle_router,
    battle_router_generic,
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

/// Interval between code-release sweeps
const CODE_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,battle=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = battle_config()?;
    let catalog = quiz_catalog()?;
    let bus = BroadcastEventBus::new(config.event_channel_capacity);

    let use_memory_store = env::var("BATTLE_STORE").is_ok_and(|store| store == "memory");
    let battle = if use_memory_store {
        tracing::warn!("Using the in-memory store; rooms are lost on restart");
        let repo = MemoryBattleRepository::new();
        start_code_sweep(
            Arc::new(repo.clone()),
            Arc::new(bus.clone()),
            Arc::new(config.clone()),
        )
        .await;
        battle_router_generic(repo, catalog, bus, config)
    } else {
        // Database connection
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await?;

        tracing::info!("Connected to database");

        // Run migrations
        sqlx::migrate!("../../../database/migrations")
            .run(&pool)
            .await?;

        tracing::info!("Migrations completed");

        let repo = PgBattleRepository::new(pool);
        start_code_sweep(
            Arc::new(repo.clone()),
            Arc::new(bus.clone()),
            Arc::new(config.clone()),
        )
        .await;
        battle_router(repo, catalog, bus, config)
    };

    // Build router
    let app = Router::new()
        .nest("/api/battle", battle)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer());

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:31113".to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Battle configuration from the environment
fn battle_config() -> anyhow::Result<BattleConfig> {
    let mut config = if cfg!(debug_assertions) {
        BattleConfig::with_random_secret()
    } else {
        // In production, load secret from environment
        let secret_b64 = env::var("BATTLE_TOKEN_SECRET")
            .context("BATTLE_TOKEN_SECRET must be set in production")?;
        let secret_bytes = Engine::decode(&general_purpose::STANDARD, secret_b64.trim())?;
        let token_secret: [u8; 32] = secret_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("BATTLE_TOKEN_SECRET must decode to 32 bytes"))?;
        BattleConfig {
            token_secret,
            ..BattleConfig::default()
        }
    };

    config.join_policy = match env::var("BATTLE_JOIN_POLICY").as_deref() {
        Ok("late") => JoinPolicy::AllowLateJoin,
        Ok("waiting") | Err(_) => JoinPolicy::WaitingOnly,
        Ok(other) => anyhow::bail!("unknown BATTLE_JOIN_POLICY: {other}"),
    };

    config.pacing = match env::var("BATTLE_PACING").as_deref() {
        Ok("server") => Pacing::Server {
            grace: Duration::from_secs(2),
        },
        Ok("client") | Err(_) => Pacing::Client,
        Ok(other) => anyhow::bail!("unknown BATTLE_PACING: {other}"),
    };

    tracing::info!(
        join_policy = ?config.join_policy,
        pacing = ?config.pacing,
        "Battle configuration loaded"
    );
    Ok(config)
}

fn quiz_catalog() -> anyhow::Result<AnyQuizCatalog> {
    match env::var("QUIZ_CATALOG_URL") {
        Ok(url) => {
            tracing::info!(url = %url, "Using HTTP quiz catalog");
            Ok(AnyQuizCatalog::Http(HttpQuizCatalog::new(url)?))
        }
        Err(_) => {
            tracing::info!("QUIZ_CATALOG_URL not set; rooms need inline questions");
            Ok(AnyQuizCatalog::Static(StaticQuizCatalog::default()))
        }
    }
}

/// Release stale room codes once now, then hourly.
///
/// The bus must share topics with the router's so force-finished rooms
/// reach their subscribers. Errors here should not prevent server startup.
async fn start_code_sweep<R>(
    repo: Arc<R>,
    bus: Arc<BroadcastEventBus>,
    config: Arc<BattleConfig>,
) where
    R: RoomRepository + Send + Sync + 'static,
{
    let sweep = ReleaseCodesUseCase::new(repo, bus, config);
    match sweep.execute(chrono::Utc::now()).await {
        Ok(released) => {
            tracing::info!(codes_released = released, "Startup code sweep completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Startup code sweep failed, continuing anyway");
        }
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CODE_SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = sweep.execute(chrono::Utc::now()).await {
                tracing::warn!(error = %e, "Code sweep failed");
            }
        }
    });
}

fn cors_layer() -> CorsLayer {
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
}
