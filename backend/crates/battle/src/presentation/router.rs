//! Battle Router

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::application::config::BattleConfig;
use crate::domain::catalog::QuizCatalog;
use crate::domain::event::EventBus;
use crate::domain::repository::BattleStore;
use crate::infra::broadcast::BroadcastEventBus;
use crate::infra::catalog::AnyQuizCatalog;
use crate::infra::postgres::PgBattleRepository;
use crate::presentation::handlers::{self, BattleAppState};
use crate::presentation::ws;

/// Create the Battle router with the PostgreSQL repository
pub fn battle_router(
    repo: PgBattleRepository,
    catalog: AnyQuizCatalog,
    bus: BroadcastEventBus,
    config: BattleConfig,
) -> Router {
    battle_router_generic(repo, catalog, bus, config)
}

/// Create a generic Battle router for any repository implementation.
///
/// `{room}` is a room code on the player-facing routes (info, join,
/// events) and a room id on the rest.
pub fn battle_router_generic<R, C, B>(repo: R, catalog: C, bus: B, config: BattleConfig) -> Router
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let state = BattleAppState {
        repo: Arc::new(repo),
        catalog: Arc::new(catalog),
        bus: Arc::new(bus),
        config: Arc::new(config),
    };

    Router::new()
        .route("/rooms", post(handlers::create_room::<R, C, B>))
        .route("/rooms/{room}", get(handlers::room_info::<R, C, B>))
        .route("/rooms/{room}/join", post(handlers::join_room::<R, C, B>))
        .route("/rooms/{room}/events", get(ws::room_events::<R, C, B>))
        .route("/rooms/{room}/start", post(handlers::start_room::<R, C, B>))
        .route("/rooms/{room}/advance", post(handlers::advance_room::<R, C, B>))
        .route("/rooms/{room}/end", post(handlers::end_room::<R, C, B>))
        .route("/rooms/{room}/answers", post(handlers::submit_answer::<R, C, B>))
        .route(
            "/rooms/{room}/leaderboard",
            get(handlers::leaderboard::<R, C, B>),
        )
        .route(
            "/rooms/{room}/participants/{participant}/answers",
            get(handlers::review_answers::<R, C, B>),
        )
        .with_state(state)
}
