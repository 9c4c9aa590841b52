//! Realtime Subscription Endpoint
//!
//! `GET /api/battle/rooms/{code}/events` upgrades to a WebSocket that
//! first sends a snapshot (room + leaderboard) and then every event
//! published on the room's topic, one JSON text frame each. The
//! subscription is opened before the snapshot is read, so nothing
//! committed after the snapshot can be missed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use crate::application::{LeaderboardUseCase, RoomInfoUseCase};
use crate::domain::catalog::QuizCatalog;
use crate::domain::event::{EventBus, EventStream};
use crate::domain::repository::BattleStore;
use crate::error::BattleResult;
use crate::presentation::dto::{LeaderboardEntry, RoomView, SnapshotFrame};
use crate::presentation::handlers::BattleAppState;

/// GET /api/battle/rooms/{code}/events
pub async fn room_events<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> BattleResult<Response>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let (snapshot, events) = subscribe_with_snapshot(&state, &code).await?;
    let room_code = code.trim().to_string();
    let snapshot = serde_json::to_string(&snapshot)?;
    Ok(ws.on_upgrade(move |socket| forward_events(socket, snapshot, events, room_code)))
}

/// Open the room's event stream, then read the snapshot that precedes it
pub(crate) async fn subscribe_with_snapshot<R, C, B>(
    state: &BattleAppState<R, C, B>,
    code: &str,
) -> BattleResult<(SnapshotFrame, EventStream)>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let info = RoomInfoUseCase::new(state.repo.clone())
        .execute(code)
        .await?;
    let events = state.bus.subscribe(&info.room.code).await;

    let board = LeaderboardUseCase::new(state.repo.clone())
        .execute(info.room.id)
        .await?;
    let snapshot = SnapshotFrame::Snapshot {
        room: RoomView::new(&board.room, Some(board.entries.len() as u32)),
        leaderboard: board.entries.iter().map(LeaderboardEntry::from).collect(),
    };
    Ok((snapshot, events))
}

async fn forward_events(
    socket: WebSocket,
    snapshot: String,
    mut events: EventStream,
    room_code: String,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(room_code = %room_code, "Event subscriber connected");

    if sender.send(Message::Text(snapshot.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(envelope) = event else { break };
                let frame = match serde_json::to_string(&envelope) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(
                            room_code = %room_code,
                            error = %e,
                            "Failed to encode event"
                        );
                        continue;
                    }
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // The channel is one-way; pings are answered by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(room_code = %room_code, "Event subscriber disconnected");
}
