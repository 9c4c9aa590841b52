//! Question Pacer
//!
//! Server-paced rooms get one timer task per opened question. The task
//! sleeps for the time limit plus a grace period, then advances the room
//! if the cursor is still where it was. When the cursor moved (a moderator
//! advanced or ended the room) the task stops; the transition that moved
//! it started its own timer.

use std::time::Duration;

use crate::application::lifecycle::LifecycleUseCase;
use crate::domain::entity::room::Room;
use crate::domain::event::EventBus;
use crate::domain::repository::RoomRepository;
use crate::domain::value_object::room_status::RoomStatus;

pub fn spawn<R, B>(lifecycle: LifecycleUseCase<R, B>, room: &Room, grace: Duration)
where
    R: RoomRepository + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let room_id = room.id;
    let mut index = room.current_question_index;
    let wait = Duration::from_secs(u64::from(room.question_time_limit_secs)) + grace;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(wait).await;
            match lifecycle.advance_from(room_id, index).await {
                Ok(Some(next)) if next.status == RoomStatus::Active => {
                    index = next.current_question_index;
                }
                Ok(Some(_)) => break,
                Ok(None) => {
                    tracing::debug!(room_id = %room_id, question_index = index, "Pacer superseded");
                    break;
                }
                Err(e) => {
                    tracing::warn!(room_id = %room_id, error = %e, "Pacer failed to advance room");
                    break;
                }
            }
        }
    });
}
