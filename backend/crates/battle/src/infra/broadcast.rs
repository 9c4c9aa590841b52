//! In-Process Event Bus
//!
//! One `tokio::sync::broadcast` channel per room topic, created on first
//! subscribe and dropped once its last subscriber is gone. The per-topic
//! sequence counter outlives the channel, so `seq` keeps increasing for a
//! code across reconnects. Topics are keyed by room code, which bounds the
//! map by the size of the code space.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::domain::event::{BattleEvent, EventBus, EventEnvelope, EventStream};
use crate::domain::value_object::room_code::RoomCode;

#[derive(Default)]
struct Topic {
    sender: Option<broadcast::Sender<EventEnvelope>>,
    seq: u64,
}

/// Broadcast-channel event bus for single-node deployments
#[derive(Clone)]
pub struct BroadcastEventBus {
    topics: Arc<Mutex<HashMap<String, Topic>>>,
    capacity: usize,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        // Topic state stays consistent even if a holder panicked.
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live subscribers on a topic
    pub fn subscriber_count(&self, topic: &RoomCode) -> usize {
        self.topics()
            .get(topic.as_str())
            .and_then(|t| t.sender.as_ref())
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl EventBus for BroadcastEventBus {
    async fn publish(&self, topic: &RoomCode, event: BattleEvent) {
        let mut topics = self.topics();
        let entry = topics.entry(topic.as_str().to_string()).or_default();
        entry.seq += 1;

        let Some(sender) = entry.sender.as_ref() else {
            return;
        };
        let name = event.name();
        let envelope = EventEnvelope {
            topic: topic.as_str().to_string(),
            seq: entry.seq,
            emitted_at: Utc::now(),
            event,
        };
        match sender.send(envelope) {
            Ok(receivers) => {
                tracing::trace!(
                    topic = %topic,
                    event = name,
                    seq = entry.seq,
                    receivers,
                    "Event published"
                );
            }
            Err(_) => {
                entry.sender = None;
                tracing::debug!(topic = %topic, "Last subscriber gone, topic channel dropped");
            }
        }
    }

    async fn subscribe(&self, topic: &RoomCode) -> EventStream {
        let receiver = {
            let mut topics = self.topics();
            let entry = topics.entry(topic.as_str().to_string()).or_default();
            let capacity = self.capacity;
            entry
                .sender
                .get_or_insert_with(|| broadcast::channel(capacity).0)
                .subscribe()
        };

        let topic = topic.clone();
        BroadcastStream::new(receiver)
            .filter_map(move |item| {
                let result = match item {
                    Ok(envelope) => Some(envelope),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            topic = %topic,
                            skipped,
                            "Subscriber lagged, events dropped"
                        );
                        None
                    }
                };
                futures::future::ready(result)
            })
            .boxed()
    }
}
