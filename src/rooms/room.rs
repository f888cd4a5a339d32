use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::{MessageStore, RelayError};

use super::msg::{ChatMessage, Envelope};

pub type SessionId = Uuid;

/// A frame body, relayed in the form it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn decode(&self) -> Result<Envelope, serde_json::Error> {
        serde_json::from_slice(self.as_bytes())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<&String> for Payload {
    fn from(text: &String) -> Self {
        Payload::Text(text.clone())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

/// One fan-out unit: a payload and the sessions that must not see it.
#[derive(Debug)]
pub struct Frame {
    pub payload: Payload,
    exclude: Vec<SessionId>,
}

impl Frame {
    fn is_for(&self, session: SessionId) -> bool {
        !self.exclude.contains(&session)
    }
}

/// A connected participant's view of a room.
pub struct Session {
    pub id: SessionId,
    /// The serialized `all` envelope to send before anything else.
    pub sync: String,
    rx: broadcast::Receiver<Arc<Frame>>,
}

impl Session {
    /// Next payload addressed to this session, or `None` once the room is gone.
    ///
    /// A session that falls behind skips the frames it missed.
    pub async fn next_frame(&mut self) -> Option<Payload> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if frame.is_for(self.id) => return Some(frame.payload.clone()),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %self.id, skipped, "session lagged, skipping frames");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Like [`Session::next_frame`] but never waits.
    pub fn try_next_frame(&mut self) -> Option<Payload> {
        loop {
            match self.rx.try_recv() {
                Ok(frame) if frame.is_for(self.id) => return Some(frame.payload.clone()),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %self.id, skipped, "session lagged, skipping frames");
                }
                Err(_) => return None,
            }
        }
    }
}

/// Coordinator for a single room: owns the message cache, syncs new sessions,
/// applies inbound messages and fans frames out.
///
/// The cache lock is held for the whole of every event, store writes included,
/// so events for one room never interleave.
pub struct Room {
    name: String,
    store: MessageStore,
    messages: Mutex<Vec<ChatMessage>>,
    tx: broadcast::Sender<Arc<Frame>>,
}

impl Room {
    /// Create the schema and hydrate the cache. A `Room` only exists once this
    /// has succeeded.
    pub async fn start(name: &str, store: MessageStore, capacity: usize) -> Result<Self, RelayError> {
        store.ensure_schema().await?;
        let messages = store.load_all().await?;
        tracing::info!(room = name, messages = messages.len(), "room started");

        Ok(Self {
            name: name.to_owned(),
            store,
            messages: Mutex::new(messages),
            tx: broadcast::channel(capacity.max(1)).0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of sessions currently subscribed.
    pub fn session_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().await.clone()
    }

    /// Register a new session. Its sync envelope and subscription are taken
    /// together, so it sees every later frame exactly once.
    pub async fn connect(&self) -> Result<Session, RelayError> {
        let messages = self.messages.lock().await;
        let sync = serde_json::to_string(&Envelope::All { messages: messages.clone() })?;
        let rx = self.tx.subscribe();
        let id = Uuid::now_v7();
        tracing::debug!(room = %self.name, session = %id, "session connected");

        Ok(Session { id, sync, rx })
    }

    /// Handle a raw frame from `sender`.
    ///
    /// The frame is relayed untouched, text or binary, to every other session
    /// first. Then, if it is an `add` or `update`, it is applied to the cache and
    /// persisted. A frame that does not decode is reported as
    /// [`RelayError::Json`] after the relay has happened.
    pub async fn on_message(&self, sender: SessionId, raw: impl Into<Payload>) -> Result<(), RelayError> {
        let raw = raw.into();
        let mut messages = self.messages.lock().await;

        self.fan_out(Frame {
            payload: raw.clone(),
            exclude: vec![sender],
        });

        let envelope = raw.decode()?;
        let Some(message) = envelope.into_upsert() else {
            return Ok(());
        };

        tracing::debug!(room = %self.name, session = %sender, message_id = %message.id, "applying message");
        upsert_cached(&mut messages, message.clone());
        self.store.upsert(&message).await?;

        Ok(())
    }

    /// Send `envelope` to every session not listed in `exclude`.
    pub async fn broadcast_message(&self, envelope: &Envelope, exclude: &[SessionId]) -> Result<(), RelayError> {
        let payload = serde_json::to_string(envelope)?;
        let _messages = self.messages.lock().await;

        self.fan_out(Frame {
            payload: Payload::Text(payload),
            exclude: exclude.to_vec(),
        });

        Ok(())
    }

    fn fan_out(&self, frame: Frame) {
        // no subscribers is fine
        let _ = self.tx.send(Arc::new(frame));
    }
}

/// Replace the entry with the same id in place, or append.
fn upsert_cached(messages: &mut Vec<ChatMessage>, message: ChatMessage) {
    match messages.iter_mut().find(|m| m.id == message.id) {
        Some(existing) => *existing = message,
        None => messages.push(message),
    }
}
