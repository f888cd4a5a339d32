use serde::{Deserialize, Serialize};

/// A single chat message, as clients send it and as the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user: String,
    pub role: String,
    pub content: String,
}

/// Text frame exchanged over a room's session channel.
///
/// Frames with a `type` we do not know decode to [`Envelope::Other`]; they are
/// still relayed but never touch the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    All { messages: Vec<ChatMessage> },
    Add(ChatMessage),
    Update(ChatMessage),
    Notification { message: String },
    #[serde(other)]
    Other,
}

impl Envelope {
    /// The message carried by an `add` or `update` envelope.
    pub fn into_upsert(self) -> Option<ChatMessage> {
        match self {
            Envelope::Add(message) | Envelope::Update(message) => Some(message),
            _ => None,
        }
    }
}
