//! Conversation-related types.
//!
//! These types are also the persisted format, a conversation serializes
//! to `{"id": "...", "name": "...", "messages": [...]}`.

use little_chat_model::ModelMessage;
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person using the chat.
    User,
    /// The generation backend.
    Assistant,
}

/// One turn in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Position of the message in its conversation when it was created.
    /// Only unique within one conversation.
    pub id: u64,
    /// The author of the message.
    pub role: Role,
    /// The text of the message.
    pub content: String,
}

impl Message {
    #[inline]
    pub(crate) fn to_model_message(&self) -> ModelMessage {
        match self.role {
            Role::User => ModelMessage::User(self.content.clone()),
            Role::Assistant => ModelMessage::Assistant(self.content.clone()),
        }
    }
}

/// A named conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chat {
    /// Opaque identifier, assigned once at creation.
    pub id: String,
    /// Human readable label.
    pub name: String,
    /// Messages in creation order.
    pub messages: Vec<Message>,
}

impl Chat {
    /// Returns the id the next appended message will get.
    #[inline]
    pub(crate) fn next_message_id(&self) -> u64 {
        self.messages.len() as u64
    }

    /// Appends a message and returns its index.
    pub(crate) fn push_message(&mut self, role: Role, content: String) -> usize {
        let id = self.next_message_id();
        self.messages.push(Message { id, role, content });
        self.messages.len() - 1
    }
}
