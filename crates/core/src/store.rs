//! The conversation store and its state transitions.

#[cfg(test)]
mod tests;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::conversation::{Chat, Message, Role};
use crate::storage::Storage;

/// The storage key holding the serialized conversation list.
pub const STORAGE_KEY: &str = "chats";

/// Identifies the reply that is currently being streamed.
///
/// A ticket is only honored while it is the store's current stream. Once the
/// stream completes, or its conversation is deleted, fragments carrying the
/// ticket are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamTicket {
    seq: u64,
    chat_id: String,
    message_idx: usize,
}

impl StreamTicket {
    /// Returns the id of the conversation receiving the reply.
    #[inline]
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Returns the sequence number of this stream, unique per store.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// An accepted submission.
#[derive(Clone, Debug)]
pub struct Submission {
    /// The ticket of the reply stream that has been opened.
    pub ticket: StreamTicket,
    /// The conversation history to generate a reply for, ending with the
    /// submitted user message.
    pub history: Vec<Message>,
}

/// All conversations, the active selection, the input buffer and the
/// in-flight reply stream.
///
/// Every change to the conversation list is written through to the storage
/// as a full rewrite of the list. Write failures are logged and otherwise
/// ignored, the in-memory state stays authoritative.
pub struct ConversationStore {
    storage: Box<dyn Storage>,
    chats: Vec<Chat>,
    active_id: Option<String>,
    input: String,
    stream: Option<StreamTicket>,
    next_stream_seq: u64,
    last_chat_id: u64,
}

impl ConversationStore {
    /// Loads the conversations saved in `storage`.
    ///
    /// Missing or unreadable data yields an empty store. Malformed data is
    /// left in place until the next write replaces it. The last conversation
    /// becomes the active one.
    pub fn load<S: Storage>(storage: S) -> Self {
        let chats = match storage.read(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Chat>>(&raw) {
                Ok(chats) => chats,
                Err(err) => {
                    warn!("ignoring malformed saved chats: {err}");
                    vec![]
                }
            },
            Ok(None) => vec![],
            Err(err) => {
                warn!("failed to read saved chats: {err}");
                vec![]
            }
        };
        debug!("loaded {} chats", chats.len());

        let active_id = chats.last().map(|chat| chat.id.clone());
        Self {
            storage: Box::new(storage),
            chats,
            active_id,
            input: String::new(),
            stream: None,
            next_stream_seq: 1,
            last_chat_id: 0,
        }
    }

    /// Returns all conversations in creation order.
    #[inline]
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// Looks up a conversation by id.
    #[inline]
    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == id)
    }

    /// Returns the id of the active conversation.
    #[inline]
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// Returns the active conversation.
    #[inline]
    pub fn active_chat(&self) -> Option<&Chat> {
        self.chat(self.active_id.as_deref()?)
    }

    /// Returns the pending input.
    #[inline]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns whether a reply is being streamed.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the ticket of the in-flight stream, if any.
    #[inline]
    pub fn stream_ticket(&self) -> Option<&StreamTicket> {
        self.stream.as_ref()
    }

    /// Creates an empty conversation and makes it active.
    pub fn create_chat(&mut self) -> &Chat {
        let chat = Chat {
            id: self.mint_chat_id(),
            name: format!("Chat {}", self.chats.len() + 1),
            messages: vec![],
        };
        debug!("created chat {} ({})", chat.id, chat.name);
        self.active_id = Some(chat.id.clone());
        self.chats.push(chat);
        self.persist();
        &self.chats[self.chats.len() - 1]
    }

    /// Renames a conversation. Blank names are ignored.
    ///
    /// Returns whether the conversation was renamed.
    pub fn rename_chat(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            debug!("ignoring blank name for chat {id}");
            return false;
        }
        let Some(chat) = self.chats.iter_mut().find(|chat| chat.id == id) else {
            return false;
        };
        chat.name = name.to_owned();
        self.persist();
        true
    }

    /// Deletes a conversation.
    ///
    /// If it was active, the last remaining conversation becomes active. If
    /// it was receiving a reply, the stream is abandoned.
    pub fn delete_chat(&mut self, id: &str) -> bool {
        let Some(idx) = self.chats.iter().position(|chat| chat.id == id) else {
            return false;
        };
        self.chats.remove(idx);
        debug!("deleted chat {id}");

        if self.stream.as_ref().is_some_and(|t| t.chat_id == id) {
            debug!("abandoning the reply stream of chat {id}");
            self.stream = None;
        }
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.chats.last().map(|chat| chat.id.clone());
        }
        self.persist();
        true
    }

    /// Deletes every conversation and removes the saved entry.
    pub fn clear_all(&mut self) {
        debug!("clearing {} chats", self.chats.len());
        self.chats.clear();
        self.active_id = None;
        if self.stream.take().is_some() {
            debug!("abandoning the reply stream");
        }
        if let Err(err) = self.storage.remove(STORAGE_KEY) {
            error!("failed to remove saved chats: {err}");
        }
    }

    /// Selects the active conversation. Unknown ids are ignored.
    pub fn set_active(&mut self, id: &str) -> bool {
        if self.chat(id).is_none() {
            return false;
        }
        self.active_id = Some(id.to_owned());
        true
    }

    /// Replaces the pending input.
    #[inline]
    pub fn set_input<S: Into<String>>(&mut self, input: S) {
        self.input = input.into();
    }

    /// Submits the pending input to the active conversation.
    ///
    /// The submission is rejected, without any change, when the input is
    /// blank, a reply is already streaming, or there is no active
    /// conversation. Otherwise the trimmed input is appended as a user
    /// message, followed by an empty assistant message that receives the
    /// reply fragments.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.input.trim().is_empty() {
            debug!("ignoring blank submission");
            return None;
        }
        if self.stream.is_some() {
            debug!("ignoring submission while a reply is streaming");
            return None;
        }
        let Some(chat_id) = self.active_id.clone() else {
            debug!("ignoring submission without an active chat");
            return None;
        };
        let chat = self.chats.iter_mut().find(|chat| chat.id == chat_id)?;

        let text = self.input.trim().to_owned();
        chat.push_message(Role::User, text);
        let history = chat.messages.clone();
        let message_idx = chat.push_message(Role::Assistant, String::new());
        self.input.clear();

        let ticket = StreamTicket {
            seq: self.next_stream_seq,
            chat_id,
            message_idx,
        };
        self.next_stream_seq += 1;
        self.stream = Some(ticket.clone());
        self.persist();

        Some(Submission { ticket, history })
    }

    /// Appends a fragment to the reply of the stream `ticket` refers to.
    ///
    /// The reply message is replaced with a new value, never edited in
    /// place. Returns the updated message, or `None` when the ticket is no
    /// longer current and the fragment was dropped.
    pub fn apply_fragment(
        &mut self,
        ticket: &StreamTicket,
        fragment: &str,
    ) -> Option<&Message> {
        if self.stream.as_ref() != Some(ticket) {
            trace!("dropping fragment of stale stream {}", ticket.seq);
            return None;
        }
        let idx = ticket.message_idx;
        let chat = self
            .chats
            .iter_mut()
            .find(|chat| chat.id == ticket.chat_id)?;
        let current = chat.messages.get(idx)?;
        let updated = Message {
            id: current.id,
            role: current.role,
            content: format!("{}{fragment}", current.content),
        };
        chat.messages[idx] = updated;
        self.persist();

        self.chat(&ticket.chat_id).map(|chat| &chat.messages[idx])
    }

    /// Ends the stream `ticket` refers to, freezing its reply.
    ///
    /// Returns whether the ticket was current.
    pub fn complete_stream(&mut self, ticket: &StreamTicket) -> bool {
        if self.stream.as_ref() != Some(ticket) {
            return false;
        }
        self.stream = None;
        true
    }

    /// Ends the stream `ticket` refers to after the reply failed.
    ///
    /// A reply that never received a fragment is removed, so later requests
    /// don't carry an empty assistant turn. Partial replies are kept.
    /// Returns whether the ticket was current.
    pub fn fail_stream(&mut self, ticket: &StreamTicket) -> bool {
        if !self.complete_stream(ticket) {
            return false;
        }
        let Some(chat) = self
            .chats
            .iter_mut()
            .find(|chat| chat.id == ticket.chat_id)
        else {
            return true;
        };
        let is_empty_tail = ticket.message_idx + 1 == chat.messages.len()
            && chat.messages[ticket.message_idx].content.is_empty();
        if is_empty_tail {
            chat.messages.pop();
            debug!("removed the empty reply of chat {}", ticket.chat_id);
            self.persist();
        }
        true
    }

    fn mint_chat_id(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let mut candidate = now.max(self.last_chat_id + 1);
        while self.chat(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        self.last_chat_id = candidate;
        candidate.to_string()
    }

    fn persist(&mut self) {
        let serialized = match serde_json::to_string(&self.chats) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!("failed to serialize chats: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.write(STORAGE_KEY, &serialized) {
            error!("failed to save chats: {err}");
        }
    }
}
