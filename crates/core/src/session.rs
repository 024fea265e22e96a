mod builder;
mod state;

use little_chat_actor::Actor;
use tokio::task::JoinHandle;

use crate::conversation::{Chat, Message};
use crate::model_client::ModelClient;
use crate::store::{ConversationStore, StreamTicket};
pub use builder::SessionBuilder;
use state::{
    ClearAll, CreateChat, DeleteChat, RenameChat, SelectChat, SendMessage,
};

type IdleFn = Box<dyn Fn() + Send + Sync>;
type FragmentFn = Box<dyn Fn(&str, &Message) + Send + Sync>;

/// A point-in-time copy of the session, for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// All conversations in creation order.
    pub chats: Vec<Chat>,
    /// The id of the active conversation.
    pub active_id: Option<String>,
    /// Whether a reply is being streamed.
    pub streaming: bool,
}

impl SessionSnapshot {
    /// Returns the active conversation.
    pub fn active_chat(&self) -> Option<&Chat> {
        let active_id = self.active_id.as_deref()?;
        self.chats.iter().find(|chat| chat.id == active_id)
    }
}

struct RunningStream {
    ticket: StreamTicket,
    task: JoinHandle<()>,
}

struct SessionState {
    store: ConversationStore,
    model_client: ModelClient,
    system_prompt: Option<String>,
    running_stream: Option<RunningStream>,

    on_idle: Option<IdleFn>,
    on_fragment: Option<FragmentFn>,
}

/// A chat session, which owns the conversations and streams replies from a
/// model provider into them.
///
/// Calls on the session are handled in the order they are made, one at a
/// time, no matter whether a reply is streaming. For example, a conversation
/// can be renamed while it receives a reply, and the rename is applied
/// between two fragments.
///
/// Only one reply streams at a time. Sending a message while a reply is
/// streaming is silently ignored.
#[derive(Clone)]
pub struct Session {
    handle: Actor<SessionState>,
}

impl Session {
    fn spawn(state: SessionState) -> Self {
        Self {
            handle: Actor::spawn(state, Some("session")),
        }
    }

    fn dispatch<M>(&self, msg: M)
    where
        M: little_chat_actor::Message<SessionState> + 'static,
    {
        if self.handle.send(msg).is_err() {
            warn!("the session has been closed");
        }
    }

    /// Creates a new conversation and makes it active.
    #[inline]
    pub fn create_chat(&self) {
        self.dispatch(CreateChat);
    }

    /// Renames a conversation. Blank names are ignored.
    #[inline]
    pub fn rename_chat<I: Into<String>, N: Into<String>>(&self, id: I, name: N) {
        self.dispatch(RenameChat {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Deletes a conversation. A reply streaming into it is abandoned.
    #[inline]
    pub fn delete_chat<I: Into<String>>(&self, id: I) {
        self.dispatch(DeleteChat(id.into()));
    }

    /// Deletes all conversations and their saved copy.
    #[inline]
    pub fn clear_all(&self) {
        self.dispatch(ClearAll);
    }

    /// Makes a conversation active.
    #[inline]
    pub fn select_chat<I: Into<String>>(&self, id: I) {
        self.dispatch(SelectChat(id.into()));
    }

    /// Sends a message to the active conversation and streams the reply.
    ///
    /// Blank messages, messages sent while a reply is streaming, and
    /// messages sent without an active conversation are ignored.
    #[inline]
    pub fn send_message<S: Into<String>>(&self, text: S) {
        self.dispatch(SendMessage(text.into()));
    }

    /// Returns a snapshot taken after every call made before this one has
    /// been handled, or `None` if the session is closed.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.handle
            .ask(|state: &mut SessionState| state.snapshot())
            .await
            .ok()
    }

    /// Stops the session. Pending calls may be dropped.
    #[inline]
    pub fn close(&self) {
        self.handle.try_kill();
    }
}
