use little_chat_model::ModelProvider;

use super::{FragmentFn, IdleFn, Session, SessionState};
use crate::conversation::Message;
use crate::model_client::ModelClient;
use crate::storage::{MemoryStorage, Storage};
use crate::store::ConversationStore;

/// [`Session`] builder.
pub struct SessionBuilder {
    model_client: ModelClient,
    storage: Option<Box<dyn Storage>>,
    system_prompt: Option<String>,
    on_idle: Option<IdleFn>,
    on_fragment: Option<FragmentFn>,
}

impl SessionBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            storage: None,
            system_prompt: None,
            on_idle: None,
            on_fragment: None,
        }
    }

    /// Sets the storage the conversations are loaded from and saved to.
    ///
    /// Without it, conversations only live in memory.
    #[inline]
    pub fn with_storage<S: Storage>(mut self, storage: S) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Sets the system prompt sent ahead of every conversation. It is not
    /// stored in the conversations.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Attaches a callback to be invoked when the session becomes idle,
    /// either because a reply has ended or a message has been ignored.
    #[inline]
    pub fn on_idle(
        mut self,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Attaches a callback to be invoked after each reply fragment has been
    /// applied, with the conversation id and the updated reply.
    #[inline]
    pub fn on_fragment(
        mut self,
        on_fragment: impl Fn(&str, &Message) + Send + Sync + 'static,
    ) -> Self {
        self.on_fragment = Some(Box::new(on_fragment));
        self
    }

    /// Loads the conversations and starts the session.
    ///
    /// This must be called from within a Tokio runtime.
    pub fn build(self) -> Session {
        let Self {
            model_client,
            storage,
            system_prompt,
            on_idle,
            on_fragment,
        } = self;

        let store = match storage {
            Some(storage) => ConversationStore::load(storage),
            None => ConversationStore::load(MemoryStorage::new()),
        };
        Session::spawn(SessionState {
            store,
            model_client,
            system_prompt,
            running_stream: None,
            on_idle,
            on_fragment,
        })
    }
}
