//! Core logic of the chat client: the conversation store, its persistence,
//! and the session that streams model replies into it.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod model_client;
mod session;
pub mod storage;
pub mod store;

pub use conversation::{Chat, Message, Role};
pub use session::{Session, SessionBuilder, SessionSnapshot};
pub use store::{ConversationStore, StreamTicket, Submission};
