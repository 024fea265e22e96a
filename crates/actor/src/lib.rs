//! A lightweight single-threaded actor runtime.
//!
//! An actor owns its state exclusively. Every interaction with the state
//! is a [`Message`] that is handled on the actor's own task, one message at
//! a time and in the order the messages were sent. This gives callers a
//! serialized view of the state without any locking.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod query;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;
