//! The contract between a chat session and a text-generation backend.
//!
//! A backend receives the whole history of one conversation and answers
//! with a lazily streamed reply. The reply is delivered as an ordered,
//! finite sequence of text fragments that cannot be restarted once it has
//! been consumed.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
