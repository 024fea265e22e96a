//! A terminal chat client that keeps named conversations with an
//! OpenAI-compatible model and streams the replies as they are generated.
//!
//! The crate includes a CLI tool for using in the terminal. It can also be
//! used as a library, see [`session_builder`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod command;
mod config;

use little_chat_core::SessionBuilder;
use little_chat_core::storage::FileStorage;
use little_chat_openai_model::OpenAIProvider;

pub use config::{Config, ConfigError};

/// Re-exports of [`little_chat_core`] crate.
pub mod core {
    pub use little_chat_core::*;
}

/// Creates a session builder from `config`, with conversations saved in the
/// configured data directory and replies generated by an OpenAI-compatible
/// provider.
pub fn session_builder(config: &Config) -> SessionBuilder {
    let storage = FileStorage::new(config.data_dir());
    info!("using data directory {}", storage.dir().display());

    let provider = OpenAIProvider::new(config.openai_config());
    let builder = SessionBuilder::with_model_provider(provider)
        .with_storage(storage);
    match config.system_prompt() {
        Some(prompt) => builder.with_system_prompt(prompt),
        None => builder,
    }
}
