use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use little_chat_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
const MODEL_VAR: &str = "OPENAI_MODEL";
const DATA_DIR_VAR: &str = "LITTLE_CHAT_DATA_DIR";
const SYSTEM_PROMPT_VAR: &str = "LITTLE_CHAT_SYSTEM_PROMPT";

/// Settings of the chat client.
#[derive(Clone)]
pub struct Config {
    api_key: String,
    base_url: Option<String>,
    model: Option<String>,
    data_dir: PathBuf,
    system_prompt: Option<String>,
}

impl Config {
    /// Reads the settings from the environment.
    ///
    /// `OPENAI_API_KEY` is required. `OPENAI_BASE_URL`, `OPENAI_MODEL`,
    /// `LITTLE_CHAT_DATA_DIR` and `LITTLE_CHAT_SYSTEM_PROMPT` are optional.
    /// Empty variables count as unset.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        let api_key = var(API_KEY_VAR).ok_or(ConfigError {
            kind: ConfigErrorKind::MissingApiKey,
        })?;
        let data_dir = match var(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join("little-chat"))
                .ok_or(ConfigError {
                    kind: ConfigErrorKind::NoDataDir,
                })?,
        };
        Ok(Self {
            api_key,
            base_url: var(BASE_URL_VAR),
            model: var(MODEL_VAR),
            data_dir,
            system_prompt: var(SYSTEM_PROMPT_VAR),
        })
    }

    /// Returns the directory the conversations are saved in.
    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the system prompt, if one is configured.
    #[inline]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Returns the provider settings.
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        builder.build()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("data_dir", &self.data_dir)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConfigErrorKind {
    MissingApiKey,
    NoDataDir,
}

/// The error returned when the settings are incomplete.
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConfigErrorKind::MissingApiKey => {
                write!(f, "{API_KEY_VAR} environment variable is not set")
            }
            ConfigErrorKind::NoDataDir => write!(
                f,
                "cannot locate a data directory, set {DATA_DIR_VAR} instead"
            ),
        }
    }
}

impl StdError for ConfigError {}
