use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

use crate::utils::paths::AppPaths;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value '{value}' for {setting}: {reason}")]
    InvalidValue {
        setting: Setting,
        value: String,
        reason: String,
    },
}

/// Session configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Replies to an input request that end the session.
    pub exit_words: Vec<String>,
    /// Pause between streamed chunks of engine output.
    pub stream_delay_ms: u64,
    /// Ask before `/clear` wipes the conversation.
    pub confirm_clear: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exit_words: vec!["q".to_string(), "quit".to_string()],
            stream_delay_ms: 40,
            confirm_clear: true,
            log_dir: None,
        }
    }
}

/// Settings that can be read and changed at runtime with `/config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Setting {
    ExitWords,
    StreamDelayMs,
    ConfirmClear,
}

impl Setting {
    pub fn names() -> Vec<String> {
        Self::iter().map(|s| s.to_string()).collect()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Setting::ExitWords => "Comma-separated replies that end the session",
            Setting::StreamDelayMs => "Milliseconds between streamed output chunks",
            Setting::ConfirmClear => "Ask for confirmation before /clear",
        }
    }

    /// Suggested values for autocompletion.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Setting::ExitWords => vec!["q,quit".to_string()],
            Setting::StreamDelayMs => vec!["0".to_string(), "40".to_string(), "200".to_string()],
            Setting::ConfirmClear => vec!["true".to_string(), "false".to_string()],
        }
    }
}

impl SessionConfig {
    /// Get the path to the user-level config file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        AppPaths::user_config().ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the first discovered config file, or return defaults if none exists
    pub fn load() -> Result<Self, ConfigError> {
        match AppPaths::discover_configs().first() {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields defaults; an unparseable one
    /// is reported in the log and also yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, setting: Setting) -> String {
        match setting {
            Setting::ExitWords => self.exit_words.join(","),
            Setting::StreamDelayMs => self.stream_delay_ms.to_string(),
            Setting::ConfirmClear => self.confirm_clear.to_string(),
        }
    }

    pub fn set(&mut self, setting: Setting, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            setting,
            value: value.to_string(),
            reason,
        };

        match setting {
            Setting::ExitWords => {
                let words: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect();
                if words.is_empty() {
                    return Err(invalid("at least one exit word is required".to_string()));
                }
                self.exit_words = words;
            }
            Setting::StreamDelayMs => {
                self.stream_delay_ms = value.parse().map_err(|e| invalid(format!("{e}")))?;
            }
            Setting::ConfirmClear => {
                self.confirm_clear = value.parse().map_err(|e| invalid(format!("{e}")))?;
            }
        }
        Ok(())
    }

    pub fn is_exit_word(&self, input: &str) -> bool {
        let input = input.trim();
        self.exit_words.iter().any(|word| word == input)
    }
}
