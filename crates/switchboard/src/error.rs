use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Process execution failed: {0}")]
    Process(String),

    #[error("Failed to decode completions: {0}")]
    Completions(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] switchboard_core::config::ConfigError),
}
