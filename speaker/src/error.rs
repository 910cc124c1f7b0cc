use thiserror::Error;

/// Invalid speaker configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Problems with a single line of user input
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Unknown command: /{0}")]
    UnknownCommand(String),

    #[error("Invalid argument for /{command}: {reason}")]
    InvalidArgument { command: &'static str, reason: String },

    #[error("Text cannot be empty")]
    Empty,

    #[error("Text too long (max {max} characters)")]
    TooLong { max: usize },
}
