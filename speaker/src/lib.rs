pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod validation;

pub use config::SpeakerConfig;
pub use host::{Flow, Host};
