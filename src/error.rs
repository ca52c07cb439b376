//! # Error Types
//!
//! Custom error types for Rover Link using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Link
#[derive(Debug, Error)]
pub enum RoverLinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote shell (SSH) errors
    #[error("SSH error: {0}")]
    Ssh(String),

    /// A request was issued on a channel that is not open
    #[error("{0} not connected")]
    NotConnected(&'static str),

    /// The server did not answer within the channel's read timeout
    #[error("timeout")]
    Timeout,

    /// The server closed the stream instead of answering
    #[error("no response from server")]
    NoResponse,

    /// The server answered with an explicit failure
    #[error("{0}")]
    Rejected(String),

    /// The server answered with a line outside the channel grammar
    #[error("unexpected response: {0}")]
    UnexpectedReply(String),

    /// Gamepad device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad attached
    #[error("No gamepad found")]
    ControllerNotFound,
}

impl From<ssh2::Error> for RoverLinkError {
    fn from(e: ssh2::Error) -> Self {
        RoverLinkError::Ssh(e.message().to_string())
    }
}

/// Result type alias for Rover Link
pub type Result<T> = std::result::Result<T, RoverLinkError>;
