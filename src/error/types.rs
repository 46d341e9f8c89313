//! Error types
//!
//! Defines domain-specific error types for each concern of the relay.

use std::fmt;
use std::io;

/// Reasons a single frame is rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    Empty,
    UnknownTag(String),
    MissingField(&'static str),
    EmptyUsername,
    InvalidUsername(String),
    UsernameTooLong { length: usize, max: usize },
    TooLong(usize),
    InvalidUtf8,
    WrongTransport(&'static str),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Empty => write!(f, "Empty frame"),
            FrameError::UnknownTag(tag) => write!(f, "Unknown frame tag: {}", tag),
            FrameError::MissingField(field) => write!(f, "Missing field: {}", field),
            FrameError::EmptyUsername => write!(f, "Username cannot be empty"),
            FrameError::InvalidUsername(u) => write!(f, "Invalid username: {:?}", u),
            FrameError::UsernameTooLong { length, max } => {
                write!(f, "Username too long: {} bytes (max {})", length, max)
            }
            FrameError::TooLong(max) => write!(f, "Frame exceeds {} bytes", max),
            FrameError::InvalidUtf8 => write!(f, "Frame is not valid UTF-8"),
            FrameError::WrongTransport(tag) => {
                write!(f, "{} frames are not accepted on this channel", tag)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Outcome of a failed read on a reliable connection
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Malformed(FrameError),
}

impl ReadError {
    /// Transport failures end the connection; malformed frames do not
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadError::Io(_))
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Io(e) => write!(f, "Read failed: {}", e),
            ReadError::Malformed(e) => write!(f, "Malformed frame: {}", e),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        ReadError::Io(error)
    }
}

impl From<FrameError> for ReadError {
    fn from(error: FrameError) -> Self {
        ReadError::Malformed(error)
    }
}

/// Per-recipient delivery failures
#[derive(Debug)]
pub enum DeliveryError {
    Io(io::Error),
    TimedOut,
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Io(e) => write!(f, "Send failed: {}", e),
            DeliveryError::TimedOut => write!(f, "Send timed out"),
            DeliveryError::Closed => write!(f, "Connection already closed"),
        }
    }
}

impl std::error::Error for DeliveryError {}

impl From<io::Error> for DeliveryError {
    fn from(error: io::Error) -> Self {
        DeliveryError::Io(error)
    }
}

/// Relay-level errors that stop the whole process
#[derive(Debug)]
pub enum RelayError {
    Config(config::ConfigError),
    Bind(String, io::Error),
    Receive(io::Error),
    Accept(io::Error),
    Io(io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            RelayError::Receive(e) => write!(f, "Datagram receive failed: {}", e),
            RelayError::Accept(e) => write!(f, "Stream listener failed: {}", e),
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Config(e) => Some(e),
            RelayError::Bind(_, e)
            | RelayError::Receive(e)
            | RelayError::Accept(e)
            | RelayError::Io(e) => Some(e),
        }
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}
