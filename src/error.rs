//! Error types for aggregation operations.

use std::fmt;
use thiserror::Error;

/// Server error code reported when a `maxTimeMS` budget runs out.
pub const MAX_TIME_MS_EXPIRED: i32 = 50;

/// The round trip of a drain loop an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    /// The initial `aggregate` command.
    Initial,
    /// A `getMore` issued against an open cursor.
    Continuation {
        /// Cursor the continuation addressed.
        cursor_id: i64,
    },
}

impl fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainPhase::Initial => f.write_str("initial aggregate command"),
            DrainPhase::Continuation { cursor_id } => {
                write!(f, "getMore on cursor {}", cursor_id)
            }
        }
    }
}

/// All errors that can occur while running an aggregation.
#[derive(Debug, Error)]
pub enum MongoError {
    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Command failure reported by the server (`ok: 0`).
    #[error("command error: {message}")]
    Command {
        /// Error code from server.
        code: i32,
        /// Symbolic error name from server, when sent.
        code_name: Option<String>,
        /// Error message.
        message: String,
    },

    /// Invalid argument, raised before any network activity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A server reply did not have the expected cursor shape.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Cursor exhausted.
    #[error("cursor exhausted")]
    CursorExhausted,

    /// Operation timeout.
    #[error("operation timed out")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// BSON error.
    #[error("bson error: {0}")]
    Bson(String),

    /// A transport or server error annotated with the drain phase it happened in.
    #[error("{phase} failed: {source}")]
    Aggregate {
        /// Where in the drain loop the failure surfaced.
        phase: DrainPhase,
        /// The underlying error.
        #[source]
        source: Box<MongoError>,
    },
}

impl MongoError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        MongoError::Connection(msg.into())
    }

    /// Create a command error.
    pub fn command(code: i32, message: impl Into<String>) -> Self {
        MongoError::Command {
            code,
            code_name: None,
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        MongoError::InvalidArgument(msg.into())
    }

    /// Create a protocol violation error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        MongoError::Protocol(msg.into())
    }

    /// Wrap an error with the drain phase it occurred in.
    ///
    /// Already-annotated errors are returned untouched.
    pub fn in_phase(self, phase: DrainPhase) -> Self {
        match self {
            err @ MongoError::Aggregate { .. } => err,
            err => MongoError::Aggregate {
                phase,
                source: Box::new(err),
            },
        }
    }

    /// The drain phase this error was annotated with, if any.
    pub fn phase(&self) -> Option<DrainPhase> {
        match self {
            MongoError::Aggregate { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The error with any phase annotation stripped.
    pub fn root(&self) -> &MongoError {
        match self {
            MongoError::Aggregate { source, .. } => source.root(),
            err => err,
        }
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.root(),
            MongoError::Connection(_) | MongoError::Network(_)
        )
    }

    /// Check if this is a timeout, client-side or server-enforced.
    pub fn is_timeout(&self) -> bool {
        match self.root() {
            MongoError::Timeout => true,
            MongoError::Command { code, .. } => *code == MAX_TIME_MS_EXPIRED,
            _ => false,
        }
    }

    /// Check if this error was raised by argument validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.root(), MongoError::InvalidArgument(_))
    }

    /// Get the server error code if available.
    pub fn code(&self) -> Option<i32> {
        match self.root() {
            MongoError::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<bson::ser::Error> for MongoError {
    fn from(err: bson::ser::Error) -> Self {
        MongoError::Bson(err.to_string())
    }
}

impl From<bson::de::Error> for MongoError {
    fn from(err: bson::de::Error) -> Self {
        MongoError::Deserialization(err.to_string())
    }
}

/// Result type alias for aggregation operations.
pub type Result<T> = std::result::Result<T, MongoError>;

/// Error kind enumeration for pattern matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection error.
    Connection,
    /// Authentication error.
    Authentication,
    /// Argument validation error.
    InvalidArgument,
    /// Malformed server reply.
    Protocol,
    /// Command error.
    Command,
    /// Timeout error.
    Timeout,
    /// Serialization error.
    Serialization,
    /// Internal error.
    Internal,
    /// Network error.
    Network,
}

impl MongoError {
    /// Get the error kind, looking through any phase annotation.
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            MongoError::Connection(_) => ErrorKind::Connection,
            MongoError::Authentication(_) => ErrorKind::Authentication,
            MongoError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MongoError::Protocol(_) => ErrorKind::Protocol,
            MongoError::Command { code, .. } if *code == MAX_TIME_MS_EXPIRED => ErrorKind::Timeout,
            MongoError::Command { .. } => ErrorKind::Command,
            MongoError::Timeout => ErrorKind::Timeout,
            MongoError::Deserialization(_) | MongoError::Bson(_) => ErrorKind::Serialization,
            MongoError::Network(_) => ErrorKind::Network,
            MongoError::CursorExhausted
            | MongoError::Internal(_)
            | MongoError::Aggregate { .. } => ErrorKind::Internal,
        }
    }
}
