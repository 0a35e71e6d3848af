//! Error types for the gossip engine.

use std::fmt;

/// Result type alias for gossip operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during gossip operations.
#[derive(Debug)]
pub enum Error {
    /// Inbound message was parseable but missing a required field.
    ///
    /// Fatal to that message's handling: the handler aborts without
    /// replying and the harness is responsible for surfacing it.
    MalformedRequest(String),

    /// Failed to decode an inbound message body.
    Decode(String),

    /// Failed to encode an outbound message body.
    Encode(String),

    /// A send attempt to a neighbor failed or timed out.
    ///
    /// Recoverable: the dispatcher retries indefinitely. This variant only
    /// surfaces from transports, never to the original client.
    Send {
        /// Target node that we failed to send to.
        target: String,
        /// Underlying error message.
        reason: String,
    },

    /// Internal channel error.
    Channel(String),

    /// The engine has been shut down.
    Shutdown,

    /// Generic IO error.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedRequest(msg) => {
                write!(f, "malformed request: {}", msg)
            }
            Error::Decode(msg) => {
                write!(f, "failed to decode message: {}", msg)
            }
            Error::Encode(msg) => {
                write!(f, "failed to encode message: {}", msg)
            }
            Error::Send { target, reason } => {
                write!(f, "failed to send to {}: {}", target, reason)
            }
            Error::Channel(msg) => {
                write!(f, "channel error: {}", msg)
            }
            Error::Shutdown => {
                write!(f, "gossip engine has been shut down")
            }
            Error::Io(err) => {
                write!(f, "IO error: {}", err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl<T> From<async_channel::SendError<T>> for Error {
    fn from(err: async_channel::SendError<T>) -> Self {
        Error::Channel(err.to_string())
    }
}

impl From<async_channel::RecvError> for Error {
    fn from(err: async_channel::RecvError) -> Self {
        Error::Channel(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Send {
            target: "n3".to_string(),
            reason: "deadline exceeded".to_string(),
        };
        assert!(err.to_string().contains("n3"));
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "test error");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let parse_err = serde_json::from_str::<i64>("not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Decode(_)));
    }
}
