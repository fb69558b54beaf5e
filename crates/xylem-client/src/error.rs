//! Client error types.
//!
//! Every failure category a caller might branch on is a distinct variant,
//! so embedding code (a CLI, a script host) never has to match on message
//! text.

use thiserror::Error;
use xylem_wire::WireError;

use crate::query::QueryState;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during session and query operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Establishing the connection failed (host unreachable, refused, or
    /// the transport broke during the handshake).
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The server rejected the credentials. The session never became
    /// usable and the transport has been closed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server reported a logical failure, carrying its diagnostic
    /// verbatim. The session remains usable afterwards.
    #[error("command failed: {0}")]
    Command(String),

    /// The byte stream violated the wire protocol. The current exchange is
    /// unrecoverable; the caller should close the session.
    #[error("protocol violation: {0}")]
    Protocol(#[from] WireError),

    /// Another exchange is outstanding on this session. Nothing was sent.
    #[error("session is busy with another exchange")]
    Busy,

    /// The session has been closed; the handle can no longer be used.
    #[error("session is closed")]
    Closed,

    /// The operation is not valid in the query handle's current state.
    #[error("{op} is not valid in the {state} state")]
    InvalidState {
        /// The rejected operation.
        op: &'static str,
        /// The handle's state at the time of the call.
        state: QueryState,
    },

    /// The transport failed mid-exchange. The affected query handle is
    /// `Failed`; session-level recovery is the caller's responsibility.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),
}

impl ClientError {
    /// Returns the server diagnostic if this is a server-reported failure.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Auth(message) | Self::Command(message) => Some(message),
            _ => None,
        }
    }
}
