//! Request and response message types.
//!
//! Messages are serialized with bincode and carried one-per-frame. The
//! protocol is strictly sequential (no pipelining), so responses carry no
//! correlation id: the next response frame always answers the exchange the
//! client most recently started.

use std::fmt::{self, Display};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{WireError, WireResult};
use crate::frame::Frame;

/// Client-side identifier for an open query.
///
/// Allocated by the client when the query is registered; the server keys
/// its iterator resources on it until a `CloseQuery` for the same id
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(u64);

impl QueryId {
    /// Creates a new query ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<QueryId> for u64 {
    fn from(id: QueryId) -> Self {
        id.0
    }
}

// ============================================================================
// Requests (client → server)
// ============================================================================

/// A client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Answer the greeting nonce with credentials.
    Auth(AuthRequest),
    /// Execute a one-shot command.
    Command(CommandRequest),
    /// Register a query; the server allocates iterator resources.
    OpenQuery(OpenQueryRequest),
    /// Bind an external variable of an open query.
    Bind(BindRequest),
    /// Start executing an open query and stream its results.
    Execute(ExecuteRequest),
    /// Release the server-side resources of an open query. No response.
    CloseQuery(CloseQueryRequest),
    /// Session teardown notification. No response.
    Quit,
}

impl Request {
    /// Encodes the request into a frame.
    pub fn to_frame(&self) -> WireResult<Frame> {
        let payload =
            bincode::serialize(self).map_err(|e| WireError::Serialization(e.to_string()))?;
        Ok(Frame::new(Bytes::from(payload)))
    }

    /// Decodes a request from a frame.
    pub fn from_frame(frame: &Frame) -> WireResult<Self> {
        bincode::deserialize(&frame.payload).map_err(WireError::from)
    }
}

/// Credentials for the challenge/response handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Account name.
    pub username: String,
    /// `credential_digest(password, nonce)` for the greeting nonce.
    pub digest: String,
}

/// One-shot command request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command text.
    pub text: String,
}

/// Query registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenQueryRequest {
    /// Client-allocated query id.
    pub id: QueryId,
    /// Query text.
    pub text: String,
}

/// External variable binding for an open query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindRequest {
    /// Target query.
    pub id: QueryId,
    /// Variable name, without the leading `$`.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// Query execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Query to execute.
    pub id: QueryId,
}

/// Query close notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseQueryRequest {
    /// Query to release.
    pub id: QueryId,
}

// ============================================================================
// Responses (server → client)
// ============================================================================

/// A server response frame.
///
/// Exactly three kinds exist; which ones are legal at a given moment is
/// determined by the exchange shape the client started (see the crate
/// docs). `Ok` doubles as the greeting (nonce payload), the single-response
/// success, and the empty-stream terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Success, with an optional payload.
    Ok {
        /// Result payload; empty when the operation produces none.
        payload: Vec<u8>,
    },
    /// One streamed result item.
    Item {
        /// The item bytes, uninterpreted by the protocol layer.
        payload: Vec<u8>,
        /// Whether further items follow. `false` terminates the stream.
        has_more: bool,
    },
    /// Server-reported failure.
    Err {
        /// Human-readable diagnostic.
        message: String,
    },
}

impl Response {
    /// Success response carrying `payload`.
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self::Ok {
            payload: payload.into(),
        }
    }

    /// Streamed item response.
    pub fn item(payload: impl Into<Vec<u8>>, has_more: bool) -> Self {
        Self::Item {
            payload: payload.into(),
            has_more,
        }
    }

    /// Error response carrying a diagnostic.
    pub fn err(message: impl Into<String>) -> Self {
        Self::Err {
            message: message.into(),
        }
    }

    /// Short name of the frame kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "Ok",
            Self::Item { .. } => "Item",
            Self::Err { .. } => "Err",
        }
    }

    /// Encodes the response into a frame.
    pub fn to_frame(&self) -> WireResult<Frame> {
        let payload =
            bincode::serialize(self).map_err(|e| WireError::Serialization(e.to_string()))?;
        Ok(Frame::new(Bytes::from(payload)))
    }

    /// Decodes a response from a frame.
    pub fn from_frame(frame: &Frame) -> WireResult<Self> {
        bincode::deserialize(&frame.payload).map_err(WireError::from)
    }
}

#[cfg(test)]
mod message_tests {
    use super::*;

    #[test]
    fn auth_request_roundtrip() {
        let request = Request::Auth(AuthRequest {
            username: "admin".to_string(),
            digest: "deadbeef".to_string(),
        });

        let frame = request.to_frame().unwrap();
        let decoded = Request::from_frame(&frame).unwrap();

        match decoded {
            Request::Auth(auth) => {
                assert_eq!(auth.username, "admin");
                assert_eq!(auth.digest, "deadbeef");
            }
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn open_query_roundtrip() {
        let request = Request::OpenQuery(OpenQueryRequest {
            id: QueryId::new(7),
            text: "for $x in doc('input')//li return $x".to_string(),
        });

        let frame = request.to_frame().unwrap();
        let decoded = Request::from_frame(&frame).unwrap();

        match decoded {
            Request::OpenQuery(open) => {
                assert_eq!(u64::from(open.id), 7);
                assert_eq!(open.text, "for $x in doc('input')//li return $x");
            }
            other => panic!("expected OpenQuery, got {other:?}"),
        }
    }

    #[test]
    fn response_variants_roundtrip() {
        let responses = [
            Response::ok(b"result".as_slice()),
            Response::item(b"<li>1</li>".as_slice(), true),
            Response::item(b"<li>2</li>".as_slice(), false),
            Response::err("Stopped at line 1: unexpected end of query"),
        ];

        for response in responses {
            let frame = response.to_frame().unwrap();
            let decoded = Response::from_frame(&frame).unwrap();
            assert_eq!(decoded, response);
        }
    }

    #[test]
    fn malformed_payload_is_deserialization_error() {
        let frame = Frame::new(Bytes::from_static(&[0xFF; 3]));
        let result = Response::from_frame(&frame);
        assert!(matches!(result, Err(WireError::Deserialization(_))));
    }
}
