//! # xylem-wire: Binary wire protocol for `Xylem`
//!
//! This crate defines the binary wire protocol spoken between a `Xylem`
//! client session and the server.
//!
//! ## Frame Format
//!
//! ```text
//! ┌─────────┬─────────┬──────────┬──────────┬──────────────────┐
//! │ Magic   │ Version │ Length   │ Checksum │     Payload      │
//! │ (4 B)   │ (2 B)   │ (4 B)    │ (4 B)    │     (var)        │
//! └─────────┴─────────┴──────────┴──────────┴──────────────────┘
//! ```
//!
//! - **Magic**: `0x58594C4D` ("XYLM")
//! - **Version**: Protocol version (currently 1)
//! - **Length**: Payload length in bytes (max 16 MiB)
//! - **Checksum**: CRC32 of payload
//! - **Payload**: Bincode-encoded message
//!
//! ## Exchange Shapes
//!
//! Every exchange is initiated by the client; the server never speaks
//! unprompted except for the single greeting frame after accept. Three
//! shapes exist, and the client always knows which one it started:
//!
//! 1. **Request / response**: [`Request::Auth`], [`Request::Command`],
//!    [`Request::OpenQuery`], [`Request::Bind`]. Exactly one [`Response`]
//!    frame follows.
//! 2. **Request / stream**: [`Request::Execute`]. One accept/reject frame,
//!    then (if accepted) a stream of [`Response::Item`] frames. A non-empty
//!    stream ends with an item whose `has_more` flag is false; an empty
//!    stream ends with a single bare [`Response::Ok`] frame.
//! 3. **Request / no response**: [`Request::CloseQuery`], [`Request::Quit`].
//!    Fire-and-forget notifications.

mod error;
mod frame;
mod message;

pub mod auth;

pub use error::{WireError, WireResult};
pub use frame::{FRAME_HEADER_SIZE, Frame, FrameHeader, MAGIC, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
pub use message::{
    AuthRequest, BindRequest, CloseQueryRequest, CommandRequest, ExecuteRequest, OpenQueryRequest,
    QueryId, Request, Response,
};

/// Default port a `Xylem` server listens on.
pub const DEFAULT_PORT: u16 = 1984;
