//! Blocking TCP transport pump.
//!
//! The connection is the only place bytes meet the socket. It owns the
//! stream and a read accumulation buffer; callers hand it whole messages
//! and get whole messages back, never partial frames.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use bytes::BytesMut;
use tracing::trace;

use xylem_wire::{Frame, Request, Response};

use crate::error::{ClientError, ClientResult};
use crate::session::SessionConfig;

/// Socket read chunk size.
const READ_CHUNK_SIZE: usize = 4096;

pub(crate) struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl Connection {
    /// Opens a TCP connection and applies the configured timeouts.
    pub(crate) fn connect(host: &str, port: u16, config: &SessionConfig) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;

        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(config.buffer_size),
        })
    }

    /// Encodes and writes one request. The frame is written in full before
    /// returning; there is no partial-frame state to clean up on success.
    pub(crate) fn send(&mut self, request: &Request) -> ClientResult<()> {
        let frame = request.to_frame()?;
        let mut buf = BytesMut::with_capacity(frame.total_size());
        frame.encode(&mut buf);

        self.stream.write_all(&buf).map_err(ClientError::Transport)?;
        self.stream.flush().map_err(ClientError::Transport)?;

        trace!(bytes = buf.len(), "frame sent");
        Ok(())
    }

    /// Blocks until one complete response frame is available and decodes it.
    pub(crate) fn recv(&mut self) -> ClientResult<Response> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.read_buf)? {
                let response = Response::from_frame(&frame)?;
                trace!(kind = response.kind(), bytes = frame.total_size(), "frame received");
                return Ok(response);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let n = self.stream.read(&mut chunk).map_err(ClientError::Transport)?;
            if n == 0 {
                return Err(ClientError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Shuts the socket down in both directions. Errors are ignored; the
    /// peer may already be gone.
    pub(crate) fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}
