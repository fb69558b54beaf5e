//! Frame encoding and decoding.
//!
//! A frame is the unit of wire traffic: a fixed-size header followed by a
//! variable-size bincode payload. Framing is what lets the session treat
//! the TCP stream as a sequence of self-delimited messages; the header is
//! validated before any payload byte is interpreted.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{WireError, WireResult};

/// Protocol magic bytes: "XYLM" in big-endian.
pub const MAGIC: u32 = 0x5859_4C4D;

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Frame header size in bytes (magic + version + length + checksum).
pub const FRAME_HEADER_SIZE: usize = 14;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Fixed-size header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol magic bytes.
    pub magic: u32,
    /// Protocol version.
    pub version: u16,
    /// Payload length in bytes.
    pub length: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
}

impl FrameHeader {
    /// Builds the header for a payload, computing its checksum.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: MAGIC,
            version: PROTOCOL_VERSION,
            length: payload.len() as u32,
            checksum: crc32fast::hash(payload),
        }
    }

    /// Writes the header into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.magic);
        buf.put_u16(self.version);
        buf.put_u32(self.length);
        buf.put_u32(self.checksum);
    }

    /// Reads a header, or `None` if fewer than [`FRAME_HEADER_SIZE`] bytes
    /// are available.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < FRAME_HEADER_SIZE {
            return None;
        }

        Some(Self {
            magic: buf.get_u32(),
            version: buf.get_u16(),
            length: buf.get_u32(),
            checksum: buf.get_u32(),
        })
    }

    /// Rejects headers that cannot belong to a well-formed frame.
    pub fn validate(&self) -> WireResult<()> {
        if self.magic != MAGIC {
            return Err(WireError::InvalidMagic(self.magic));
        }

        if self.version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(self.version));
        }

        if self.length > MAX_PAYLOAD_SIZE {
            return Err(WireError::PayloadTooLarge {
                size: self.length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(())
    }
}

/// A complete frame: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Wraps a payload in a frame.
    pub fn new(payload: Bytes) -> Self {
        let header = FrameHeader::for_payload(&payload);
        Self { header, payload }
    }

    /// Encodes the frame into `buf`. Never emits a partial frame.
    pub fn encode(&self, buf: &mut BytesMut) {
        self.header.encode(buf);
        buf.put_slice(&self.payload);
    }

    /// Encodes the frame into a fresh buffer.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Attempts to decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` when a complete, valid frame was consumed,
    /// `Ok(None)` when more bytes are needed (nothing is consumed), and
    /// `Err` when the buffered bytes cannot be a valid frame.
    pub fn decode(buf: &mut BytesMut) -> WireResult<Option<Self>> {
        // Peek at the header without consuming so a short read can resume.
        let header = {
            let mut peek = buf.as_ref();
            match FrameHeader::decode(&mut peek) {
                Some(header) => header,
                None => return Ok(None),
            }
        };

        // Validate before waiting for the payload: a corrupt length field
        // must not stall the session waiting for bytes that never come.
        header.validate()?;

        let total = FRAME_HEADER_SIZE + header.length as usize;
        if buf.len() < total {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.length as usize).freeze();

        let actual = crc32fast::hash(&payload);
        if actual != header.checksum {
            return Err(WireError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        Ok(Some(Self { header, payload }))
    }

    /// Total encoded size of the frame in bytes.
    pub fn total_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}
