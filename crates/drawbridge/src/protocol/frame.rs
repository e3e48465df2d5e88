//! VarInt length-prefixed framing.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::buffer::{ProtocolError, WriteExt, var_int_len};

/// Largest frame length expressible in a 3-byte VarInt
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Most buffer grown ahead of bytes actually received
const READ_RESERVE: usize = 8 * 1024;

/// Splits the stream into uncompressed packet frames (`id + body`).
///
/// Compression and encryption are never negotiated, so a frame is always a
/// plain VarInt length followed by that many bytes. `max_frame` caps what the
/// peer may send; outgoing frames are only held to the wire limit.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame: usize,
}

impl FrameCodec {
    pub fn new(max_frame: usize) -> Self {
        Self {
            max_frame: max_frame.min(MAX_FRAME_LEN),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ProtocolError> {
        let mut length: usize = 0;
        let mut header = 0;
        loop {
            let Some(&byte) = src.get(header) else {
                return Ok(None);
            };
            length |= ((byte & 0x7F) as usize) << (7 * header);
            header += 1;
            if byte & 0x80 == 0 {
                break;
            }
            if header == 3 {
                return Err(ProtocolError::VarIntTooLong);
            }
        }

        if length > self.max_frame {
            return Err(ProtocolError::FrameTooLarge(length));
        }

        if src.len() < header + length {
            let missing = header + length - src.len();
            src.reserve(missing.min(READ_RESERVE));
            return Ok(None);
        }

        src.advance(header);
        Ok(Some(src.split_to(length)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(frame.len()));
        }
        dst.reserve(var_int_len(frame.len() as i32) + frame.len());
        dst.put_var_int(frame.len() as i32);
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

/// Re-prefix a decoded frame for forwarding
pub fn reframe(frame: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(var_int_len(frame.len() as i32) + frame.len());
    buf.put_var_int(frame.len() as i32);
    buf.extend_from_slice(frame);
    buf.freeze()
}
