//! Primitive reads and writes shared by every packet codec.
//!
//! All reads check the remaining length first, so a truncated or hostile
//! packet is a `ProtocolError` rather than a panic, and no read allocates
//! more than its hard cap regardless of the declared length.

use bytes::{Buf, BufMut, Bytes};
use thiserror::Error;
use uuid::Uuid;

use super::version::ProtocolVersion;

/// Largest byte array accepted anywhere in the play phase
pub const MAX_BYTE_ARRAY: usize = 32_767;

/// Malformed or unexpected wire data
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet truncated: {needed} more bytes needed")]
    Truncated { needed: usize },

    #[error("varint is wider than 5 bytes")]
    VarIntTooLong,

    #[error("declared length {length} out of bounds (max {max})")]
    LengthOutOfBounds { length: i64, max: usize },

    #[error("invalid {field} value {value}")]
    InvalidDiscriminant { field: &'static str, value: i64 },

    #[error("unknown packet id {0:#04x}")]
    UnknownPacket(i32),

    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),

    #[error("non-finite {0}")]
    NonFinite(&'static str),

    #[error("string is not valid UTF-8")]
    InvalidString,

    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("invalid {0}")]
    Invalid(&'static str),

    #[error("{packet} does not exist on {version}")]
    Unsupported {
        packet: &'static str,
        version: ProtocolVersion,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Checked reads over any `Buf`
pub trait ReadExt: Buf {
    fn need(&self, len: usize) -> Result<()> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(ProtocolError::Truncated {
                needed: len - remaining,
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.get_u8())
    }

    fn read_i8(&mut self) -> Result<i8> {
        self.need(1)?;
        Ok(self.get_i8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidDiscriminant {
                field: "boolean",
                value: other as i64,
            }),
        }
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.get_i16())
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.get_u16())
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.get_i64())
    }

    fn read_f32(&mut self, field: &'static str) -> Result<f32> {
        self.need(4)?;
        let value = self.get_f32();
        if !value.is_finite() {
            return Err(ProtocolError::NonFinite(field));
        }
        Ok(value)
    }

    fn read_f64(&mut self, field: &'static str) -> Result<f64> {
        self.need(8)?;
        let value = self.get_f64();
        if !value.is_finite() {
            return Err(ProtocolError::NonFinite(field));
        }
        Ok(value)
    }

    fn read_var_int(&mut self) -> Result<i32> {
        let mut value: u32 = 0;
        for position in 0..5 {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << (7 * position);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(ProtocolError::VarIntTooLong)
    }

    /// Length prefix checked against `max` before anything is read
    fn read_length(&mut self, max: usize) -> Result<usize> {
        let length = self.read_var_int()?;
        check_length(length as i64, max)
    }

    /// VarInt-prefixed UTF-8 string of at most `max_chars` characters
    fn read_string(&mut self, max_chars: usize) -> Result<String> {
        let length = self.read_length(max_chars.saturating_mul(3))?;
        self.need(length)?;
        let raw = self.copy_to_bytes(length);
        let string = std::str::from_utf8(&raw).map_err(|_| ProtocolError::InvalidString)?;
        let chars = string.chars().count();
        if chars > max_chars {
            return Err(ProtocolError::LengthOutOfBounds {
                length: chars as i64,
                max: max_chars,
            });
        }
        Ok(string.to_owned())
    }

    /// VarInt-prefixed byte array
    fn read_byte_array(&mut self, max: usize) -> Result<Bytes> {
        let length = self.read_length(max)?;
        self.need(length)?;
        Ok(self.copy_to_bytes(length))
    }

    /// Short-prefixed byte array (1.7 plugin messages)
    fn read_short_byte_array(&mut self, max: usize) -> Result<Bytes> {
        let length = check_length(self.read_i16()? as i64, max)?;
        self.need(length)?;
        Ok(self.copy_to_bytes(length))
    }

    /// Everything left in the packet, capped
    fn read_remaining(&mut self, max: usize) -> Result<Bytes> {
        let length = check_length(self.remaining() as i64, max)?;
        Ok(self.copy_to_bytes(length))
    }

    fn read_uuid(&mut self) -> Result<Uuid> {
        self.need(16)?;
        Ok(Uuid::from_u64_pair(self.get_u64(), self.get_u64()))
    }
}

impl<B: Buf + ?Sized> ReadExt for B {}

fn check_length(length: i64, max: usize) -> Result<usize> {
    if length < 0 || length as u64 > max as u64 {
        return Err(ProtocolError::LengthOutOfBounds { length, max });
    }
    Ok(length as usize)
}

/// Writes mirroring [`ReadExt`]
pub trait WriteExt: BufMut {
    fn put_var_int(&mut self, value: i32) {
        let mut value = value as u32;
        loop {
            if value & !0x7F == 0 {
                self.put_u8(value as u8);
                return;
            }
            self.put_u8((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
    }

    fn put_bool(&mut self, value: bool) {
        self.put_u8(value as u8);
    }

    fn put_string(&mut self, value: &str) {
        self.put_var_int(value.len() as i32);
        self.put_slice(value.as_bytes());
    }

    fn put_byte_array(&mut self, value: &[u8]) {
        self.put_var_int(value.len() as i32);
        self.put_slice(value);
    }

    fn put_uuid(&mut self, value: Uuid) {
        let (most, least) = value.as_u64_pair();
        self.put_u64(most);
        self.put_u64(least);
    }
}

impl<B: BufMut + ?Sized> WriteExt for B {}

/// Encoded width of a VarInt
pub fn var_int_len(value: i32) -> usize {
    match value as u32 {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Fails when a decoder left bytes behind
pub fn expect_consumed(buf: &impl Buf) -> Result<()> {
    match buf.remaining() {
        0 => Ok(()),
        left => Err(ProtocolError::TrailingBytes(left)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_var_int_boundaries() {
        for value in [0, 1, 127, 128, 255, 25565, 2_097_151, i32::MAX, -1, i32::MIN] {
            let mut buf = BytesMut::new();
            buf.put_var_int(value);
            assert_eq!(buf.len(), var_int_len(value));
            let mut bytes = buf.freeze();
            assert_eq!(bytes.read_var_int().unwrap(), value);
            assert!(!bytes.has_remaining());
        }
    }

    #[test]
    fn test_var_int_too_long() {
        let mut bytes = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(bytes.read_var_int(), Err(ProtocolError::VarIntTooLong)));
    }

    #[test]
    fn test_truncated_reads() {
        let mut bytes = Bytes::from_static(&[0x00, 0x01]);
        assert!(matches!(
            bytes.read_i32(),
            Err(ProtocolError::Truncated { needed: 2 })
        ));
        let mut bytes = Bytes::from_static(&[0x80]);
        assert!(matches!(bytes.read_var_int(), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_string_length_caps() {
        // Declares a ~2 GiB string; rejected before any allocation.
        let mut buf = BytesMut::new();
        buf.put_var_int(i32::MAX);
        let mut bytes = buf.freeze();
        assert!(matches!(
            bytes.read_string(16),
            Err(ProtocolError::LengthOutOfBounds { .. })
        ));

        let mut buf = BytesMut::new();
        buf.put_var_int(-5);
        assert!(matches!(
            buf.freeze().read_byte_array(64),
            Err(ProtocolError::LengthOutOfBounds { length: -5, .. })
        ));

        let mut buf = BytesMut::new();
        buf.put_string("seventeen_chars__");
        assert!(buf.freeze().read_string(16).is_err());
    }

    #[test]
    fn test_string_and_uuid() {
        let uuid = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        let mut buf = BytesMut::new();
        buf.put_string("Notch");
        buf.put_uuid(uuid);
        let mut bytes = buf.freeze();
        assert_eq!(bytes.read_string(16).unwrap(), "Notch");
        assert_eq!(bytes.read_uuid().unwrap(), uuid);
        assert!(expect_consumed(&bytes).is_ok());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut buf = BytesMut::new();
        buf.put_f64(f64::NAN);
        buf.put_f32(f32::INFINITY);
        let mut bytes = buf.freeze();
        assert!(matches!(bytes.read_f64("x"), Err(ProtocolError::NonFinite("x"))));
        assert!(matches!(bytes.read_f32("yaw"), Err(ProtocolError::NonFinite("yaw"))));
    }

    #[test]
    fn test_bool_discriminant() {
        let mut bytes = Bytes::from_static(&[2]);
        assert!(matches!(
            bytes.read_bool(),
            Err(ProtocolError::InvalidDiscriminant { value: 2, .. })
        ));
    }
}
