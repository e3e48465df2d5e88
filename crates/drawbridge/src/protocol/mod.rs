//! Versioned wire protocol: framing, primitives and the packets used during verification.

pub mod buffer;
pub mod frame;
pub mod nbt;
pub mod packets;
pub mod version;

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub use buffer::{ProtocolError, ReadExt, WriteExt};
pub use frame::FrameCodec;
pub use version::{ProtocolVersion, VersionTable};

/// Read a packet body whose layout depends on the revision
pub trait Decode: Sized {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self, ProtocolError>;
}

/// Write a packet body whose layout depends on the revision
pub trait Encode {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion);
}

/// Stable identity for a player that logged in without one.
///
/// Derived from the name, so reconnects map to the same identity.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Sha256::digest(format!("OfflinePlayer:{username}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    // RFC 4122 name-based version and variant bits
    bytes[6] = (bytes[6] & 0x0F) | 0x30;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_uuid_is_stable() {
        let first = offline_uuid("Steve");
        assert_eq!(first, offline_uuid("Steve"));
        assert_ne!(first, offline_uuid("steve"));
        assert_eq!(first.get_version_num(), 3);
        assert_eq!(first.get_variant(), uuid::Variant::RFC4122);
    }
}
