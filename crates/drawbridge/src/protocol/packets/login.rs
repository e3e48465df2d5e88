//! Handshake and login phase packets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use super::ids::login;
use crate::protocol::buffer::{ProtocolError, ReadExt, Result, WriteExt, expect_consumed};
use crate::protocol::version::ProtocolVersion::{self, *};
use crate::protocol::{Decode, Encode};

const MAX_HOST_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 16;
const MAX_KEY_LEN: usize = 512;
const MAX_KEY_SIGNATURE_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
}

/// First packet of every connection; its layout predates versioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol: i32,
    pub host: String,
    pub port: u16,
    pub next_state: NextState,
}

impl Handshake {
    /// Decode a whole frame, id included
    pub fn decode_frame(mut frame: Bytes) -> Result<Self> {
        let id = frame.read_var_int()?;
        if id != login::HANDSHAKE {
            return Err(ProtocolError::UnknownPacket(id));
        }
        let protocol = frame.read_var_int()?;
        let host = frame.read_string(MAX_HOST_LEN)?;
        let port = frame.read_u16()?;
        let next_state = match frame.read_var_int()? {
            1 => NextState::Status,
            2 => NextState::Login,
            other => {
                return Err(ProtocolError::InvalidDiscriminant {
                    field: "next state",
                    value: other as i64,
                });
            }
        };
        expect_consumed(&frame)?;
        Ok(Self {
            protocol,
            host,
            port,
            next_state,
        })
    }

    pub fn encode_frame(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_var_int(login::HANDSHAKE);
        buf.put_var_int(self.protocol);
        buf.put_string(&self.host);
        buf.put_u16(self.port);
        buf.put_var_int(match self.next_state {
            NextState::Status => 1,
            NextState::Login => 2,
        });
        buf.freeze()
    }
}

/// Chat-signing key sent by 1.19 and 1.19.1 clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerKey {
    pub expiry: i64,
    pub key: Bytes,
    pub signature: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub username: String,
    pub key: Option<PlayerKey>,
    /// Sent optionally by 1.19.1 through 1.20
    pub uuid: Option<Uuid>,
}

impl LoginStart {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key: None,
            uuid: None,
        }
    }

    pub fn decode_frame(mut frame: Bytes, version: ProtocolVersion) -> Result<Self> {
        let id = frame.read_var_int()?;
        if id != login::LOGIN_START {
            return Err(ProtocolError::UnknownPacket(id));
        }
        let packet = Self::decode(&mut frame, version)?;
        expect_consumed(&frame)?;
        Ok(packet)
    }

    /// Encode as a client would
    pub fn encode_frame(&self, version: ProtocolVersion) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_var_int(login::LOGIN_START);
        self.encode(&mut buf, version);
        buf.freeze()
    }
}

impl Decode for LoginStart {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let mut packet = Self::new(buf.read_string(MAX_USERNAME_LEN)?);
        if version >= V1_19 && version < V1_19_3 && buf.read_bool()? {
            packet.key = Some(PlayerKey {
                expiry: buf.read_i64()?,
                key: buf.read_byte_array(MAX_KEY_LEN)?,
                signature: buf.read_byte_array(MAX_KEY_SIGNATURE_LEN)?,
            });
        }
        if version >= V1_19_1 && buf.has_remaining() && buf.read_bool()? {
            packet.uuid = Some(buf.read_uuid()?);
        }
        Ok(packet)
    }
}

impl Encode for LoginStart {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_string(&self.username);
        if version >= V1_19 && version < V1_19_3 {
            match &self.key {
                Some(key) => {
                    buf.put_bool(true);
                    buf.put_i64(key.expiry);
                    buf.put_byte_array(&key.key);
                    buf.put_byte_array(&key.signature);
                }
                None => buf.put_bool(false),
            }
        }
        if version >= V1_19_1 {
            match self.uuid {
                Some(uuid) => {
                    buf.put_bool(true);
                    buf.put_uuid(uuid);
                }
                None => buf.put_bool(false),
            }
        }
    }
}

/// Offline-mode login success; no properties are ever sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl Encode for LoginSuccess {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        if version >= V1_16 {
            buf.put_uuid(self.uuid);
        } else if version >= V1_7_6 {
            buf.put_string(&self.uuid.hyphenated().to_string());
        } else {
            buf.put_string(&self.uuid.simple().to_string());
        }
        buf.put_string(&self.username);
        if version >= V1_19 {
            buf.put_var_int(0);
        }
    }
}

impl LoginSuccess {
    pub fn encode_frame(&self, version: ProtocolVersion) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_var_int(login::SUCCESS);
        self.encode(&mut buf, version);
        buf.freeze()
    }
}

/// Login phase disconnect with a JSON chat component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDisconnect {
    pub reason: String,
}

impl Encode for LoginDisconnect {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_string(&self.reason);
    }
}

impl LoginDisconnect {
    pub fn encode_frame(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_var_int(login::DISCONNECT);
        buf.put_string(&self.reason);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_round_trip() {
        let handshake = Handshake {
            protocol: 763,
            host: "play.example.net".into(),
            port: 25565,
            next_state: NextState::Login,
        };
        assert_eq!(Handshake::decode_frame(handshake.encode_frame()).unwrap(), handshake);
    }

    #[test]
    fn test_handshake_bad_state() {
        let mut buf = BytesMut::new();
        buf.put_var_int(0);
        buf.put_var_int(47);
        buf.put_string("localhost");
        buf.put_u16(25565);
        buf.put_var_int(3);
        assert!(matches!(
            Handshake::decode_frame(buf.freeze()),
            Err(ProtocolError::InvalidDiscriminant { field: "next state", .. })
        ));
    }

    #[test]
    fn test_login_start_round_trip() {
        for version in ProtocolVersion::ALL {
            let mut packet = LoginStart::new("Steve_42");
            if version >= V1_19 && version < V1_19_3 {
                packet.key = Some(PlayerKey {
                    expiry: 1_700_000_000_000,
                    key: Bytes::from_static(&[1, 2, 3]),
                    signature: Bytes::from_static(&[4, 5]),
                });
            }
            if version >= V1_19_1 {
                packet.uuid = Some(Uuid::from_u128(99));
            }
            let mut buf = BytesMut::new();
            buf.put_var_int(login::LOGIN_START);
            packet.encode(&mut buf, version);
            assert_eq!(LoginStart::decode_frame(buf.freeze(), version).unwrap(), packet);
        }
    }

    #[test]
    fn test_login_start_long_name() {
        let mut buf = BytesMut::new();
        buf.put_var_int(login::LOGIN_START);
        buf.put_string("a_name_that_is_far_too_long");
        assert!(LoginStart::decode_frame(buf.freeze(), V1_8).is_err());
    }

    #[test]
    fn test_login_success_uuid_format() {
        let packet = LoginSuccess {
            uuid: Uuid::from_u128(1),
            username: "Alex".into(),
        };
        let mut modern = BytesMut::new();
        packet.encode(&mut modern, V1_16);
        assert_eq!(modern.len(), 16 + 1 + 4);

        let mut legacy = BytesMut::new();
        packet.encode(&mut legacy, V1_8);
        let mut legacy = legacy.freeze();
        assert_eq!(
            legacy.read_string(36).unwrap(),
            "00000000-0000-0000-0000-000000000001"
        );
    }
}
