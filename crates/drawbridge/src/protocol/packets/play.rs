//! Client-to-server play packets observed during verification.
//!
//! These also encode, so tests and tools can act as a client.

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::protocol::buffer::{MAX_BYTE_ARRAY, ProtocolError, ReadExt, Result, WriteExt};
use crate::protocol::version::ProtocolVersion::{self, *};
use crate::protocol::{Decode, Encode};

/// Brand channel name on this revision
pub fn brand_channel(version: ProtocolVersion) -> &'static str {
    if version >= V1_13 { "minecraft:brand" } else { "MC|Brand" }
}

const MAX_CHANNEL_LEN: usize = 128;
const MAX_SIGNATURE_LEN: usize = 256;
const MAX_LAST_SEEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub id: i64,
}

impl Decode for KeepAlive {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let id = if version >= V1_12_2 {
            buf.read_i64()?
        } else if version >= V1_8 {
            buf.read_var_int()? as i64
        } else {
            buf.read_i32()? as i64
        };
        Ok(Self { id })
    }
}

impl Encode for KeepAlive {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        if version >= V1_12_2 {
            buf.put_i64(self.id);
        } else if version >= V1_8 {
            buf.put_var_int(self.id as i32);
        } else {
            buf.put_i32(self.id as i32);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub locale: String,
    pub view_distance: i8,
    pub chat_mode: i32,
    pub chat_colors: bool,
    /// Skin part bits; on 1.7 only the cape bit exists
    pub skin_parts: u8,
    /// 1 = right hand; before 1.9 always right
    pub main_hand: i32,
    pub text_filtering: bool,
    pub allow_listing: bool,
    /// 1.7 only
    pub difficulty: u8,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            locale: "en_us".to_string(),
            view_distance: 10,
            chat_mode: 0,
            chat_colors: true,
            skin_parts: 0x7F,
            main_hand: 1,
            text_filtering: false,
            allow_listing: true,
            difficulty: 0,
        }
    }
}

impl Decode for ClientSettings {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let locale = buf.read_string(16)?;
        let view_distance = buf.read_i8()?;
        let chat_mode = if version >= V1_9 {
            buf.read_var_int()?
        } else {
            buf.read_u8()? as i32
        };
        if !(0..=2).contains(&chat_mode) {
            return Err(ProtocolError::InvalidDiscriminant {
                field: "chat mode",
                value: chat_mode as i64,
            });
        }
        let chat_colors = buf.read_bool()?;

        let mut settings = Self {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts: 0,
            main_hand: 1,
            text_filtering: false,
            allow_listing: false,
            difficulty: 0,
        };

        if version < V1_8 {
            settings.difficulty = buf.read_u8()?;
            if settings.difficulty > 3 {
                return Err(ProtocolError::InvalidDiscriminant {
                    field: "difficulty",
                    value: settings.difficulty as i64,
                });
            }
            settings.skin_parts = buf.read_bool()? as u8;
            return Ok(settings);
        }

        settings.skin_parts = buf.read_u8()?;
        if version >= V1_9 {
            settings.main_hand = buf.read_var_int()?;
            if !(0..=1).contains(&settings.main_hand) {
                return Err(ProtocolError::InvalidDiscriminant {
                    field: "main hand",
                    value: settings.main_hand as i64,
                });
            }
        }
        if version >= V1_17 {
            settings.text_filtering = buf.read_bool()?;
        }
        if version >= V1_18 {
            settings.allow_listing = buf.read_bool()?;
        }
        Ok(settings)
    }
}

impl Encode for ClientSettings {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_string(&self.locale);
        buf.put_i8(self.view_distance);
        if version >= V1_9 {
            buf.put_var_int(self.chat_mode);
        } else {
            buf.put_u8(self.chat_mode as u8);
        }
        buf.put_bool(self.chat_colors);
        if version < V1_8 {
            buf.put_u8(self.difficulty);
            buf.put_bool(self.skin_parts != 0);
            return;
        }
        buf.put_u8(self.skin_parts);
        if version >= V1_9 {
            buf.put_var_int(self.main_hand);
        }
        if version >= V1_17 {
            buf.put_bool(self.text_filtering);
        }
        if version >= V1_18 {
            buf.put_bool(self.allow_listing);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMessage {
    pub channel: String,
    pub data: Bytes,
}

impl PluginMessage {
    /// Either brand channel spelling, regardless of revision
    pub fn is_brand_channel(&self) -> bool {
        self.channel == "MC|Brand" || self.channel == "minecraft:brand"
    }

    /// Brand string carried by this message.
    ///
    /// 1.7 sends raw UTF-8; later revisions prefix the string with a VarInt.
    pub fn brand(&self, version: ProtocolVersion, max_len: usize) -> Result<String> {
        let mut data = self.data.clone();
        if version < V1_8 {
            let raw = data.read_remaining(max_len)?;
            return std::str::from_utf8(&raw)
                .map(str::to_owned)
                .map_err(|_| ProtocolError::InvalidString);
        }
        let brand = data.read_string(max_len)?;
        crate::protocol::buffer::expect_consumed(&data)?;
        Ok(brand)
    }

    /// Brand message as a client would send it
    #[cfg(test)]
    pub fn brand_message(brand: &str, version: ProtocolVersion) -> Self {
        let mut data = BytesMut::new();
        if version < V1_8 {
            data.put_slice(brand.as_bytes());
        } else {
            data.put_string(brand);
        }
        Self {
            channel: brand_channel(version).to_string(),
            data: data.freeze(),
        }
    }
}

impl Decode for PluginMessage {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let channel = buf.read_string(MAX_CHANNEL_LEN)?;
        let data = if version < V1_8 {
            buf.read_short_byte_array(MAX_BYTE_ARRAY)?
        } else {
            buf.read_remaining(MAX_BYTE_ARRAY)?
        };
        Ok(Self { channel, data })
    }
}

impl Encode for PluginMessage {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_string(&self.channel);
        if version < V1_8 {
            buf.put_i16(self.data.len() as i16);
        }
        buf.put_slice(&self.data);
    }
}

/// Chat message; the signing fields only exist from 1.19 on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chat {
    pub message: String,
    pub timestamp: i64,
    pub salt: i64,
    pub signature: Option<Bytes>,
    /// 1.19 and 1.19.1
    pub signed_preview: bool,
    /// 1.19.1 acknowledgement list
    pub last_seen: Vec<(Uuid, Bytes)>,
    /// 1.19.1
    pub last_received: Option<(Uuid, Bytes)>,
    /// 1.19.3+ acknowledgement window
    pub offset: i32,
    pub acknowledged: [u8; 3],
}

impl Chat {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn max_length(version: ProtocolVersion) -> usize {
        if version >= V1_11 { 256 } else { 100 }
    }
}

impl Decode for Chat {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let mut chat = Self::new(buf.read_string(Self::max_length(version))?);
        if version < V1_19 {
            return Ok(chat);
        }

        chat.timestamp = buf.read_i64()?;
        chat.salt = buf.read_i64()?;

        if version >= V1_19_3 {
            if buf.read_bool()? {
                buf.need(MAX_SIGNATURE_LEN)?;
                chat.signature = Some(buf.split_to(MAX_SIGNATURE_LEN));
            }
            chat.offset = buf.read_var_int()?;
            buf.need(3)?;
            chat.acknowledged.copy_from_slice(&buf.split_to(3));
            return Ok(chat);
        }

        let signature = buf.read_byte_array(MAX_SIGNATURE_LEN)?;
        chat.signature = (!signature.is_empty()).then_some(signature);
        chat.signed_preview = buf.read_bool()?;

        if version >= V1_19_1 {
            let count = buf.read_length(MAX_LAST_SEEN)?;
            for _ in 0..count {
                let sender = buf.read_uuid()?;
                let signature = buf.read_byte_array(MAX_SIGNATURE_LEN)?;
                chat.last_seen.push((sender, signature));
            }
            if buf.read_bool()? {
                let sender = buf.read_uuid()?;
                let signature = buf.read_byte_array(MAX_SIGNATURE_LEN)?;
                chat.last_received = Some((sender, signature));
            }
        }
        Ok(chat)
    }
}

impl Encode for Chat {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_string(&self.message);
        if version < V1_19 {
            return;
        }

        buf.put_i64(self.timestamp);
        buf.put_i64(self.salt);

        if version >= V1_19_3 {
            match &self.signature {
                Some(signature) => {
                    buf.put_bool(true);
                    let mut fixed = [0u8; MAX_SIGNATURE_LEN];
                    let len = signature.len().min(MAX_SIGNATURE_LEN);
                    fixed[..len].copy_from_slice(&signature[..len]);
                    buf.put_slice(&fixed);
                }
                None => buf.put_bool(false),
            }
            buf.put_var_int(self.offset);
            buf.put_slice(&self.acknowledged);
            return;
        }

        buf.put_byte_array(self.signature.as_deref().unwrap_or_default());
        buf.put_bool(self.signed_preview);

        if version >= V1_19_1 {
            buf.put_var_int(self.last_seen.len() as i32);
            for (sender, signature) in &self.last_seen {
                buf.put_uuid(*sender);
                buf.put_byte_array(signature);
            }
            match &self.last_received {
                Some((sender, signature)) => {
                    buf.put_bool(true);
                    buf.put_uuid(*sender);
                    buf.put_byte_array(signature);
                }
                None => buf.put_bool(false),
            }
        }
    }
}

/// Feet position. 1.7 additionally sends the eye height ("stance").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

const EYE_HEIGHT: f64 = 1.62;

fn read_coordinates(buf: &mut Bytes, version: ProtocolVersion) -> Result<(f64, f64, f64)> {
    let x = buf.read_f64("x")?;
    let y = buf.read_f64("y")?;
    if version < V1_8 {
        let stance = buf.read_f64("stance")?;
        // vanilla servers reject the same range as an illegal stance
        if !(0.1..=1.65).contains(&(stance - y)) {
            return Err(ProtocolError::Invalid("stance"));
        }
    }
    let z = buf.read_f64("z")?;
    Ok((x, y, z))
}

fn put_coordinates(buf: &mut BytesMut, version: ProtocolVersion, x: f64, y: f64, z: f64) {
    buf.put_f64(x);
    buf.put_f64(y);
    if version < V1_8 {
        buf.put_f64(y + EYE_HEIGHT);
    }
    buf.put_f64(z);
}

impl Decode for Position {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let (x, y, z) = read_coordinates(buf, version)?;
        let on_ground = buf.read_bool()?;
        Ok(Self { x, y, z, on_ground })
    }
}

impl Encode for Position {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        put_coordinates(buf, version, self.x, self.y, self.z);
        buf.put_bool(self.on_ground);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl Decode for PositionRotation {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        let (x, y, z) = read_coordinates(buf, version)?;
        let yaw = buf.read_f32("yaw")?;
        let pitch = buf.read_f32("pitch")?;
        let on_ground = buf.read_bool()?;
        Ok(Self {
            x,
            y,
            z,
            yaw,
            pitch,
            on_ground,
        })
    }
}

impl Encode for PositionRotation {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        put_coordinates(buf, version, self.x, self.y, self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_bool(self.on_ground);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl Decode for Rotation {
    fn decode(buf: &mut Bytes, _version: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            yaw: buf.read_f32("yaw")?,
            pitch: buf.read_f32("pitch")?,
            on_ground: buf.read_bool()?,
        })
    }
}

impl Encode for Rotation {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_bool(self.on_ground);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnGround {
    pub on_ground: bool,
}

impl Decode for OnGround {
    fn decode(buf: &mut Bytes, _version: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            on_ground: buf.read_bool()?,
        })
    }
}

impl Encode for OnGround {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_bool(self.on_ground);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeleportConfirm {
    pub teleport_id: i32,
}

impl Decode for TeleportConfirm {
    fn decode(buf: &mut Bytes, _version: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            teleport_id: buf.read_var_int()?,
        })
    }
}

impl Encode for TeleportConfirm {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_var_int(self.teleport_id);
    }
}

/// Selected hotbar slot (0-8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldItemChange {
    pub slot: i16,
}

impl Decode for HeldItemChange {
    fn decode(buf: &mut Bytes, _version: ProtocolVersion) -> Result<Self> {
        let slot = buf.read_i16()?;
        if !(0..=8).contains(&slot) {
            return Err(ProtocolError::InvalidDiscriminant {
                field: "hotbar slot",
                value: slot as i64,
            });
        }
        Ok(Self { slot })
    }
}

impl Encode for HeldItemChange {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_i16(self.slot);
    }
}

/// Arm swing. 1.7 names the entity and animation, 1.8 is empty, 1.9+ names the hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmAnimation {
    pub hand: i32,
}

const SWING_ARM: i8 = 1;

impl Decode for ArmAnimation {
    fn decode(buf: &mut Bytes, version: ProtocolVersion) -> Result<Self> {
        if version < V1_8 {
            let _entity_id = buf.read_i32()?;
            let animation = buf.read_i8()?;
            if animation != SWING_ARM {
                return Err(ProtocolError::InvalidDiscriminant {
                    field: "animation",
                    value: animation as i64,
                });
            }
            return Ok(Self { hand: 0 });
        }
        if version < V1_9 {
            return Ok(Self { hand: 0 });
        }
        let hand = buf.read_var_int()?;
        if !(0..=1).contains(&hand) {
            return Err(ProtocolError::InvalidDiscriminant {
                field: "hand",
                value: hand as i64,
            });
        }
        Ok(Self { hand })
    }
}

impl Encode for ArmAnimation {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        if version < V1_8 {
            buf.put_i32(0);
            buf.put_i8(SWING_ARM);
        } else if version >= V1_9 {
            buf.put_var_int(self.hand);
        }
    }
}
