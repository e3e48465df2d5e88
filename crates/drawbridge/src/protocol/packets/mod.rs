//! Packet sets used during verification, and id dispatch per revision.

pub mod chat;
pub mod ids;
pub mod join;
pub mod login;
pub mod map;
pub mod play;
pub mod world;

use bytes::{Bytes, BytesMut};

use super::buffer::{ProtocolError, ReadExt, Result, WriteExt, expect_consumed};
use super::version::{ProtocolVersion, VersionTable};
use super::{Decode, Encode};

pub use chat::{Disconnect, SystemChat};
pub use join::JoinGame;
pub use login::{Handshake, LoginDisconnect, LoginStart, LoginSuccess, NextState};
pub use map::{MapData, MapLayout, SetSlot};
pub use play::{
    ArmAnimation, Chat, ClientSettings, HeldItemChange, KeepAlive, OnGround, PluginMessage,
    Position, PositionRotation, Rotation, TeleportConfirm,
};
pub use world::{BlockChange, BlockKind, EmptyChunk, PlayerAbilities, PositionLook, SetExperience};

/// Play phase packets a client may send during verification
#[derive(Debug, Clone, PartialEq)]
pub enum Serverbound {
    KeepAlive(KeepAlive),
    ClientSettings(ClientSettings),
    PluginMessage(PluginMessage),
    Chat(Chat),
    Position(Position),
    PositionRotation(PositionRotation),
    Rotation(Rotation),
    OnGround(OnGround),
    TeleportConfirm(TeleportConfirm),
    HeldItemChange(HeldItemChange),
    ArmAnimation(ArmAnimation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerboundKind {
    KeepAlive,
    ClientSettings,
    PluginMessage,
    Chat,
    Position,
    PositionRotation,
    Rotation,
    OnGround,
    TeleportConfirm,
    HeldItemChange,
    ArmAnimation,
}

impl ServerboundKind {
    pub const ALL: [ServerboundKind; 11] = [
        Self::KeepAlive,
        Self::ClientSettings,
        Self::PluginMessage,
        Self::Chat,
        Self::Position,
        Self::PositionRotation,
        Self::Rotation,
        Self::OnGround,
        Self::TeleportConfirm,
        Self::HeldItemChange,
        Self::ArmAnimation,
    ];

    fn table(self) -> &'static VersionTable<i32> {
        use ids::serverbound::*;
        match self {
            Self::KeepAlive => &KEEP_ALIVE,
            Self::ClientSettings => &CLIENT_SETTINGS,
            Self::PluginMessage => &PLUGIN_MESSAGE,
            Self::Chat => &CHAT,
            Self::Position => &POSITION,
            Self::PositionRotation => &POSITION_ROTATION,
            Self::Rotation => &ROTATION,
            Self::OnGround => &ON_GROUND,
            Self::TeleportConfirm => &TELEPORT_CONFIRM,
            Self::HeldItemChange => &HELD_ITEM_CHANGE,
            Self::ArmAnimation => &ARM_ANIMATION,
        }
    }

    pub fn id(self, version: ProtocolVersion) -> Option<i32> {
        self.table().get(version)
    }

    pub fn from_id(id: i32, version: ProtocolVersion) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id(version) == Some(id))
    }
}

impl Serverbound {
    pub fn kind(&self) -> ServerboundKind {
        match self {
            Self::KeepAlive(_) => ServerboundKind::KeepAlive,
            Self::ClientSettings(_) => ServerboundKind::ClientSettings,
            Self::PluginMessage(_) => ServerboundKind::PluginMessage,
            Self::Chat(_) => ServerboundKind::Chat,
            Self::Position(_) => ServerboundKind::Position,
            Self::PositionRotation(_) => ServerboundKind::PositionRotation,
            Self::Rotation(_) => ServerboundKind::Rotation,
            Self::OnGround(_) => ServerboundKind::OnGround,
            Self::TeleportConfirm(_) => ServerboundKind::TeleportConfirm,
            Self::HeldItemChange(_) => ServerboundKind::HeldItemChange,
            Self::ArmAnimation(_) => ServerboundKind::ArmAnimation,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind() {
            ServerboundKind::KeepAlive => "keep alive",
            ServerboundKind::ClientSettings => "client settings",
            ServerboundKind::PluginMessage => "plugin message",
            ServerboundKind::Chat => "chat",
            ServerboundKind::Position => "position",
            ServerboundKind::PositionRotation => "position rotation",
            ServerboundKind::Rotation => "rotation",
            ServerboundKind::OnGround => "on ground",
            ServerboundKind::TeleportConfirm => "teleport confirm",
            ServerboundKind::HeldItemChange => "held item change",
            ServerboundKind::ArmAnimation => "arm animation",
        }
    }

    /// Decode one frame (`id + body`); leftover bytes are an error
    pub fn decode_frame(mut frame: Bytes, version: ProtocolVersion) -> Result<Self> {
        let id = frame.read_var_int()?;
        let kind = ServerboundKind::from_id(id, version).ok_or(ProtocolError::UnknownPacket(id))?;
        let buf = &mut frame;
        let packet = match kind {
            ServerboundKind::KeepAlive => Self::KeepAlive(KeepAlive::decode(buf, version)?),
            ServerboundKind::ClientSettings => {
                Self::ClientSettings(ClientSettings::decode(buf, version)?)
            }
            ServerboundKind::PluginMessage => {
                Self::PluginMessage(PluginMessage::decode(buf, version)?)
            }
            ServerboundKind::Chat => Self::Chat(Chat::decode(buf, version)?),
            ServerboundKind::Position => Self::Position(Position::decode(buf, version)?),
            ServerboundKind::PositionRotation => {
                Self::PositionRotation(PositionRotation::decode(buf, version)?)
            }
            ServerboundKind::Rotation => Self::Rotation(Rotation::decode(buf, version)?),
            ServerboundKind::OnGround => Self::OnGround(OnGround::decode(buf, version)?),
            ServerboundKind::TeleportConfirm => {
                Self::TeleportConfirm(TeleportConfirm::decode(buf, version)?)
            }
            ServerboundKind::HeldItemChange => {
                Self::HeldItemChange(HeldItemChange::decode(buf, version)?)
            }
            ServerboundKind::ArmAnimation => {
                Self::ArmAnimation(ArmAnimation::decode(buf, version)?)
            }
        };
        expect_consumed(&frame)?;
        Ok(packet)
    }

    /// Encode as a client would.
    ///
    /// # Panics
    /// If the packet does not exist on `version`.
    pub fn encode_frame(&self, version: ProtocolVersion) -> Bytes {
        let id = self
            .kind()
            .id(version)
            .unwrap_or_else(|| panic!("{} is not sent on {version}", self.name()));
        let mut buf = BytesMut::new();
        buf.put_var_int(id);
        let body: &dyn Encode = match self {
            Self::KeepAlive(packet) => packet,
            Self::ClientSettings(packet) => packet,
            Self::PluginMessage(packet) => packet,
            Self::Chat(packet) => packet,
            Self::Position(packet) => packet,
            Self::PositionRotation(packet) => packet,
            Self::Rotation(packet) => packet,
            Self::OnGround(packet) => packet,
            Self::TeleportConfirm(packet) => packet,
            Self::HeldItemChange(packet) => packet,
            Self::ArmAnimation(packet) => packet,
        };
        body.encode(&mut buf, version);
        buf.freeze()
    }
}

/// Play phase packets the fallback server sends
#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    KeepAlive(KeepAlive),
    JoinGame(JoinGame),
    PositionLook(PositionLook),
    EmptyChunk(EmptyChunk),
    BlockChange(BlockChange),
    SetSlot(SetSlot),
    MapData(MapData),
    SetExperience(SetExperience),
    PlayerAbilities(PlayerAbilities),
    SystemChat(SystemChat),
    Disconnect(Disconnect),
}

impl Clientbound {
    fn table(&self) -> &'static VersionTable<i32> {
        use ids::clientbound::*;
        match self {
            Self::KeepAlive(_) => &KEEP_ALIVE,
            Self::JoinGame(_) => &JOIN_GAME,
            Self::PositionLook(_) => &POSITION_LOOK,
            Self::EmptyChunk(_) => &CHUNK_DATA,
            Self::BlockChange(_) => &BLOCK_CHANGE,
            Self::SetSlot(_) => &SET_SLOT,
            Self::MapData(_) => &MAP_DATA,
            Self::SetExperience(_) => &SET_EXPERIENCE,
            Self::PlayerAbilities(_) => &PLAYER_ABILITIES,
            Self::SystemChat(_) => &SYSTEM_CHAT,
            Self::Disconnect(_) => &DISCONNECT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::KeepAlive(_) => "keep alive",
            Self::JoinGame(_) => "join game",
            Self::PositionLook(_) => "position look",
            Self::EmptyChunk(_) => "chunk data",
            Self::BlockChange(_) => "block change",
            Self::SetSlot(_) => "set slot",
            Self::MapData(_) => "map data",
            Self::SetExperience(_) => "set experience",
            Self::PlayerAbilities(_) => "player abilities",
            Self::SystemChat(_) => "system chat",
            Self::Disconnect(_) => "disconnect",
        }
    }

    pub fn is_supported(&self, version: ProtocolVersion) -> bool {
        self.table().get(version).is_some()
    }

    /// Frame body (`id + fields`) for `version`.
    ///
    /// # Panics
    /// If the packet does not exist on `version`; callers check
    /// [`Clientbound::is_supported`] first.
    pub fn encode_frame(&self, version: ProtocolVersion) -> Bytes {
        let id = self
            .table()
            .get(version)
            .unwrap_or_else(|| panic!("{} is not sent on {version}", self.name()));
        let mut buf = BytesMut::new();
        buf.put_var_int(id);
        let body: &dyn Encode = match self {
            Self::KeepAlive(packet) => packet,
            Self::JoinGame(packet) => packet,
            Self::PositionLook(packet) => packet,
            Self::EmptyChunk(packet) => packet,
            Self::BlockChange(packet) => packet,
            Self::SetSlot(packet) => packet,
            Self::MapData(packet) => packet,
            Self::SetExperience(packet) => packet,
            Self::PlayerAbilities(packet) => packet,
            Self::SystemChat(packet) => packet,
            Self::Disconnect(packet) => packet,
        };
        body.encode(&mut buf, version);
        buf.freeze()
    }
}
