//! Server-to-client packets that build the fallback world.

use bytes::{BufMut, BytesMut};

use crate::protocol::Encode;
use crate::protocol::buffer::WriteExt;
use crate::protocol::nbt::{Compound, Tag};
use crate::protocol::version::ProtocolVersion::{self, *};

const EYE_HEIGHT: f64 = 1.62;

/// Absolute teleport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub teleport_id: i32,
}

impl Encode for PositionLook {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_f64(self.x);
        // 1.7 clients expect eye height here
        buf.put_f64(if version < V1_8 { self.y + EYE_HEIGHT } else { self.y });
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        if version < V1_8 {
            buf.put_bool(false);
            return;
        }
        buf.put_u8(0x00);
        if version >= V1_9 {
            buf.put_var_int(self.teleport_id);
        }
        if version >= V1_17 && version < V1_19_4 {
            buf.put_bool(false);
        }
    }
}

/// Chunk column with no blocks, so the client leaves the loading screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyChunk {
    pub x: i32,
    pub z: i32,
}

/// One 1.18+ chunk section: no blocks, single air palette, single biome palette
const SECTION: [u8; 8] = [0, 0, 0, 0, 0, 0, 1, 0];

/// 1.18+ light data: trust edges, empty masks, one all-empty block light mask
const LIGHT: [u8; 15] = [1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 3, 0xFF, 0xFF, 0, 0];

/// zlib stream (stored block) of 256 zero biome bytes for 1.7
const LEGACY_BIOMES_ZLIB: [u8; 2 + 5 + 256 + 4] = legacy_biomes_zlib();

const fn legacy_biomes_zlib() -> [u8; 267] {
    let mut data = [0u8; 267];
    data[0] = 0x78;
    data[1] = 0x01;
    // final stored block, LEN = 256, NLEN = !256 (little endian)
    data[2] = 0x01;
    data[3] = 0x00;
    data[4] = 0x01;
    data[5] = 0xFF;
    data[6] = 0xFE;
    // adler32 of 256 zero bytes: a = 1, b = 256
    data[263] = 0x01;
    data[264] = 0x00;
    data[265] = 0x00;
    data[266] = 0x01;
    data
}

fn heightmaps(version: ProtocolVersion) -> Compound {
    let longs = if version >= V1_18 { 37 } else { 36 };
    Compound::new().with("MOTION_BLOCKING", Tag::LongArray(vec![0; longs]))
}

impl Encode for EmptyChunk {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_i32(self.x);
        buf.put_i32(self.z);

        if version < V1_8 {
            buf.put_bool(true);
            buf.put_u16(0);
            buf.put_u16(0);
            buf.put_i32(LEGACY_BIOMES_ZLIB.len() as i32);
            buf.put_slice(&LEGACY_BIOMES_ZLIB);
            return;
        }

        if version < V1_17 {
            buf.put_bool(true);
        }
        if version >= V1_16 && version < V1_16_2 {
            // ignore old light data
            buf.put_bool(true);
        }

        if version == V1_8 {
            buf.put_u16(0);
        } else if version < V1_17 {
            buf.put_var_int(0);
        } else if version < V1_18 {
            // empty section bitset
            buf.put_var_int(0);
        }

        if version >= V1_14 {
            heightmaps(version).write_root(buf);
            if version >= V1_15 && version < V1_18 {
                if version >= V1_16_2 {
                    buf.put_var_int(1024);
                    for _ in 0..1024 {
                        buf.put_var_int(1);
                    }
                } else {
                    for _ in 0..1024 {
                        buf.put_i32(1);
                    }
                }
            }
        }

        if version < V1_13 {
            buf.put_byte_array(&[0u8; 256]);
        } else if version < V1_15 {
            buf.put_byte_array(&[0u8; 1024]);
        } else if version < V1_18 {
            buf.put_var_int(0);
        } else {
            buf.put_var_int((SECTION.len() * 16) as i32);
            for _ in 0..16 {
                buf.put_slice(&SECTION);
            }
        }

        if version >= V1_9_4 {
            // block entities
            buf.put_var_int(0);
        }

        if version >= V1_20 {
            buf.put_slice(&LIGHT[1..]);
        } else if version >= V1_18 {
            buf.put_slice(&LIGHT);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Air,
    Stone,
}

impl BlockKind {
    /// Legacy id and metadata (pre-1.13)
    fn legacy(self) -> (i32, u8) {
        match self {
            BlockKind::Air => (0, 0),
            BlockKind::Stone => (1, 0),
        }
    }

    /// Global block state id on this revision
    pub fn state_id(self, version: ProtocolVersion) -> i32 {
        let (id, meta) = self.legacy();
        if version >= V1_13 {
            // flattened: stone is the first non-air state
            id
        } else {
            id << 4 | meta as i32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChange {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block: BlockKind,
}

/// Packed block position
pub fn pack_position(x: i32, y: i32, z: i32, version: ProtocolVersion) -> i64 {
    let x = (x as i64) & 0x3FF_FFFF;
    let y = (y as i64) & 0xFFF;
    let z = (z as i64) & 0x3FF_FFFF;
    if version >= V1_14 {
        x << 38 | z << 12 | y
    } else {
        x << 38 | y << 26 | z
    }
}

impl Encode for BlockChange {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        if version < V1_8 {
            let (id, meta) = self.block.legacy();
            buf.put_i32(self.x);
            buf.put_u8(self.y as u8);
            buf.put_i32(self.z);
            buf.put_var_int(id);
            buf.put_u8(meta);
            return;
        }
        buf.put_i64(pack_position(self.x, self.y, self.z, version));
        buf.put_var_int(self.block.state_id(version));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerAbilities {
    pub flags: u8,
    pub flying_speed: f32,
    pub walking_speed: f32,
}

impl PlayerAbilities {
    pub const INVULNERABLE: u8 = 0x01;
    pub const FLYING: u8 = 0x02;

    /// Invulnerable, walking, vanilla speeds
    pub fn grounded() -> Self {
        Self {
            flags: Self::INVULNERABLE,
            flying_speed: 0.05,
            walking_speed: 0.1,
        }
    }

    /// Hovering in place with no movement speed
    pub fn frozen() -> Self {
        Self {
            flags: Self::INVULNERABLE | Self::FLYING,
            flying_speed: 0.0,
            walking_speed: 0.0,
        }
    }
}

impl Encode for PlayerAbilities {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_u8(self.flags);
        buf.put_f32(self.flying_speed);
        buf.put_f32(self.walking_speed);
    }
}

/// Experience bar, used as a countdown display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetExperience {
    pub bar: f32,
    pub level: i32,
    pub total: i32,
}

impl Encode for SetExperience {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_f32(self.bar);
        if version < V1_8 {
            buf.put_i16(self.level as i16);
            buf.put_i16(self.total as i16);
        } else {
            buf.put_var_int(self.level);
            buf.put_var_int(self.total);
        }
    }
}
