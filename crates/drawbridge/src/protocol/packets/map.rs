//! Map pictures and the inventory slot that displays them.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::Encode;
use crate::protocol::buffer::WriteExt;
use crate::protocol::nbt::Compound;
use crate::protocol::version::ProtocolVersion::{self, *};
use crate::protocol::version::VersionTable;

/// Map pictures are always 128x128 palette indices, row-major
pub const MAP_SIZE: usize = 128;

/// The only map the fallback world ever shows
pub const MAP_ID: i32 = 0;

/// Wire layout of the map picture packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapLayout {
    /// One packet per column
    Legacy,
    V1_8,
    /// Adds the tracking flag
    V1_9,
    /// Adds the locked flag
    V1_14,
    /// Icons become optional
    V1_17,
}

static LAYOUTS: VersionTable<MapLayout> = VersionTable::new(&[
    (V1_7_2, MapLayout::Legacy),
    (V1_8, MapLayout::V1_8),
    (V1_9, MapLayout::V1_9),
    (V1_14, MapLayout::V1_14),
    (V1_17, MapLayout::V1_17),
]);

impl MapLayout {
    /// Layouts carrying the whole picture in a single packet
    pub const MODERN: [MapLayout; 4] = [
        MapLayout::V1_8,
        MapLayout::V1_9,
        MapLayout::V1_14,
        MapLayout::V1_17,
    ];

    pub fn for_version(version: ProtocolVersion) -> Self {
        LAYOUTS.get(version).unwrap_or(MapLayout::Legacy)
    }

    /// Position inside [`MapLayout::MODERN`]
    pub fn modern_index(self) -> Option<usize> {
        Self::MODERN.iter().position(|layout| *layout == self)
    }
}

/// Body of a single-packet picture for a modern layout
pub fn encode_map_body(layout: MapLayout, colors: &[u8]) -> Bytes {
    debug_assert_eq!(colors.len(), MAP_SIZE * MAP_SIZE);
    let mut buf = BytesMut::with_capacity(colors.len() + 16);
    buf.put_var_int(MAP_ID);
    // scale
    buf.put_i8(0);
    match layout {
        MapLayout::Legacy | MapLayout::V1_8 => buf.put_var_int(0),
        MapLayout::V1_9 => {
            buf.put_bool(false);
            buf.put_var_int(0);
        }
        MapLayout::V1_14 => {
            buf.put_bool(false);
            buf.put_bool(false);
            buf.put_var_int(0);
        }
        MapLayout::V1_17 => {
            buf.put_bool(false);
            buf.put_bool(false);
        }
    }
    buf.put_u8(MAP_SIZE as u8);
    buf.put_u8(MAP_SIZE as u8);
    buf.put_u8(0);
    buf.put_u8(0);
    buf.put_byte_array(colors);
    buf.freeze()
}

/// 1.7 bodies: one packet per column of 128 pixels
pub fn encode_legacy_columns(colors: &[u8]) -> Vec<Bytes> {
    debug_assert_eq!(colors.len(), MAP_SIZE * MAP_SIZE);
    (0..MAP_SIZE)
        .map(|x| {
            let mut buf = BytesMut::with_capacity(MAP_SIZE + 8);
            buf.put_var_int(MAP_ID);
            buf.put_i16(MAP_SIZE as i16 + 3);
            // colour column marker, column, starting row
            buf.put_u8(0);
            buf.put_u8(x as u8);
            buf.put_u8(0);
            for y in 0..MAP_SIZE {
                buf.put_u8(colors[y * MAP_SIZE + x]);
            }
            buf.freeze()
        })
        .collect()
}

/// Pre-encoded map picture body; the packet id is added per revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapData {
    pub body: Bytes,
}

impl Encode for MapData {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_slice(&self.body);
    }
}

/// Item id of `filled_map` per revision
static FILLED_MAP: VersionTable<i32> = VersionTable::new(&[
    (V1_7_2, 358),
    (V1_13, 608),
    (V1_13_1, 613),
    (V1_14, 671),
    (V1_16, 733),
    (V1_17, 847),
    (V1_19, 886),
    (V1_19_3, 914),
    (V1_19_4, 937),
    (V1_20, 941),
]);

/// First hotbar slot in the player inventory window
pub const HOTBAR_START: i16 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotItem {
    Empty,
    FilledMap { map_id: i32 },
}

impl SlotItem {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        let SlotItem::FilledMap { map_id } = *self else {
            if version >= V1_13_2 {
                buf.put_bool(false);
            } else {
                buf.put_i16(-1);
            }
            return;
        };

        let item_id = FILLED_MAP.get(version).unwrap_or(358);
        if version < V1_13 {
            buf.put_i16(item_id as i16);
            buf.put_i8(1);
            // damage selects the map
            buf.put_i16(map_id as i16);
            if version < V1_8 {
                buf.put_i16(-1);
            } else {
                buf.put_u8(0);
            }
            return;
        }

        if version >= V1_13_2 {
            buf.put_bool(true);
            buf.put_var_int(item_id);
        } else {
            buf.put_i16(item_id as i16);
        }
        buf.put_i8(1);
        Compound::new().with("map", map_id).write_root(buf);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSlot {
    pub window_id: i8,
    pub state_id: i32,
    pub slot: i16,
    pub item: SlotItem,
}

impl SetSlot {
    /// Map in the given hotbar slot (0-8) of the player inventory
    pub fn hotbar_map(hotbar: i16) -> Self {
        Self {
            window_id: 0,
            state_id: 0,
            slot: HOTBAR_START + hotbar,
            item: SlotItem::FilledMap { map_id: MAP_ID },
        }
    }
}

impl Encode for SetSlot {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_i8(self.window_id);
        if version >= V1_17_1 {
            buf.put_var_int(self.state_id);
        }
        buf.put_i16(self.slot);
        self.item.encode(buf, version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_selection() {
        assert_eq!(MapLayout::for_version(V1_7_6), MapLayout::Legacy);
        assert_eq!(MapLayout::for_version(V1_8), MapLayout::V1_8);
        assert_eq!(MapLayout::for_version(V1_13_2), MapLayout::V1_9);
        assert_eq!(MapLayout::for_version(V1_16_2), MapLayout::V1_14);
        assert_eq!(MapLayout::for_version(V1_20), MapLayout::V1_17);
        assert_eq!(MapLayout::Legacy.modern_index(), None);
        assert_eq!(MapLayout::V1_17.modern_index(), Some(3));
    }

    #[test]
    fn test_legacy_columns() {
        let mut colors = vec![0u8; MAP_SIZE * MAP_SIZE];
        colors[5 * MAP_SIZE + 2] = 42;
        let columns = encode_legacy_columns(&colors);
        assert_eq!(columns.len(), MAP_SIZE);
        let column = &columns[2];
        // map id, length, marker, x, start row
        assert_eq!(&column[..6], &[0, 0, 131, 0, 2, 0]);
        assert_eq!(column[6 + 5], 42);
    }

    #[test]
    fn test_body_sizes() {
        let colors = vec![4u8; MAP_SIZE * MAP_SIZE];
        let len = |layout| encode_map_body(layout, &colors).len();
        let pixels = MAP_SIZE * MAP_SIZE + 3;
        assert_eq!(len(MapLayout::V1_8), 1 + 1 + 1 + 4 + pixels);
        assert_eq!(len(MapLayout::V1_9), 1 + 1 + 1 + 1 + 4 + pixels);
        assert_eq!(len(MapLayout::V1_14), 1 + 1 + 2 + 1 + 4 + pixels);
        assert_eq!(len(MapLayout::V1_17), 1 + 1 + 2 + 4 + pixels);
    }

    #[test]
    fn test_map_item_encoding() {
        let slot = SetSlot::hotbar_map(0);
        let mut legacy = BytesMut::new();
        slot.encode(&mut legacy, V1_8);
        // window, slot 36, item 358, count, damage, no nbt
        assert_eq!(&legacy[..], &[0, 0, 36, 0x01, 0x66, 1, 0, 0, 0]);

        let mut modern = BytesMut::new();
        slot.encode(&mut modern, V1_20);
        // window, state id, slot, present, item id 941 as varint
        assert_eq!(&modern[..7], &[0, 0, 0, 36, 1, 0xAD, 0x07]);
    }
}
