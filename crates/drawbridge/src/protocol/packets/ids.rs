//! Packet ids per revision.
//!
//! Each table lists the revision where an id changed and the new value.

use crate::protocol::version::{ProtocolVersion::*, VersionTable};

/// Login phase ids are stable across every supported revision
pub mod login {
    pub const HANDSHAKE: i32 = 0x00;
    pub const LOGIN_START: i32 = 0x00;
    pub const DISCONNECT: i32 = 0x00;
    pub const SUCCESS: i32 = 0x02;
}

pub mod clientbound {
    use super::*;

    pub static KEEP_ALIVE: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x00),
        (V1_9, 0x1F),
        (V1_13, 0x21),
        (V1_14, 0x20),
        (V1_15, 0x21),
        (V1_16, 0x20),
        (V1_16_2, 0x1F),
        (V1_17, 0x21),
        (V1_19, 0x1E),
        (V1_19_1, 0x20),
        (V1_19_3, 0x1F),
        (V1_19_4, 0x23),
    ]);

    pub static JOIN_GAME: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x01),
        (V1_9, 0x23),
        (V1_13, 0x25),
        (V1_15, 0x26),
        (V1_16, 0x25),
        (V1_16_2, 0x24),
        (V1_17, 0x26),
        (V1_19, 0x23),
        (V1_19_1, 0x25),
        (V1_19_3, 0x24),
        (V1_19_4, 0x28),
    ]);

    pub static DISCONNECT: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x40),
        (V1_9, 0x1A),
        (V1_13, 0x1B),
        (V1_14, 0x1A),
        (V1_15, 0x1B),
        (V1_16, 0x1A),
        (V1_16_2, 0x19),
        (V1_17, 0x1A),
        (V1_19, 0x17),
        (V1_19_1, 0x19),
        (V1_19_3, 0x17),
        (V1_19_4, 0x1A),
    ]);

    /// Chat before 1.19, system chat afterwards
    pub static SYSTEM_CHAT: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x02),
        (V1_9, 0x0F),
        (V1_13, 0x0E),
        (V1_15, 0x0F),
        (V1_16, 0x0E),
        (V1_17, 0x0F),
        (V1_19, 0x5F),
        (V1_19_1, 0x62),
        (V1_19_3, 0x60),
        (V1_19_4, 0x64),
    ]);

    pub static POSITION_LOOK: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x08),
        (V1_9, 0x2E),
        (V1_12_1, 0x2F),
        (V1_13, 0x32),
        (V1_14, 0x35),
        (V1_15, 0x36),
        (V1_16, 0x35),
        (V1_16_2, 0x34),
        (V1_17, 0x38),
        (V1_19, 0x36),
        (V1_19_1, 0x39),
        (V1_19_3, 0x38),
        (V1_19_4, 0x3C),
    ]);

    pub static CHUNK_DATA: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x21),
        (V1_9, 0x20),
        (V1_13, 0x22),
        (V1_14, 0x21),
        (V1_15, 0x22),
        (V1_16, 0x21),
        (V1_16_2, 0x20),
        (V1_17, 0x22),
        (V1_19, 0x1F),
        (V1_19_1, 0x21),
        (V1_19_3, 0x20),
        (V1_19_4, 0x24),
    ]);

    pub static BLOCK_CHANGE: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x23),
        (V1_9, 0x0B),
        (V1_15, 0x0C),
        (V1_16, 0x0B),
        (V1_17, 0x0C),
        (V1_19, 0x09),
        (V1_19_4, 0x0A),
    ]);

    pub static SET_SLOT: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x2F),
        (V1_9, 0x16),
        (V1_13, 0x17),
        (V1_14, 0x16),
        (V1_15, 0x17),
        (V1_16, 0x16),
        (V1_16_2, 0x15),
        (V1_17, 0x16),
        (V1_19, 0x13),
        (V1_19_3, 0x12),
        (V1_19_4, 0x14),
    ]);

    pub static MAP_DATA: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x34),
        (V1_9, 0x24),
        (V1_13, 0x26),
        (V1_15, 0x27),
        (V1_16, 0x26),
        (V1_16_2, 0x25),
        (V1_17, 0x27),
        (V1_19, 0x24),
        (V1_19_1, 0x26),
        (V1_19_3, 0x25),
        (V1_19_4, 0x29),
    ]);

    pub static SET_EXPERIENCE: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x1F),
        (V1_9, 0x3D),
        (V1_12, 0x3F),
        (V1_12_1, 0x40),
        (V1_13, 0x43),
        (V1_14, 0x47),
        (V1_15, 0x48),
        (V1_17, 0x51),
        (V1_19_1, 0x54),
        (V1_19_3, 0x52),
        (V1_19_4, 0x56),
    ]);

    pub static PLAYER_ABILITIES: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x39),
        (V1_9, 0x2B),
        (V1_12_1, 0x2C),
        (V1_13, 0x2E),
        (V1_14, 0x31),
        (V1_15, 0x32),
        (V1_16, 0x31),
        (V1_16_2, 0x30),
        (V1_17, 0x32),
        (V1_19, 0x2F),
        (V1_19_1, 0x31),
        (V1_19_3, 0x30),
        (V1_19_4, 0x34),
    ]);

    pub static ALL: [&VersionTable<i32>; 11] = [
        &KEEP_ALIVE,
        &JOIN_GAME,
        &DISCONNECT,
        &SYSTEM_CHAT,
        &POSITION_LOOK,
        &CHUNK_DATA,
        &BLOCK_CHANGE,
        &SET_SLOT,
        &MAP_DATA,
        &SET_EXPERIENCE,
        &PLAYER_ABILITIES,
    ];
}

pub mod serverbound {
    use super::*;

    pub static KEEP_ALIVE: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x00),
        (V1_9, 0x0B),
        (V1_12, 0x0C),
        (V1_12_1, 0x0B),
        (V1_13, 0x0E),
        (V1_14, 0x0F),
        (V1_16, 0x10),
        (V1_17, 0x0F),
        (V1_19, 0x11),
        (V1_19_1, 0x12),
        (V1_19_3, 0x11),
        (V1_19_4, 0x12),
    ]);

    pub static CHAT: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x01),
        (V1_9, 0x02),
        (V1_12, 0x03),
        (V1_12_1, 0x02),
        (V1_14, 0x03),
        (V1_19, 0x04),
        (V1_19_1, 0x05),
    ]);

    pub static CLIENT_SETTINGS: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x15),
        (V1_9, 0x04),
        (V1_12, 0x05),
        (V1_12_1, 0x04),
        (V1_14, 0x05),
        (V1_19, 0x07),
        (V1_19_1, 0x08),
        (V1_19_3, 0x07),
        (V1_19_4, 0x08),
    ]);

    pub static PLUGIN_MESSAGE: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x17),
        (V1_9, 0x09),
        (V1_12, 0x0A),
        (V1_12_1, 0x09),
        (V1_13, 0x0A),
        (V1_14, 0x0B),
        (V1_17, 0x0A),
        (V1_19, 0x0C),
        (V1_19_1, 0x0D),
        (V1_19_3, 0x0C),
        (V1_19_4, 0x0D),
    ]);

    pub static POSITION: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x04),
        (V1_9, 0x0C),
        (V1_12, 0x0E),
        (V1_12_1, 0x0D),
        (V1_13, 0x10),
        (V1_14, 0x11),
        (V1_16, 0x12),
        (V1_17, 0x11),
        (V1_19, 0x13),
        (V1_19_1, 0x14),
        (V1_19_3, 0x13),
        (V1_19_4, 0x14),
    ]);

    pub static POSITION_ROTATION: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x06),
        (V1_9, 0x0D),
        (V1_12, 0x0F),
        (V1_12_1, 0x0E),
        (V1_13, 0x11),
        (V1_14, 0x12),
        (V1_16, 0x13),
        (V1_17, 0x12),
        (V1_19, 0x14),
        (V1_19_1, 0x15),
        (V1_19_3, 0x14),
        (V1_19_4, 0x15),
    ]);

    pub static ROTATION: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x05),
        (V1_9, 0x0E),
        (V1_12, 0x10),
        (V1_12_1, 0x0F),
        (V1_13, 0x12),
        (V1_14, 0x13),
        (V1_16, 0x14),
        (V1_17, 0x13),
        (V1_19, 0x15),
        (V1_19_1, 0x16),
        (V1_19_3, 0x15),
        (V1_19_4, 0x16),
    ]);

    pub static ON_GROUND: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x03),
        (V1_9, 0x0F),
        (V1_12, 0x0D),
        (V1_12_1, 0x0C),
        (V1_13, 0x0F),
        (V1_14, 0x14),
        (V1_16, 0x15),
        (V1_17, 0x14),
        (V1_19, 0x16),
        (V1_19_1, 0x17),
        (V1_19_3, 0x16),
        (V1_19_4, 0x17),
    ]);

    pub static TELEPORT_CONFIRM: VersionTable<i32> = VersionTable::new(&[(V1_9, 0x00)]);

    pub static HELD_ITEM_CHANGE: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x09),
        (V1_9, 0x17),
        (V1_12, 0x1A),
        (V1_13, 0x21),
        (V1_14, 0x23),
        (V1_16, 0x24),
        (V1_16_2, 0x25),
        (V1_19, 0x27),
        (V1_19_1, 0x28),
    ]);

    pub static ARM_ANIMATION: VersionTable<i32> = VersionTable::new(&[
        (V1_7_2, 0x0A),
        (V1_9, 0x1A),
        (V1_12, 0x1D),
        (V1_13, 0x27),
        (V1_14, 0x2A),
        (V1_16, 0x2B),
        (V1_16_2, 0x2C),
        (V1_19, 0x2E),
        (V1_19_1, 0x2F),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::version::ProtocolVersion;

    fn serverbound_tables() -> [&'static VersionTable<i32>; 11] {
        [
            &serverbound::KEEP_ALIVE,
            &serverbound::CHAT,
            &serverbound::CLIENT_SETTINGS,
            &serverbound::PLUGIN_MESSAGE,
            &serverbound::POSITION,
            &serverbound::POSITION_ROTATION,
            &serverbound::ROTATION,
            &serverbound::ON_GROUND,
            &serverbound::TELEPORT_CONFIRM,
            &serverbound::HELD_ITEM_CHANGE,
            &serverbound::ARM_ANIMATION,
        ]
    }

    #[test]
    fn test_tables_cover_every_version() {
        for table in clientbound::ALL.iter().chain(serverbound_tables().iter()) {
            assert!(table.is_well_formed());
        }
        for version in ProtocolVersion::ALL {
            for table in clientbound::ALL {
                assert!(table.get(version).is_some(), "missing clientbound id on {version}");
            }
            for (index, table) in serverbound_tables().iter().enumerate() {
                // teleport confirmation only exists from 1.9 on
                if index == 8 && version < ProtocolVersion::V1_9 {
                    assert!(table.get(version).is_none());
                    continue;
                }
                assert!(table.get(version).is_some(), "missing serverbound id on {version}");
            }
        }
    }

    #[test]
    fn test_serverbound_ids_unique_per_version() {
        for version in ProtocolVersion::ALL {
            let mut ids: Vec<i32> = serverbound_tables()
                .iter()
                .filter_map(|table| table.get(version))
                .collect();
            let total = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), total, "duplicate serverbound id on {version}");
        }
    }
}
