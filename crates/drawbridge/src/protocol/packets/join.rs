//! Join packet and the registry data it carries from 1.16 on.

use bytes::{BufMut, BytesMut};

use crate::protocol::Encode;
use crate::protocol::buffer::WriteExt;
use crate::protocol::nbt::{Compound, Tag};
use crate::protocol::version::ProtocolVersion::{self, *};

const OVERWORLD: &str = "minecraft:overworld";
const LEVEL_TYPE: &str = "flat";

/// Adventure mode, so nothing can be broken or placed
pub const ADVENTURE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub game_mode: u8,
    pub view_distance: i32,
}

impl JoinGame {
    pub fn new(entity_id: i32) -> Self {
        Self {
            entity_id,
            game_mode: ADVENTURE,
            view_distance: 2,
        }
    }
}

impl Encode for JoinGame {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_i32(self.entity_id);

        if version < V1_16 {
            buf.put_u8(self.game_mode);
            if version < V1_9_1 {
                buf.put_i8(0);
            } else {
                buf.put_i32(0);
            }
            if version < V1_14 {
                // peaceful
                buf.put_u8(0);
            }
            if version >= V1_15 {
                // hashed seed
                buf.put_i64(0);
            }
            // max players
            buf.put_u8(1);
            buf.put_string(LEVEL_TYPE);
            if version >= V1_14 {
                buf.put_var_int(self.view_distance);
            }
            if version >= V1_8 {
                // reduced debug info
                buf.put_bool(false);
            }
            if version >= V1_15 {
                // respawn screen
                buf.put_bool(true);
            }
            return;
        }

        if version >= V1_16_2 {
            // hardcore
            buf.put_bool(false);
        }
        buf.put_u8(self.game_mode);
        // previous game mode
        buf.put_i8(-1);
        buf.put_var_int(1);
        buf.put_string(OVERWORLD);
        registry_codec(version).write_root(buf);
        if version >= V1_16_2 && version < V1_19 {
            dimension_type(version).write_root(buf);
        } else {
            buf.put_string(OVERWORLD);
        }
        buf.put_string(OVERWORLD);
        buf.put_i64(0);
        if version >= V1_16_2 {
            buf.put_var_int(1);
        } else {
            buf.put_u8(1);
        }
        buf.put_var_int(self.view_distance);
        if version >= V1_18 {
            // simulation distance
            buf.put_var_int(self.view_distance);
        }
        buf.put_bool(false);
        buf.put_bool(true);
        // debug world, flat world
        buf.put_bool(false);
        buf.put_bool(true);
        if version >= V1_19 {
            // no death location
            buf.put_bool(false);
        }
        if version >= V1_20 {
            // portal cooldown
            buf.put_var_int(0);
        }
    }
}

fn dimension_type(version: ProtocolVersion) -> Compound {
    let infiniburn = if version >= V1_18_2 {
        "#minecraft:infiniburn_overworld"
    } else {
        "minecraft:infiniburn_overworld"
    };
    let mut element = Compound::new()
        .with("piglin_safe", false)
        .with("natural", true)
        .with("ambient_light", 0.0f32)
        .with("infiniburn", infiniburn)
        .with("respawn_anchor_works", false)
        .with("has_skylight", true)
        .with("bed_works", true)
        .with("effects", OVERWORLD)
        .with("has_raids", true)
        .with("logical_height", 256)
        .with("coordinate_scale", Tag::Double(1.0))
        .with("ultrawarm", false)
        .with("has_ceiling", false);
    if version >= V1_17 {
        element.push("min_y", 0);
        element.push("height", 256);
    }
    if version >= V1_19 {
        element.push("monster_spawn_light_level", 0);
        element.push("monster_spawn_block_light_limit", 0);
    }
    element
}

/// 1.16 shape: a flat list of named dimensions
fn legacy_dimension_codec() -> Compound {
    let overworld = Compound::new()
        .with("name", OVERWORLD)
        .with("piglin_safe", false)
        .with("natural", true)
        .with("ambient_light", 0.0f32)
        .with("infiniburn", "minecraft:infiniburn_overworld")
        .with("respawn_anchor_works", false)
        .with("has_skylight", true)
        .with("bed_works", true)
        .with("has_raids", true)
        .with("logical_height", 256)
        .with("shrunk", false)
        .with("ultrawarm", false)
        .with("has_ceiling", false);
    Compound::new().with("dimension", Tag::List(vec![overworld.into()]))
}

fn registry(kind: &str, entries: Vec<(&str, Compound)>) -> Compound {
    let value: Vec<Tag> = entries
        .into_iter()
        .enumerate()
        .map(|(id, (name, element))| {
            Tag::Compound(
                Compound::new()
                    .with("name", name)
                    .with("id", id as i32)
                    .with("element", element),
            )
        })
        .collect();
    Compound::new()
        .with("type", kind)
        .with("value", Tag::List(value))
}

fn biome(version: ProtocolVersion, precipitation: bool) -> Compound {
    let mut element = Compound::new();
    if version >= V1_19_4 {
        element.push("has_precipitation", precipitation);
    } else {
        element.push("precipitation", if precipitation { "rain" } else { "none" });
    }
    element.push("temperature", 0.8f32);
    element.push("downfall", 0.4f32);
    if version < V1_18 {
        element.push("depth", 0.125f32);
        element.push("scale", 0.05f32);
    }
    if version < V1_19 {
        element.push("category", if precipitation { "plains" } else { "none" });
    }
    element.push(
        "effects",
        Compound::new()
            .with("sky_color", 7_907_327)
            .with("water_fog_color", 329_011)
            .with("fog_color", 12_638_463)
            .with("water_color", 4_159_204),
    );
    element
}

fn string_list(values: &[&str]) -> Tag {
    Tag::List(values.iter().map(|value| Tag::from(*value)).collect())
}

fn chat_types(version: ProtocolVersion) -> Compound {
    let parameters = || string_list(&["sender", "content"]);
    if version >= V1_19_1 {
        let chat = Compound::new()
            .with(
                "chat",
                Compound::new()
                    .with("translation_key", "chat.type.text")
                    .with("parameters", parameters()),
            )
            .with(
                "narration",
                Compound::new()
                    .with("translation_key", "chat.type.text.narrate")
                    .with("parameters", parameters()),
            );
        return registry("minecraft:chat_type", vec![("minecraft:chat", chat)]);
    }

    let decoration = |key: &str| {
        Compound::new()
            .with("translation_key", key)
            .with("style", Compound::new())
            .with("parameters", parameters())
    };
    let chat = Compound::new()
        .with("chat", Compound::new().with("decoration", decoration("chat.type.text")))
        .with(
            "narration",
            Compound::new()
                .with("decoration", decoration("chat.type.text.narrate"))
                .with("priority", "chat"),
        );
    let system = Compound::new()
        .with("chat", Compound::new())
        .with("narration", Compound::new().with("priority", "system"));
    let game_info = Compound::new().with("overlay", Compound::new());
    registry(
        "minecraft:chat_type",
        vec![
            ("minecraft:chat", chat),
            ("minecraft:system", system),
            ("minecraft:game_info", game_info),
        ],
    )
}

const DAMAGE_TYPES: [&str; 42] = [
    "in_fire",
    "lightning_bolt",
    "on_fire",
    "lava",
    "hot_floor",
    "in_wall",
    "cramming",
    "drown",
    "starve",
    "cactus",
    "fall",
    "fly_into_wall",
    "out_of_world",
    "generic",
    "magic",
    "wither",
    "dragon_breath",
    "dry_out",
    "sweet_berry_bush",
    "freeze",
    "stalagmite",
    "falling_block",
    "falling_anvil",
    "falling_stalactite",
    "sting",
    "mob_attack",
    "mob_attack_no_aggro",
    "player_attack",
    "arrow",
    "trident",
    "mob_projectile",
    "fireworks",
    "fireball",
    "unattributed_fireball",
    "wither_skull",
    "thrown",
    "indirect_magic",
    "thorns",
    "explosion",
    "player_explosion",
    "sonic_boom",
    "bad_respawn_point",
];

const DAMAGE_TYPES_1_20: [&str; 2] = ["outside_border", "generic_kill"];

fn damage_types(version: ProtocolVersion) -> Compound {
    let extra: &[&str] = if version >= V1_20 { &DAMAGE_TYPES_1_20 } else { &[] };
    let names: Vec<String> = DAMAGE_TYPES
        .iter()
        .chain(extra)
        .map(|name| format!("minecraft:{name}"))
        .collect();
    let entries = names
        .iter()
        .map(|name| {
            let element = Compound::new()
                .with("message_id", "generic")
                .with("scaling", "when_caused_by_living_non_player")
                .with("exhaustion", 0.1f32);
            (name.as_str(), element)
        })
        .collect();
    registry("minecraft:damage_type", entries)
}

/// Registry data sent with the join packet
pub fn registry_codec(version: ProtocolVersion) -> Compound {
    if version < V1_16_2 {
        return legacy_dimension_codec();
    }
    let mut codec = Compound::new()
        .with(
            "minecraft:dimension_type",
            registry(
                "minecraft:dimension_type",
                vec![(OVERWORLD, dimension_type(version))],
            ),
        )
        .with(
            "minecraft:worldgen/biome",
            registry(
                "minecraft:worldgen/biome",
                vec![
                    ("minecraft:the_void", biome(version, false)),
                    ("minecraft:plains", biome(version, true)),
                ],
            ),
        );
    if version >= V1_19 {
        codec.push("minecraft:chat_type", chat_types(version));
    }
    if version >= V1_19_4 {
        codec.push("minecraft:damage_type", damage_types(version));
    }
    codec
}
