//! Supported protocol revisions and version-keyed lookup tables.

use std::fmt;

/// A supported wire-protocol revision.
///
/// Variants are declared in release order, so the derived `Ord` matches
/// chronology and every layout switch is a plain range comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V1_7_2,
    V1_7_6,
    V1_8,
    V1_9,
    V1_9_1,
    V1_9_4,
    V1_10,
    V1_11,
    V1_12,
    V1_12_1,
    V1_12_2,
    V1_13,
    V1_13_1,
    V1_13_2,
    V1_14,
    V1_15,
    V1_16,
    V1_16_2,
    V1_17,
    V1_17_1,
    V1_18,
    V1_18_2,
    V1_19,
    V1_19_1,
    V1_19_3,
    V1_19_4,
    V1_20,
}

use ProtocolVersion::*;

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 27] = [
        V1_7_2, V1_7_6, V1_8, V1_9, V1_9_1, V1_9_4, V1_10, V1_11, V1_12, V1_12_1, V1_12_2, V1_13,
        V1_13_1, V1_13_2, V1_14, V1_15, V1_16, V1_16_2, V1_17, V1_17_1, V1_18, V1_18_2, V1_19,
        V1_19_1, V1_19_3, V1_19_4, V1_20,
    ];

    pub const OLDEST: ProtocolVersion = V1_7_2;
    pub const LATEST: ProtocolVersion = V1_20;

    /// Map a raw handshake protocol number onto a supported revision.
    ///
    /// Point releases that share a wire layout collapse onto one variant.
    pub fn from_protocol(raw: i32) -> Option<Self> {
        let version = match raw {
            4 => V1_7_2,
            5 => V1_7_6,
            47 => V1_8,
            107 => V1_9,
            108 | 109 => V1_9_1,
            110 => V1_9_4,
            210 => V1_10,
            315 | 316 => V1_11,
            335 => V1_12,
            338 => V1_12_1,
            340 => V1_12_2,
            393 => V1_13,
            401 => V1_13_1,
            404 => V1_13_2,
            477 | 480 | 485 | 490 | 498 => V1_14,
            573 | 575 | 578 => V1_15,
            735 | 736 => V1_16,
            751 | 753 | 754 => V1_16_2,
            755 => V1_17,
            756 => V1_17_1,
            757 => V1_18,
            758 => V1_18_2,
            759 => V1_19,
            760 => V1_19_1,
            761 => V1_19_3,
            762 => V1_19_4,
            763 => V1_20,
            _ => return None,
        };
        Some(version)
    }

    /// Canonical protocol number of the first release of this revision
    pub fn protocol(self) -> i32 {
        match self {
            V1_7_2 => 4,
            V1_7_6 => 5,
            V1_8 => 47,
            V1_9 => 107,
            V1_9_1 => 108,
            V1_9_4 => 110,
            V1_10 => 210,
            V1_11 => 315,
            V1_12 => 335,
            V1_12_1 => 338,
            V1_12_2 => 340,
            V1_13 => 393,
            V1_13_1 => 401,
            V1_13_2 => 404,
            V1_14 => 477,
            V1_15 => 573,
            V1_16 => 735,
            V1_16_2 => 751,
            V1_17 => 755,
            V1_17_1 => 756,
            V1_18 => 757,
            V1_18_2 => 758,
            V1_19 => 759,
            V1_19_1 => 760,
            V1_19_3 => 761,
            V1_19_4 => 762,
            V1_20 => 763,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            V1_7_2 => "1.7.2",
            V1_7_6 => "1.7.6",
            V1_8 => "1.8",
            V1_9 => "1.9",
            V1_9_1 => "1.9.1",
            V1_9_4 => "1.9.4",
            V1_10 => "1.10",
            V1_11 => "1.11",
            V1_12 => "1.12",
            V1_12_1 => "1.12.1",
            V1_12_2 => "1.12.2",
            V1_13 => "1.13",
            V1_13_1 => "1.13.1",
            V1_13_2 => "1.13.2",
            V1_14 => "1.14",
            V1_15 => "1.15",
            V1_16 => "1.16",
            V1_16_2 => "1.16.2",
            V1_17 => "1.17",
            V1_17_1 => "1.17.1",
            V1_18 => "1.18",
            V1_18_2 => "1.18.2",
            V1_19 => "1.19",
            V1_19_1 => "1.19.1",
            V1_19_3 => "1.19.3",
            V1_19_4 => "1.19.4",
            V1_20 => "1.20",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that changes at known revision boundaries.
///
/// Entries are `(since, value)` pairs in ascending order; lookup picks the
/// latest boundary not newer than the requested version. A table whose first
/// boundary is newer than the requested version yields `None`.
#[derive(Debug, Clone, Copy)]
pub struct VersionTable<T: 'static> {
    entries: &'static [(ProtocolVersion, T)],
}

impl<T: Copy + 'static> VersionTable<T> {
    pub const fn new(entries: &'static [(ProtocolVersion, T)]) -> Self {
        Self { entries }
    }

    pub fn get(&self, version: ProtocolVersion) -> Option<T> {
        self.entries
            .iter()
            .rev()
            .find(|(since, _)| *since <= version)
            .map(|(_, value)| *value)
    }

    /// Boundaries strictly ascending
    #[cfg(test)]
    pub fn is_well_formed(&self) -> bool {
        self.entries.windows(2).all(|pair| pair[0].0 < pair[1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_matches_protocol_numbers() {
        for pair in ProtocolVersion::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].protocol() < pair[1].protocol());
        }
    }

    #[test]
    fn test_from_protocol_round_trip() {
        for version in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_protocol(version.protocol()), Some(version));
        }
        assert_eq!(ProtocolVersion::from_protocol(109), Some(V1_9_1));
        assert_eq!(ProtocolVersion::from_protocol(498), Some(V1_14));
        assert_eq!(ProtocolVersion::from_protocol(736), Some(V1_16));
        assert_eq!(ProtocolVersion::from_protocol(754), Some(V1_16_2));
        assert_eq!(ProtocolVersion::from_protocol(3), None);
        assert_eq!(ProtocolVersion::from_protocol(764), None);
        assert_eq!(ProtocolVersion::from_protocol(-1), None);
    }

    #[test]
    fn test_table_lookup() {
        static TABLE: VersionTable<u8> =
            VersionTable::new(&[(V1_7_2, 1), (V1_9, 2), (V1_13, 3)]);
        assert_eq!(TABLE.get(V1_7_6), Some(1));
        assert_eq!(TABLE.get(V1_8), Some(1));
        assert_eq!(TABLE.get(V1_9), Some(2));
        assert_eq!(TABLE.get(V1_12_2), Some(2));
        assert_eq!(TABLE.get(V1_20), Some(3));

        static LATE: VersionTable<u8> = VersionTable::new(&[(V1_9, 0)]);
        assert_eq!(LATE.get(V1_8), None);
        assert_eq!(LATE.get(V1_9_4), Some(0));
    }
}
