//! Legacy tile envelope constants.

use std::fmt;

/// Magic of batched 3D model tiles.
pub const B3DM_MAGIC: &[u8; 4] = b"b3dm";
/// Magic of instanced 3D model tiles.
pub const I3DM_MAGIC: &[u8; 4] = b"i3dm";
/// Magic of point cloud tiles.
pub const PNTS_MAGIC: &[u8; 4] = b"pnts";
/// Magic of composite tiles.
pub const CMPT_MAGIC: &[u8; 4] = b"cmpt";

/// The only envelope version in use.
pub const TILE_VERSION: u32 = 1;

/// Header size of b3dm and pnts tiles.
pub const HEADER_SIZE: usize = 28;
/// Header size of i3dm tiles (adds `gltfFormat`).
pub const I3DM_HEADER_SIZE: usize = 32;
/// Header size of composite tiles.
pub const CMPT_HEADER_SIZE: usize = 16;
/// Magic, version and byte length shared by every envelope.
pub const COMMON_HEADER_SIZE: usize = 12;

pub const BYTE_LENGTH_OFFSET: usize = 8;
pub const FEATURE_TABLE_JSON_OFFSET: usize = 12;
pub const FEATURE_TABLE_BINARY_OFFSET: usize = 16;
pub const BATCH_TABLE_JSON_OFFSET: usize = 20;
pub const BATCH_TABLE_BINARY_OFFSET: usize = 24;
pub const GLTF_FORMAT_OFFSET: usize = 28;
pub const TILES_LENGTH_OFFSET: usize = 12;

/// i3dm `gltfFormat`: payload is a URI.
pub const GLTF_FORMAT_URI: u32 = 0;
/// i3dm `gltfFormat`: payload is an embedded GLB.
pub const GLTF_FORMAT_EMBEDDED: u32 = 1;

/// Threshold above which a b3dm batch table length is really the start of
/// a JSON string, which marks the pre-1.0 header layouts.
pub const LEGACY_HEADER_THRESHOLD: u32 = 570_425_344;

/// Envelope kind, detected from the magic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileFormat {
    B3dm,
    I3dm,
    Pnts,
    Cmpt,
}

impl TileFormat {
    /// Detect the envelope kind from the first four bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data.get(..4)? {
            m if m == B3DM_MAGIC => Some(Self::B3dm),
            m if m == I3DM_MAGIC => Some(Self::I3dm),
            m if m == PNTS_MAGIC => Some(Self::Pnts),
            m if m == CMPT_MAGIC => Some(Self::Cmpt),
            _ => None,
        }
    }

    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            Self::B3dm => B3DM_MAGIC,
            Self::I3dm => I3DM_MAGIC,
            Self::Pnts => PNTS_MAGIC,
            Self::Cmpt => CMPT_MAGIC,
        }
    }

    /// Fixed header size of this envelope.
    pub fn header_size(self) -> usize {
        match self {
            Self::B3dm | Self::Pnts => HEADER_SIZE,
            Self::I3dm => I3DM_HEADER_SIZE,
            Self::Cmpt => CMPT_HEADER_SIZE,
        }
    }

    /// Feature table key holding the feature count.
    pub fn length_key(self) -> Option<&'static str> {
        match self {
            Self::B3dm => Some("BATCH_LENGTH"),
            Self::I3dm => Some("INSTANCES_LENGTH"),
            Self::Pnts => Some("POINTS_LENGTH"),
            Self::Cmpt => None,
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::B3dm => "b3dm",
            Self::I3dm => "i3dm",
            Self::Pnts => "pnts",
            Self::Cmpt => "cmpt",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(TileFormat::detect(b"b3dm\x01\0\0\0"), Some(TileFormat::B3dm));
        assert_eq!(TileFormat::detect(b"cmpt"), Some(TileFormat::Cmpt));
        assert_eq!(TileFormat::detect(b"glTF"), None);
        assert_eq!(TileFormat::detect(b"b3"), None);
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(TileFormat::I3dm.header_size(), TileFormat::B3dm.header_size() + 4);
        assert_eq!(TileFormat::Pnts.to_string(), "pnts");
        assert_eq!(TileFormat::Pnts.magic(), PNTS_MAGIC);
    }
}
