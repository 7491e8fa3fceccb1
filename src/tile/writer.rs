//! Envelope encoding for b3dm, i3dm, pnts and cmpt tiles.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use serde_json::Value;

use super::format::*;
use crate::util::{Error, Result};

/// Table sections are padded to 8 bytes.
const TABLE_ALIGNMENT: usize = 8;

fn padded(len: usize) -> usize {
    len.div_ceil(TABLE_ALIGNMENT) * TABLE_ALIGNMENT
}

pub(super) fn to_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::other(format!("tile section too large: {len} bytes")))
}

/// JSON bytes padded with spaces so that the section ends 8-byte aligned
/// relative to `offset`.
fn json_section(value: &Value, offset: usize) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(value)?;
    let end = padded(offset + bytes.len());
    bytes.resize(end - offset, b' ');
    Ok(bytes)
}

fn binary_section(data: &[u8]) -> Vec<u8> {
    let mut bytes = data.to_vec();
    bytes.resize(padded(data.len()), 0);
    bytes
}

/// Encode a b3dm, i3dm or pnts tile.
///
/// i3dm tiles are written with an embedded glTF payload.
pub fn encode_tile(
    format: TileFormat,
    feature_table_json: &Value,
    feature_table_binary: &[u8],
    batch_table_json: Option<&Value>,
    batch_table_binary: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>> {
    if format == TileFormat::Cmpt {
        return Err(Error::invalid("use encode_composite for composite tiles"));
    }
    let header_size = format.header_size();
    let ft_json = json_section(feature_table_json, header_size)?;
    let ft_bin = binary_section(feature_table_binary);
    let bt_json = match batch_table_json {
        Some(value) => json_section(value, header_size + ft_json.len() + ft_bin.len())?,
        None => Vec::new(),
    };
    let bt_bin = if bt_json.is_empty() { Vec::new() } else { binary_section(batch_table_binary) };

    let total = header_size + ft_json.len() + ft_bin.len() + bt_json.len() + bt_bin.len() + payload.len();
    let mut out = Vec::with_capacity(total);
    out.write_all(format.magic())?;
    out.write_u32::<LittleEndian>(TILE_VERSION)?;
    out.write_u32::<LittleEndian>(to_u32(total)?)?;
    out.write_u32::<LittleEndian>(to_u32(ft_json.len())?)?;
    out.write_u32::<LittleEndian>(to_u32(ft_bin.len())?)?;
    out.write_u32::<LittleEndian>(to_u32(bt_json.len())?)?;
    out.write_u32::<LittleEndian>(to_u32(bt_bin.len())?)?;
    if format == TileFormat::I3dm {
        out.write_u32::<LittleEndian>(GLTF_FORMAT_EMBEDDED)?;
    }
    for section in [&ft_json, &ft_bin, &bt_json, &bt_bin] {
        out.write_all(section)?;
    }
    out.write_all(payload)?;
    Ok(out)
}

/// Wrap already encoded tiles in a composite tile.
pub fn encode_composite(tiles: &[&[u8]]) -> Result<Vec<u8>> {
    let total = CMPT_HEADER_SIZE + tiles.iter().map(|t| t.len()).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.write_all(CMPT_MAGIC)?;
    out.write_u32::<LittleEndian>(TILE_VERSION)?;
    out.write_u32::<LittleEndian>(to_u32(total)?)?;
    out.write_u32::<LittleEndian>(to_u32(tiles.len())?)?;
    for tile in tiles {
        out.write_all(tile)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_aligned() {
        let data = encode_tile(
            TileFormat::B3dm,
            &json!({ "BATCH_LENGTH": 1 }),
            &[1, 2, 3],
            Some(&json!({ "a": [1] })),
            &[],
            &[],
        )
        .unwrap();
        let ft_json = u32::from_le_bytes(data[12..16].try_into().unwrap()) as usize;
        let ft_bin = u32::from_le_bytes(data[16..20].try_into().unwrap()) as usize;
        let bt_json = u32::from_le_bytes(data[20..24].try_into().unwrap()) as usize;
        assert_eq!((HEADER_SIZE + ft_json) % 8, 0);
        assert_eq!(ft_bin, 8);
        assert_eq!((HEADER_SIZE + ft_json + ft_bin + bt_json) % 8, 0);
        assert_eq!(u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize, data.len());
    }

    #[test]
    fn test_i3dm_gltf_format() {
        let data = encode_tile(TileFormat::I3dm, &json!({ "INSTANCES_LENGTH": 0 }), &[], None, &[], &[])
            .unwrap();
        assert_eq!(&data[..4], I3DM_MAGIC);
        assert_eq!(u32::from_le_bytes(data[28..32].try_into().unwrap()), GLTF_FORMAT_EMBEDDED);
    }
}
