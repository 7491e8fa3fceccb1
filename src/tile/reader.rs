//! Envelope parsing for b3dm, i3dm, pnts and cmpt tiles.

use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use serde_json::{Map, Value};

use super::format::*;
use crate::util::{decompress_if_gzipped, Error, Result};

/// Fixed header fields of a b3dm, i3dm or pnts tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileHeader {
    pub format: TileFormat,
    pub version: u32,
    pub byte_length: u32,
    pub feature_table_json_length: u32,
    pub feature_table_binary_length: u32,
    pub batch_table_json_length: u32,
    pub batch_table_binary_length: u32,
    /// i3dm only.
    pub gltf_format: Option<u32>,
}

impl TileHeader {
    /// Parse the header of a single (non-composite) tile.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let format = TileFormat::detect(data).ok_or_else(|| Error::InvalidMagic {
            expected: "b3dm, i3dm or pnts".to_string(),
            actual: String::from_utf8_lossy(&data[..data.len().min(4)]).into_owned(),
        })?;
        if format == TileFormat::Cmpt {
            return Err(Error::invalid("composite tile must be split before parsing"));
        }
        let header_size = format.header_size();
        if data.len() < header_size {
            return Err(Error::eof(header_size, data.len()));
        }

        let version = LittleEndian::read_u32(&data[4..]);
        if version != TILE_VERSION {
            return Err(Error::UnsupportedVersion { format: "tile", version });
        }

        let header = Self {
            format,
            version,
            byte_length: LittleEndian::read_u32(&data[BYTE_LENGTH_OFFSET..]),
            feature_table_json_length: LittleEndian::read_u32(&data[FEATURE_TABLE_JSON_OFFSET..]),
            feature_table_binary_length: LittleEndian::read_u32(&data[FEATURE_TABLE_BINARY_OFFSET..]),
            batch_table_json_length: LittleEndian::read_u32(&data[BATCH_TABLE_JSON_OFFSET..]),
            batch_table_binary_length: LittleEndian::read_u32(&data[BATCH_TABLE_BINARY_OFFSET..]),
            gltf_format: (format == TileFormat::I3dm)
                .then(|| LittleEndian::read_u32(&data[GLTF_FORMAT_OFFSET..])),
        };

        if format == TileFormat::B3dm
            && (header.batch_table_json_length >= LEGACY_HEADER_THRESHOLD
                || header.batch_table_binary_length >= LEGACY_HEADER_THRESHOLD)
        {
            return Err(Error::Unsupported("pre-1.0 b3dm header layout".to_string()));
        }
        Ok(header)
    }

    #[inline]
    pub fn header_size(&self) -> usize {
        self.format.header_size()
    }

    /// Size of the header plus all four tables.
    pub fn tables_end(&self) -> usize {
        self.header_size()
            + self.feature_table_json_length as usize
            + self.feature_table_binary_length as usize
            + self.batch_table_json_length as usize
            + self.batch_table_binary_length as usize
    }
}

/// Parsed tile envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct TileData {
    pub header: TileHeader,
    pub feature_table_json: Value,
    pub feature_table_binary: Vec<u8>,
    /// `None` when the tile has no batch table.
    pub batch_table_json: Option<Value>,
    pub batch_table_binary: Vec<u8>,
    /// Embedded GLB (b3dm, embedded i3dm), URI bytes (i3dm) or empty (pnts).
    pub payload: Vec<u8>,
}

impl TileData {
    #[inline]
    pub fn format(&self) -> TileFormat {
        self.header.format
    }

    /// Feature count from the feature table (`BATCH_LENGTH`, `INSTANCES_LENGTH`
    /// or `POINTS_LENGTH`).
    pub fn feature_count(&self) -> Option<u32> {
        let key = self.format().length_key()?;
        self.feature_table_json.get(key)?.as_u64().and_then(|n| u32::try_from(n).ok())
    }

    /// Number of rows of the batch table.
    ///
    /// pnts tiles without `BATCH_LENGTH` are batched per point.
    pub fn batch_length(&self) -> u32 {
        let explicit = self
            .feature_table_json
            .get("BATCH_LENGTH")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());
        match (self.format(), explicit) {
            (_, Some(n)) => n,
            (TileFormat::Pnts, None) | (TileFormat::I3dm, None) => self.feature_count().unwrap_or(0),
            _ => 0,
        }
    }

    /// Whether the payload holds an embedded GLB.
    pub fn has_embedded_gltf(&self) -> bool {
        match self.format() {
            TileFormat::B3dm => true,
            TileFormat::I3dm => self.header.gltf_format == Some(GLTF_FORMAT_EMBEDDED),
            _ => false,
        }
    }
}

/// Parse JSON from a table section, ignoring padding.
fn parse_table_json(bytes: &[u8]) -> Result<Option<Value>> {
    let text = std::str::from_utf8(bytes)?.trim_end_matches([' ', '\0']);
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Feature table lengths must be unsigned 32-bit integers.
fn check_lengths(format: TileFormat, feature_table: &Value) -> Result<()> {
    let keys = std::iter::once("BATCH_LENGTH").chain(format.length_key());
    for key in keys {
        let Some(value) = feature_table.get(key) else { continue };
        if value.as_u64().and_then(|n| u32::try_from(n).ok()).is_none() {
            return Err(Error::invalid(format!("{format} feature table {key} is {value}")));
        }
    }
    Ok(())
}

/// Next `len` bytes at `pos`. Bounds are checked by the caller.
fn section<'d>(data: &'d [u8], pos: &mut usize, len: u32) -> &'d [u8] {
    let start = *pos;
    *pos += len as usize;
    &data[start..*pos]
}

/// Parse a b3dm, i3dm or pnts tile. Gzipped input is inflated first.
pub fn read_tile(data: &[u8]) -> Result<TileData> {
    let data = decompress_if_gzipped(data)?;
    parse_tile(&data)
}

/// Parse an uncompressed b3dm, i3dm or pnts tile.
pub fn parse_tile(data: &[u8]) -> Result<TileData> {
    let header = TileHeader::parse(data)?;
    let byte_length = header.byte_length as usize;
    if data.len() < byte_length {
        return Err(Error::eof(byte_length, data.len()));
    }
    let end = header.tables_end();
    if end > byte_length {
        return Err(Error::invalid(format!(
            "{} tables end at {} past byte length {}",
            header.format, end, byte_length
        )));
    }

    let mut pos = header.header_size();
    let feature_table_json = section(data, &mut pos, header.feature_table_json_length);
    let feature_table_binary = section(data, &mut pos, header.feature_table_binary_length).to_vec();
    let batch_table_json = section(data, &mut pos, header.batch_table_json_length);
    let batch_table_binary = section(data, &mut pos, header.batch_table_binary_length).to_vec();

    let feature_table_json =
        parse_table_json(feature_table_json)?.unwrap_or_else(|| Value::Object(Map::new()));
    check_lengths(header.format, &feature_table_json)?;
    let batch_table_json = parse_table_json(batch_table_json)?;
    let payload = data[end..byte_length].to_vec();

    tracing::trace!(
        "{} tile: {} bytes, payload {} bytes",
        header.format,
        byte_length,
        payload.len()
    );
    Ok(TileData {
        header,
        feature_table_json,
        feature_table_binary,
        batch_table_json,
        batch_table_binary,
        payload,
    })
}

/// Memory-map and parse a tile file.
pub fn read_tile_file(path: impl AsRef<Path>) -> Result<TileData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    if file.metadata()?.len() == 0 {
        return Err(Error::eof(HEADER_SIZE, 0));
    }
    // Safety: file is opened read-only and the map does not outlive this call
    let mmap = unsafe { Mmap::map(&file) }?;
    read_tile(&mmap)
}

/// Split an uncompressed composite tile into its inner tiles.
///
/// Inner tiles are returned as-is and may themselves be composites.
pub fn split_composite(data: &[u8]) -> Result<Vec<&[u8]>> {
    if data.len() < CMPT_HEADER_SIZE {
        return Err(Error::eof(CMPT_HEADER_SIZE, data.len()));
    }
    if TileFormat::detect(data) != Some(TileFormat::Cmpt) {
        return Err(Error::InvalidMagic {
            expected: "cmpt".to_string(),
            actual: String::from_utf8_lossy(&data[..4]).into_owned(),
        });
    }
    let version = LittleEndian::read_u32(&data[4..]);
    if version != TILE_VERSION {
        return Err(Error::UnsupportedVersion { format: "cmpt", version });
    }
    let byte_length = LittleEndian::read_u32(&data[BYTE_LENGTH_OFFSET..]) as usize;
    if data.len() < byte_length {
        return Err(Error::eof(byte_length, data.len()));
    }
    let tiles_length = LittleEndian::read_u32(&data[TILES_LENGTH_OFFSET..]) as usize;

    let mut tiles = Vec::new();
    let mut pos = CMPT_HEADER_SIZE;
    for i in 0..tiles_length {
        if byte_length < pos + COMMON_HEADER_SIZE {
            return Err(Error::eof(pos + COMMON_HEADER_SIZE, byte_length));
        }
        let inner = LittleEndian::read_u32(&data[pos + BYTE_LENGTH_OFFSET..]) as usize;
        if inner < COMMON_HEADER_SIZE || pos + inner > byte_length {
            return Err(Error::invalid(format!("inner tile {i} has invalid byte length {inner}")));
        }
        tiles.push(&data[pos..pos + inner]);
        pos += inner;
    }
    Ok(tiles)
}
