//! GLB decoding.

use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use super::format::*;
use crate::util::{Error, Result};

/// The two logical parts of a GLB container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlbParts {
    /// Container version (1 or 2).
    pub version: u32,
    /// JSON bytes, padding included.
    pub json: Vec<u8>,
    /// Binary payload, padding included. May be empty.
    pub bin: Vec<u8>,
}

impl GlbParts {
    /// JSON content with chunk padding removed.
    pub fn json_str(&self) -> Result<&str> {
        let s = std::str::from_utf8(&self.json)?;
        Ok(s.trim_end_matches([' ', '\0']))
    }

    /// Parse the JSON content.
    pub fn json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(self.json_str()?)?)
    }
}

/// Check if data starts with the GLB magic.
#[inline]
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= GLB_MAGIC.len() && &data[..GLB_MAGIC.len()] == GLB_MAGIC
}

/// Decode a GLB container of either version.
pub fn decode(data: &[u8]) -> Result<GlbParts> {
    if data.len() < HEADER_SIZE {
        return Err(Error::eof(HEADER_SIZE, data.len()));
    }
    if !is_glb(data) {
        return Err(Error::InvalidMagic {
            expected: tag_str(GLB_MAGIC),
            actual: tag_str(&data[..4]),
        });
    }

    let version = LittleEndian::read_u32(&data[VERSION_OFFSET..]);
    let length = LittleEndian::read_u32(&data[LENGTH_OFFSET..]) as usize;
    if data.len() < length {
        return Err(Error::eof(length, data.len()));
    }
    // Trailing bytes past the declared length are not part of the container.
    let data = &data[..length];

    tracing::trace!("GLB version {} length {}", version, length);
    match version {
        1 => decode_v1(data),
        2 => decode_v2(data),
        _ => Err(Error::UnsupportedVersion { format: "GLB", version }),
    }
}

fn decode_v1(data: &[u8]) -> Result<GlbParts> {
    if data.len() < HEADER_SIZE_V1 {
        return Err(Error::eof(HEADER_SIZE_V1, data.len()));
    }
    let content_length = LittleEndian::read_u32(&data[CONTENT_LENGTH_OFFSET..]) as usize;
    let content_format = LittleEndian::read_u32(&data[CONTENT_FORMAT_OFFSET..]);
    if content_format != CONTENT_FORMAT_JSON {
        return Err(Error::InvalidContentFormat(content_format));
    }

    let content_end = HEADER_SIZE_V1 + content_length;
    if data.len() < content_end {
        return Err(Error::eof(content_end, data.len()));
    }

    Ok(GlbParts {
        version: 1,
        json: data[HEADER_SIZE_V1..content_end].to_vec(),
        bin: data[content_end..].to_vec(),
    })
}

fn decode_v2(data: &[u8]) -> Result<GlbParts> {
    let (json, pos) = read_chunk(data, HEADER_SIZE, CHUNK_JSON)?;

    // Fewer bytes than a chunk header left: no binary chunk.
    let bin = if data.len() - pos < CHUNK_HEADER_SIZE {
        Vec::new()
    } else {
        read_chunk(data, pos, CHUNK_BIN)?.0.to_vec()
    };

    Ok(GlbParts { version: 2, json: json.to_vec(), bin })
}

/// Read one chunk at `pos`, returning its payload and the position after it.
fn read_chunk<'a>(data: &'a [u8], pos: usize, expected: &[u8; 4]) -> Result<(&'a [u8], usize)> {
    let header_end = pos + CHUNK_HEADER_SIZE;
    if data.len() < header_end {
        return Err(Error::eof(header_end, data.len()));
    }
    let chunk_length = LittleEndian::read_u32(&data[pos..]) as usize;
    let chunk_type = &data[pos + 4..header_end];
    if chunk_type != expected {
        return Err(Error::UnexpectedChunkType {
            expected: tag_str(expected),
            actual: tag_str(chunk_type),
        });
    }
    let end = header_end + chunk_length;
    if data.len() < end {
        return Err(Error::eof(end, data.len()));
    }
    Ok((&data[header_end..end], end))
}

/// Memory-map and decode a GLB file.
pub fn read_glb(path: impl AsRef<Path>) -> Result<GlbParts> {
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
    decode(&mmap)
}
