//! GLB format constants.

/// Magic bytes at the start of a GLB container.
pub const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Size of the common header prefix (magic, version, length).
pub const HEADER_SIZE: usize = 12;

/// Size of the GLB 1.0 header (adds content length and content format).
pub const HEADER_SIZE_V1: usize = 20;

/// Size of a GLB 2.0 chunk header (length, type).
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Offset of the version field.
pub const VERSION_OFFSET: usize = 4;

/// Offset of the total length field.
pub const LENGTH_OFFSET: usize = 8;

/// Offset of the GLB 1.0 content length field.
pub const CONTENT_LENGTH_OFFSET: usize = 12;

/// Offset of the GLB 1.0 content format field.
pub const CONTENT_FORMAT_OFFSET: usize = 16;

/// The only GLB 1.0 content format: JSON.
pub const CONTENT_FORMAT_JSON: u32 = 0;

/// Chunk type of the JSON chunk.
pub const CHUNK_JSON: &[u8; 4] = b"JSON";

/// Chunk type of the binary chunk.
pub const CHUNK_BIN: &[u8; 4] = b"BIN\0";

/// JSON chunks are padded with spaces.
pub const JSON_PADDING: u8 = b' ';

/// Binary chunks are padded with zeros.
pub const BIN_PADDING: u8 = 0;

/// Chunk alignment.
pub const ALIGNMENT: usize = 4;

/// Round `len` up to the next multiple of [`ALIGNMENT`].
#[inline]
pub const fn padded_len(len: usize) -> usize {
    (len + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Render four tag bytes for error messages.
pub(crate) fn tag_str(tag: &[u8]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}
