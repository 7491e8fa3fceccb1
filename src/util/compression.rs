//! Gzip support for tile payloads.
//!
//! Tilesets served over HTTP are frequently stored pre-compressed, so every
//! reader entry point runs its input through [`decompress_if_gzipped`].

use std::io::{Read, Write};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::util::Result;

/// Gzip member header magic.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compress data using gzip.
///
/// # Arguments
/// * `data` - Data to compress
/// * `level` - Compression level (0-9, where 0 is no compression, 9 is max)
pub fn gzip(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Check if data starts with the gzip magic bytes.
pub fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

/// Inflate gzip data, or return the input unchanged when it is not gzipped.
///
/// Unlike plain sniffing, a corrupt gzip stream is an error rather than
/// being passed through.
pub fn decompress_if_gzipped(data: &[u8]) -> Result<Vec<u8>> {
    if !is_gzipped(data) {
        return Ok(data.to_vec());
    }

    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut out)?;
    tracing::trace!("inflated {} -> {} bytes", data.len(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let original = b"glTF payload bytes that repeat. ".repeat(64);

        let compressed = gzip(&original, 6).unwrap();
        assert!(is_gzipped(&compressed));
        assert!(compressed.len() < original.len());

        let restored = decompress_if_gzipped(&compressed).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_passthrough_plain_data() {
        let original = b"glTF\x02\x00\x00\x00";
        assert!(!is_gzipped(original));
        assert_eq!(decompress_if_gzipped(original).unwrap(), original);
    }

    #[test]
    fn test_corrupt_gzip_fails() {
        let data = [0x1F, 0x8B, 0x08, 0x00, 0xFF];
        assert!(decompress_if_gzipped(&data).is_err());
    }
}
