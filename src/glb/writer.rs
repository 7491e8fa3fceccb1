//! GLB encoding.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::format::*;
use crate::util::{Error, Result};

/// Encode JSON and binary parts into a GLB 2.0 container.
///
/// The binary chunk is always emitted, even when empty.
pub fn encode(json: &[u8], bin: &[u8]) -> Result<Vec<u8>> {
    let json_len = padded_len(json.len());
    let bin_len = padded_len(bin.len());
    let total = HEADER_SIZE + CHUNK_HEADER_SIZE + json_len + CHUNK_HEADER_SIZE + bin_len;
    let total32 = u32::try_from(total)
        .map_err(|_| Error::other(format!("GLB too large: {} bytes", total)))?;

    let mut out = Vec::with_capacity(total);
    out.write_all(GLB_MAGIC)?;
    out.write_u32::<LittleEndian>(2)?;
    out.write_u32::<LittleEndian>(total32)?;

    write_chunk(&mut out, CHUNK_JSON, json, json_len, JSON_PADDING)?;
    write_chunk(&mut out, CHUNK_BIN, bin, bin_len, BIN_PADDING)?;

    debug_assert_eq!(out.len(), total);
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8], padded: usize, pad: u8) -> Result<()> {
    out.write_u32::<LittleEndian>(padded as u32)?;
    out.write_all(tag)?;
    out.write_all(data)?;
    out.resize(out.len() + (padded - data.len()), pad);
    Ok(())
}

/// Encode and write a GLB file.
pub fn write_glb(path: impl AsRef<Path>, json: &[u8], bin: &[u8]) -> Result<()> {
    let bytes = encode(json, bin)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glb::decode;

    #[test]
    fn test_encode_layout() {
        let glb = encode(b"{\"a\":1}", &[1, 2, 3, 4, 5]).unwrap();
        // 12 + 8 + 8 + 8 + 8
        assert_eq!(glb.len(), 44);
        assert_eq!(&glb[0..4], GLB_MAGIC);
        assert_eq!(u32::from_le_bytes([glb[8], glb[9], glb[10], glb[11]]), 44);
        assert_eq!(&glb[16..20], CHUNK_JSON);
        assert_eq!(&glb[20..28], b"{\"a\":1} ");
        assert_eq!(&glb[32..36], CHUNK_BIN);
        assert_eq!(&glb[36..44], &[1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_roundtrip() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let bin = [9u8; 7];
        let parts = decode(&encode(json, &bin).unwrap()).unwrap();
        assert_eq!(parts.version, 2);
        assert_eq!(parts.json_str().unwrap().as_bytes(), json);
        assert_eq!(&parts.bin[..bin.len()], &bin);
        assert!(parts.bin[bin.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_binary() {
        let parts = decode(&encode(b"{}", &[]).unwrap()).unwrap();
        assert!(parts.bin.is_empty());
        assert_eq!(parts.json, b"{}  ");
    }
}
