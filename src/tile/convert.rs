//! Tile to glTF document conversion.

use crate::graph::Document;
use crate::io::read_document;
use crate::util::{Error, Result};

use super::batch_table::batch_table_to_metadata;
use super::reader::TileData;

/// Unwrap the embedded glTF of a b3dm or i3dm tile and attach its batch
/// table as structural metadata.
#[tracing::instrument(skip_all, fields(format = %tile.format()))]
pub fn tile_to_document(tile: &TileData) -> Result<Document> {
    if !tile.has_embedded_gltf() {
        return Err(Error::Unsupported(format!("{} tile without embedded glTF", tile.format())));
    }
    let mut doc = read_document(&tile.payload)?;
    if let Some(batch_table) = &tile.batch_table_json {
        batch_table_to_metadata(&mut doc, batch_table, tile.batch_length())?;
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_document;
    use crate::tile::{encode_tile, parse_tile, TileFormat};
    use serde_json::json;

    #[test]
    fn test_b3dm_to_document() {
        let mut inner = Document::new();
        inner.create_mesh("building", vec![]);
        let glb = write_document(&inner).unwrap();
        let data = encode_tile(
            TileFormat::B3dm,
            &json!({ "BATCH_LENGTH": 3 }),
            &[],
            Some(&json!({ "height": [1.0, 2.0, 3.5] })),
            &[],
            &glb,
        )
        .unwrap();

        let doc = tile_to_document(&parse_tile(&data).unwrap()).unwrap();
        let md = doc.structural_metadata().unwrap();
        let tables = &doc.as_structural_metadata(md).unwrap().property_tables;
        assert_eq!(tables.len(), 1);
        assert_eq!(doc.as_property_table(tables[0]).unwrap().count, 3);
    }

    #[test]
    fn test_pnts_unsupported() {
        let data = encode_tile(TileFormat::Pnts, &json!({ "POINTS_LENGTH": 0 }), &[], None, &[], &[])
            .unwrap();
        let err = tile_to_document(&parse_tile(&data).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
