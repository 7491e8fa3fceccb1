//! Legacy 3D Tiles envelopes.
//!
//! Every envelope starts with a 4-byte magic, a u32 version and a u32
//! total byte length, followed by format-specific table lengths:
//!
//! ```text
//! b3dm / pnts (28 bytes)             i3dm (32 bytes)
//! +-----------------------------+    +-----------------------------+
//! | magic, version, byteLength  |    | magic, version, byteLength  |
//! | featureTableJSONByteLength  |    | featureTableJSONByteLength  |
//! | featureTableBinaryByteLength|    | featureTableBinaryByteLength|
//! | batchTableJSONByteLength    |    | batchTableJSONByteLength    |
//! | batchTableBinaryByteLength  |    | batchTableBinaryByteLength  |
//! +-----------------------------+    | gltfFormat                  |
//!                                    +-----------------------------+
//! ```
//!
//! The tables follow in header order, then the payload. Composite tiles
//! (`cmpt`) hold a tile count and the concatenated inner tiles.

mod format;
mod reader;
mod writer;
mod batch_table;
mod convert;

pub use format::*;
pub use reader::{parse_tile, read_tile, read_tile_file, split_composite, TileData, TileHeader};
pub use writer::{encode_composite, encode_tile};
pub use batch_table::{batch_table_to_metadata, BATCH_TABLE_SCHEMA_ID, DEFAULT_CLASS_KEY};
pub use convert::tile_to_document;
