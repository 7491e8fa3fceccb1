//! # tilekit
//!
//! Rust toolkit for combining glTF 2.0 assets that carry
//! `EXT_structural_metadata`, and for unwrapping legacy 3D Tiles payloads
//! (b3dm, i3dm, pnts, cmpt) into such assets.
//!
//! ## Modules
//!
//! - [`util`] - Errors, schema id generation, gzip helpers
//! - [`glb`] - GLB 1.0 / 2.0 binary container codec
//! - [`graph`] - Arena property graph and structural equality
//! - [`merge`] - Cross-document property transfer and metadata-aware merge
//! - [`metadata`] - Structural metadata model, schema merge, reconciliation
//! - [`io`] - glTF JSON + GLB import and export of documents
//! - [`tile`] - Legacy tile envelopes and batch table conversion
//!
//! ## Example
//!
//! ```ignore
//! use tilekit::prelude::*;
//!
//! let mut target = read_document_file("a.glb")?;
//! let mut source = read_document_file("b.glb")?;
//! let resolver = DirectorySchemaResolver::new("schemas");
//! futures::executor::block_on(merge_documents_with_metadata(
//!     &mut target,
//!     &mut source,
//!     &resolver,
//!     &mut RandomIds,
//! ))?;
//! write_document_file("merged.glb", &target)?;
//! ```

pub mod util;
pub mod glb;
pub mod graph;
pub mod merge;
pub mod metadata;
pub mod io;
pub mod tile;

// Re-export commonly used types
pub use util::{Error, ErrorKind, Result};
pub use graph::{Document, PropertyId, PropertyKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, ErrorKind, IdGenerator, RandomIds, Result, SequentialIds};
    pub use crate::graph::{equals, Document, PropertyData, PropertyId, PropertyKind};
    pub use crate::merge::{
        copy_to_document, merge_documents, merge_documents_with_metadata, PropertyMap,
        PropertyResolver,
    };
    pub use crate::metadata::{
        merge_schemas, DirectorySchemaResolver, NoSchemaResolver, SchemaResolver,
    };
    pub use crate::io::{read_document, read_document_file, write_document, write_document_file};
    pub use crate::tile::{read_tile, read_tile_file, split_composite, tile_to_document, TileFormat};
}
