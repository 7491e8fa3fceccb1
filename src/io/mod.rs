//! glTF 2.0 import and export.
//!
//! Covers the subset the document model holds: scenes, nodes, meshes,
//! accessors, materials with a base color texture, embedded images and
//! `EXT_structural_metadata` at the root and on primitives. Binary data
//! always lives in buffer 0, which is the GLB binary chunk.

mod json;
mod reader;
mod writer;

pub use json::*;
pub use reader::{read_document, read_document_file};
pub use writer::{generator, write_document, write_document_file};

/// Byte size of a glTF component type.
pub fn component_size(component_type: u32) -> Option<usize> {
    match component_type {
        5120 | 5121 => Some(1),
        5122 | 5123 => Some(2),
        5125 | 5126 => Some(4),
        _ => None,
    }
}

/// Number of components of an accessor element type.
pub fn element_components(element_type: &str) -> Option<usize> {
    match element_type {
        "SCALAR" => Some(1),
        "VEC2" => Some(2),
        "VEC3" => Some(3),
        "VEC4" | "MAT2" => Some(4),
        "MAT3" => Some(9),
        "MAT4" => Some(16),
        _ => None,
    }
}
