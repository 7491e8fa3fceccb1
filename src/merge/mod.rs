//! Document merging.
//!
//! [`copy_to_document`] and [`merge_documents`] copy arbitrary property
//! graphs; [`merge_documents_with_metadata`] additionally merges the
//! structural metadata extensions of both documents.

mod copy;
mod metadata;

pub use copy::*;
pub use metadata::merge_documents_with_metadata;
