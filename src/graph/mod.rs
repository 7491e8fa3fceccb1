//! Property graph.
//!
//! A [`Document`] is an arena of typed [`Property`] nodes. Parent→child
//! references are [`PropertyId`] slots inside each [`PropertyData`]
//! payload, which gives the merge engine a uniform view of every edge:
//!
//! - [`Document::children`] / [`Document::list_edges`] - traversal
//! - [`PropertyData::refs_mut`] - reference rewriting
//! - [`equals`] - structural equality, independent of identity

mod property;
mod document;
mod equality;

pub use property::*;
pub use document::Document;
pub use equality::equals;
