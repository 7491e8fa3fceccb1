//! Utility types and functions for tilekit.
//!
//! This module contains fundamental pieces used throughout the library:
//! - [`Error`] / [`Result`] - Error handling
//! - [`IdGenerator`] - Schema id strategies
//! - Gzip helpers for compressed tile payloads

mod error;
mod ids;
mod compression;

pub use error::*;
pub use ids::*;
pub use compression::*;
