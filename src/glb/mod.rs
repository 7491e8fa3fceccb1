//! GLB binary container codec.
//!
//! GLB wraps a glTF JSON document and an optional binary buffer in a
//! single little-endian envelope. Both the legacy 1.0 layout and the
//! chunked 2.0 layout are decoded; only 2.0 is written.
//!
//! ## 2.0 Layout
//!
//! ```text
//! +------------------+
//! | Magic: "glTF"    |  4 bytes
//! +------------------+
//! | Version: 2       |  4 bytes (u32 LE)
//! +------------------+
//! | Total length     |  4 bytes (u32 LE)
//! +------------------+
//! | JSON chunk       |  u32 length, "JSON", space-padded data
//! +------------------+
//! | BIN chunk        |  u32 length, "BIN\0", zero-padded data (optional)
//! +------------------+
//! ```
//!
//! ## 1.0 Layout
//!
//! ```text
//! magic, version, length, content length (u32), content format (u32 = 0),
//! content (JSON), body (rest of the container)
//! ```

mod format;
mod reader;
mod writer;

pub use format::*;
pub use reader::*;
pub use writer::*;
