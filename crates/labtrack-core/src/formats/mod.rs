//! # Formats Module
//!
//! On-disk encodings. File and database I/O live in the storage backends and
//! the app layer; this module only turns values into bytes and back.

mod persistence;

pub use persistence::*;
