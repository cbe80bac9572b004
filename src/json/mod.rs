//! Partial JSON reading
//!
//! A cursor over a borrowed buffer and a recursive-descent scanner built on
//! it. Used to peek at message envelopes without materialising whole lines.

pub mod cursor;
pub mod scanner;

pub use cursor::Cursor;
pub use scanner::{extract_fields, JsonNumber, JsonScanner, ObjectFields, MAX_NESTING_DEPTH};
