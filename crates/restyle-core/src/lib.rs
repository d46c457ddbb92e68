//! restyle-core - Tagged-text parsing and element merging
//!
//! This crate turns the block-tagged structured-text dialect into the
//! canonical element sequence, and provides the merge pipeline that
//! coalesces adjacent low-level elements into semantic blocks.
//!
//! # Example
//!
//! ```
//! use restyle_core::parser::{parse_str, TaggedTextOptions};
//!
//! let input = "[tip]\nRemember to save often.\n";
//! let doc = parse_str(input, &TaggedTextOptions::default()).unwrap();
//! assert_eq!(doc.elements.len(), 1);
//! ```

pub mod merge;
pub mod parser;

pub use merge::run_pipeline;
pub use parser::{parse_file, parse_str, ParseError, TaggedTextOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
