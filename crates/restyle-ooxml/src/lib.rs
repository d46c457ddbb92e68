//! # restyle-ooxml
//!
//! OOXML package handling for the restyle conversion pipeline:
//!
//! - Classify an existing package's paragraph/table stream into the
//!   canonical element model (for documents without explicit tags)
//! - Extract embedded media into a session staging directory
//! - Reconstruct a template-rendered package, embedding assets and
//!   replacing `[ASSET:<id>]` markers with inline drawings
//!
//! ## Example: converting a package
//!
//! ```no_run
//! use restyle_ooxml::convert::{parse_package, ConvertOptions};
//!
//! let doc = parse_package("chapter.docx", "./staging", &ConvertOptions::default())?;
//! for element in &doc.elements {
//!     println!("{:?}", element);
//! }
//! # Ok::<(), restyle_ooxml::OoxmlError>(())
//! ```

pub mod archive;
pub mod classify;
pub mod content_types;
pub mod convert;
pub mod document;
pub mod error;
pub mod extract;
pub mod rebuild;
pub mod relationships;
pub mod styles;

pub use archive::PackageArchive;
pub use classify::{Classifier, ClassifierConfig, ParaFacts, StyleMap, StyleRole};
pub use content_types::ContentTypes;
pub use convert::{parse_package, ConvertOptions};
pub use document::DocumentStream;
pub use error::{OoxmlError, Result};
pub use extract::{extract_assets, Extraction};
pub use rebuild::rebuild_package;
pub use relationships::{RelIdAllocator, Relationships};
pub use styles::StyleSheet;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
