//! restyle-model - Canonical element model
//!
//! This crate defines the typed content elements a source document is
//! parsed into, the metadata and asset records that travel with them, and
//! the `ParsedDocument` handoff artifact consumed by the layout engine.

pub mod asset;
pub mod document;
pub mod element;

pub use asset::{
    emu_to_pixels, inches_to_emu, pixels_to_emu, Asset, AssetMap, EMU_PER_INCH, EMU_PER_PIXEL,
};
pub use document::{DocumentMeta, HandoffError, ParsedDocument};
pub use element::{CalloutKind, Element, TableKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
