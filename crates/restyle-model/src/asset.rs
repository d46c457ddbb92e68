//! Extracted media asset records
//!
//! Office packages size drawings in EMUs (English Metric Units):
//! 914,400 EMU = 1 inch, 9,525 EMU = 1 pixel at 96 DPI. Asset dimensions
//! are carried in EMUs end-to-end so the reconstructor can emit extents
//! without a unit conversion round-trip.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// EMUs per inch
pub const EMU_PER_INCH: i64 = 914_400;

/// EMUs per pixel at 96 DPI
pub const EMU_PER_PIXEL: i64 = 9_525;

/// Map of original filename to its extracted asset record, ordered by
/// filename for deterministic iteration.
pub type AssetMap = BTreeMap<String, Asset>;

/// One binary media file extracted from a source package (or referenced
/// from a tagged-text asset directory).
///
/// Created by the asset extractor, consumed by `ImageBlock` construction
/// and again by the package reconstructor. The staged file lives for the
/// conversion session; the owning caller deletes the staging directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Logical id, stable per extraction pass ("asset1", "asset2", ...).
    /// This is the id the `[ASSET:<id>]` marker protocol refers to.
    pub id: String,
    /// Original filename inside the package media store ("image1.png").
    pub filename: String,
    /// Absolute path of the staged copy.
    pub local_path: PathBuf,
    /// Native width in EMUs; 0 when the source carried no extent.
    pub width_emu: i64,
    /// Native height in EMUs; 0 when the source carried no extent.
    pub height_emu: i64,
    /// Relationship id that referenced this file in the source package,
    /// empty for assets not sourced from a package.
    pub rel_id: String,
    /// Lowercase file extension without the dot.
    pub ext: String,
}

impl Asset {
    /// Build the logical id for the `index`-th asset of an extraction pass
    /// (1-based).
    pub fn logical_id(index: usize) -> String {
        format!("asset{index}")
    }

    /// Whether the source package recorded a usable extent.
    pub fn has_dimensions(&self) -> bool {
        self.width_emu > 0 && self.height_emu > 0
    }
}

/// Convert EMUs to pixels at 96 DPI.
pub fn emu_to_pixels(emu: i64) -> i64 {
    (emu as f64 / EMU_PER_PIXEL as f64).round() as i64
}

/// Convert pixels to EMUs at 96 DPI.
pub fn pixels_to_emu(pixels: i64) -> i64 {
    pixels * EMU_PER_PIXEL
}

/// Convert inches to EMUs.
pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH as f64).round() as i64
}
