//! Asset extraction
//!
//! Pulls embedded binary media out of a package into a session-scoped
//! staging directory, recording native EMU dimensions and the owning
//! relationship id on each asset record. The staging directory belongs to
//! the conversion session; the caller deletes it when the session ends.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use restyle_model::{Asset, AssetMap};

use crate::archive::{PackageArchive, MEDIA_DIR};
use crate::error::{OoxmlError, Result};
use crate::relationships::Relationships;

/// Raster/vector extensions the pipeline stages; everything else in the
/// media store is skipped.
pub const SUPPORTED_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "svg", "emf", "wmf", "tiff", "tif",
];

/// Result of one extraction session.
#[derive(Debug)]
pub struct Extraction {
    /// Extracted assets keyed by original filename
    pub assets: AssetMap,
    /// The session staging directory (unique per extraction)
    pub staging_dir: PathBuf,
}

/// One drawing found in the document stream.
#[derive(Debug, Default, Clone)]
struct DrawingScan {
    rel_id: Option<String>,
    width_emu: i64,
    height_emu: i64,
}

/// Extract all supported media from `package_path` into a fresh staging
/// subdirectory under `staging_root`.
///
/// The package is validated as a zip archive before unpacking; a non-zip
/// file fails fast with [`OoxmlError::NotAPackage`].
pub fn extract_assets(
    package_path: impl AsRef<Path>,
    staging_root: impl AsRef<Path>,
) -> Result<Extraction> {
    let archive = PackageArchive::open(package_path.as_ref())?;

    let staging_root = staging_root.as_ref();
    fs::create_dir_all(staging_root)?;
    // Unique per session so concurrent conversions cannot collide; the
    // guard is released because the caller owns the directory's lifetime.
    let staging_dir = tempfile::Builder::new()
        .prefix("session-")
        .tempdir_in(staging_root)?
        .keep();

    let rels = match archive.document_rels_xml() {
        Some(xml) => Relationships::parse(xml)?,
        None => Relationships::new(),
    };
    let rel_filenames = rels.image_filenames();
    let filename_rels: HashMap<&str, &str> = rel_filenames
        .iter()
        .map(|(id, name)| (name.as_str(), id.as_str()))
        .collect();

    let drawings = scan_drawings(archive.document_xml()?)?;

    let mut assets = AssetMap::new();
    let mut seq = 0usize;
    for path in archive.media_paths() {
        let filename = path.trim_start_matches(MEDIA_DIR);
        let ext = Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            log::debug!("skipping unsupported media file {filename}");
            continue;
        }

        let data = archive.get(path).expect("media path comes from archive");
        let local_path = staging_dir.join(filename);
        fs::write(&local_path, data)?;

        let rel_id = filename_rels.get(filename).copied().unwrap_or_default();
        let drawing = correlate_drawing(&drawings, &rel_filenames, filename, seq);

        seq += 1;
        let asset = Asset {
            id: Asset::logical_id(seq),
            filename: filename.to_string(),
            local_path,
            width_emu: drawing.as_ref().map(|d| d.width_emu).unwrap_or(0),
            height_emu: drawing.as_ref().map(|d| d.height_emu).unwrap_or(0),
            rel_id: rel_id.to_string(),
            ext,
        };
        assets.insert(filename.to_string(), asset);
    }

    Ok(Extraction {
        assets,
        staging_dir,
    })
}

/// Pair a media file with its drawing: by relationship id when the
/// drawing carries a blip, positionally otherwise.
fn correlate_drawing(
    drawings: &[DrawingScan],
    rel_filenames: &HashMap<String, String>,
    filename: &str,
    index: usize,
) -> Option<DrawingScan> {
    drawings
        .iter()
        .find(|d| {
            d.rel_id
                .as_deref()
                .and_then(|id| rel_filenames.get(id))
                .is_some_and(|name| name == filename)
        })
        .or_else(|| drawings.get(index).filter(|d| d.rel_id.is_none()))
        .cloned()
}

/// Scan the document stream for drawing extents and blip references.
fn scan_drawings(xml: &[u8]) -> Result<Vec<DrawingScan>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut drawings = Vec::new();
    let mut current: Option<DrawingScan> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"drawing" => current = Some(DrawingScan::default()),
                b"extent" => {
                    if let Some(drawing) = current.as_mut() {
                        for attr in e.attributes().filter_map(|a| a.ok()) {
                            let value = attr
                                .unescape_value()
                                .ok()
                                .and_then(|v| v.parse::<i64>().ok());
                            match attr.key.as_ref() {
                                b"cx" => drawing.width_emu = value.unwrap_or(0),
                                b"cy" => drawing.height_emu = value.unwrap_or(0),
                                _ => {}
                            }
                        }
                    }
                }
                b"blip" => {
                    if let Some(drawing) = current.as_mut() {
                        for attr in e.attributes().filter_map(|a| a.ok()) {
                            if attr.key.as_ref() == b"r:embed" {
                                drawing.rel_id =
                                    attr.unescape_value().ok().map(|v| v.to_string());
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"drawing" {
                    if let Some(drawing) = current.take() {
                        drawings.push(drawing);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OoxmlError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(drawings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{CONTENT_TYPES_PATH, DOCUMENT_PATH, DOCUMENT_RELS_PATH};

    const DOC_WITH_DRAWING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
                xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
                xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"
                xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
                xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">
      <w:body>
        <w:p><w:r><w:drawing><wp:inline>
          <wp:extent cx="1828800" cy="914400"/>
          <a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">
            <pic:pic><pic:blipFill><a:blip r:embed="rId7"/></pic:blipFill></pic:pic>
          </a:graphicData></a:graphic>
        </wp:inline></w:drawing></w:r></w:p>
      </w:body>
    </w:document>"#;

    const RELS_WITH_IMAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
      <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
    </Relationships>"#;

    fn write_package(dir: &Path) -> PathBuf {
        let mut archive = PackageArchive::new();
        archive.set(CONTENT_TYPES_PATH, b"<Types/>".to_vec());
        archive.set(DOCUMENT_PATH, DOC_WITH_DRAWING.as_bytes().to_vec());
        archive.set(DOCUMENT_RELS_PATH, RELS_WITH_IMAGE.as_bytes().to_vec());
        archive.set("word/media/image1.png", b"png-bytes".to_vec());
        archive.set("word/media/thumbnail.wdp", b"ignored".to_vec());

        let path = dir.join("sample.docx");
        archive.write_to_file(&path).unwrap();
        path
    }

    #[test]
    fn test_extract_stages_supported_media() {
        let dir = tempfile::tempdir().unwrap();
        let package = write_package(dir.path());
        let staging_root = dir.path().join("staging");

        let extraction = extract_assets(&package, &staging_root).unwrap();
        assert_eq!(extraction.assets.len(), 1);

        let asset = extraction.assets.get("image1.png").unwrap();
        assert_eq!(asset.id, "asset1");
        assert_eq!(asset.rel_id, "rId7");
        assert_eq!(asset.width_emu, 1828800);
        assert_eq!(asset.height_emu, 914400);
        assert_eq!(asset.ext, "png");
        assert_eq!(fs::read(&asset.local_path).unwrap(), b"png-bytes");
        assert!(asset.local_path.starts_with(&extraction.staging_dir));
    }

    #[test]
    fn test_staging_dirs_are_unique_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let package = write_package(dir.path());
        let staging_root = dir.path().join("staging");

        let first = extract_assets(&package, &staging_root).unwrap();
        let second = extract_assets(&package, &staging_root).unwrap();
        assert_ne!(first.staging_dir, second.staging_dir);
    }

    #[test]
    fn test_non_package_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manuscript.txt");
        fs::write(&path, "just words").unwrap();

        let err = extract_assets(&path, dir.path().join("staging")).unwrap_err();
        assert!(matches!(err, OoxmlError::NotAPackage(_)));
    }

    #[test]
    fn test_package_without_media_yields_no_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = PackageArchive::new();
        archive.set(CONTENT_TYPES_PATH, b"<Types/>".to_vec());
        archive.set(
            DOCUMENT_PATH,
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body/></w:document>"#
                .to_vec(),
        );
        let path = dir.path().join("plain.docx");
        archive.write_to_file(&path).unwrap();

        let extraction = extract_assets(&path, dir.path().join("staging")).unwrap();
        assert!(extraction.assets.is_empty());
    }
}
