//! Package archive container
//!
//! A word-processing package is a ZIP archive of XML parts plus binary
//! media. This container unpacks the whole archive into memory, preserves
//! entry order for faithful re-serialization, and knows the handful of
//! well-known part paths the pipeline touches.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use zip::read::ZipArchive;
use zip::write::ZipWriter;
use zip::CompressionMethod;

use crate::error::{OoxmlError, Result};

/// Main document part
pub const DOCUMENT_PATH: &str = "word/document.xml";
/// Relationship manifest of the main document part
pub const DOCUMENT_RELS_PATH: &str = "word/_rels/document.xml.rels";
/// Content-type registry
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
/// Core document properties
pub const CORE_PROPS_PATH: &str = "docProps/core.xml";
/// Media storage prefix
pub const MEDIA_DIR: &str = "word/media/";

/// Leading bytes of every zip-based package.
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Whether the given bytes start with the zip local-file-header magic.
pub fn has_zip_magic(bytes: &[u8]) -> bool {
    bytes.len() >= ZIP_MAGIC.len() && bytes[..ZIP_MAGIC.len()] == ZIP_MAGIC
}

/// An unpacked office package, entries in archive order.
#[derive(Debug, Default)]
pub struct PackageArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl PackageArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a package file, rejecting anything that is not a zip archive
    /// before attempting to unpack it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        let read = file.read(&mut magic)?;
        if !has_zip_magic(&magic[..read]) {
            return Err(OoxmlError::NotAPackage(path.to_path_buf()));
        }
        file.rewind()?;
        Self::from_reader(file)
    }

    /// Unpack from any reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            if name.ends_with('/') {
                continue;
            }
            let mut contents = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut contents)?;
            entries.push((name, contents));
        }

        Ok(Self { entries })
    }

    /// Get an entry's contents by path.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| data.as_slice())
    }

    /// Whether an entry exists.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set or replace an entry. New entries append at the end.
    pub fn set(&mut self, path: impl Into<String>, contents: Vec<u8>) {
        let path = path.into();
        match self.entries.iter_mut().find(|(name, _)| *name == path) {
            Some((_, data)) => *data = contents,
            None => self.entries.push((path, contents)),
        }
    }

    /// Remove an entry, returning its contents.
    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        let idx = self.entries.iter().position(|(name, _)| name == path)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterate entries in archive order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
    }

    /// Entry paths under the media storage directory.
    pub fn media_paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| name.starts_with(MEDIA_DIR))
    }

    /// The main document part.
    pub fn document_xml(&self) -> Result<&[u8]> {
        self.get(DOCUMENT_PATH)
            .ok_or_else(|| OoxmlError::MissingPart(DOCUMENT_PATH.to_string()))
    }

    /// The content-type registry.
    pub fn content_types_xml(&self) -> Result<&[u8]> {
        self.get(CONTENT_TYPES_PATH)
            .ok_or_else(|| OoxmlError::MissingPart(CONTENT_TYPES_PATH.to_string()))
    }

    /// The document relationship manifest, if present.
    pub fn document_rels_xml(&self) -> Option<&[u8]> {
        self.get(DOCUMENT_RELS_PATH)
    }

    /// The core-properties part, if present.
    pub fn core_props_xml(&self) -> Option<&[u8]> {
        self.get(CORE_PROPS_PATH)
    }

    /// Write the archive to any writer, entries in container order.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options =
            zip::write::SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, contents) in &self.entries {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(contents)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the archive to a file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_zip_magic_detection() {
        assert!(has_zip_magic(b"PK\x03\x04rest"));
        assert!(!has_zip_magic(b"PK\x05\x06"));
        assert!(!has_zip_magic(b"%PDF-1.7"));
        assert!(!has_zip_magic(b"PK"));
    }

    #[test]
    fn test_open_rejects_non_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-package.docx");
        std::fs::write(&path, b"plain text, no zip here").unwrap();

        let err = PackageArchive::open(&path).unwrap_err();
        assert!(matches!(err, OoxmlError::NotAPackage(_)));
    }

    #[test]
    fn test_set_get_remove() {
        let mut archive = PackageArchive::new();
        archive.set("word/document.xml", b"<w:document/>".to_vec());
        assert!(archive.contains("word/document.xml"));
        assert_eq!(archive.document_xml().unwrap(), b"<w:document/>");

        archive.set("word/document.xml", b"<w:document>v2</w:document>".to_vec());
        assert_eq!(archive.iter().count(), 1);

        archive.remove("word/document.xml");
        assert!(matches!(
            archive.document_xml(),
            Err(OoxmlError::MissingPart(_))
        ));
    }

    #[test]
    fn test_entry_order_preserved_through_roundtrip() {
        let mut archive = PackageArchive::new();
        archive.set(CONTENT_TYPES_PATH, b"<Types/>".to_vec());
        archive.set("word/document.xml", b"<w:document/>".to_vec());
        archive.set("word/media/image1.png", vec![1, 2, 3]);

        let mut buffer = Cursor::new(Vec::new());
        archive.write_to(&mut buffer).unwrap();

        buffer.set_position(0);
        let restored = PackageArchive::from_reader(buffer).unwrap();
        let names: Vec<&str> = restored.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![CONTENT_TYPES_PATH, "word/document.xml", "word/media/image1.png"]
        );
        assert_eq!(restored.get("word/media/image1.png"), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_media_paths() {
        let mut archive = PackageArchive::new();
        archive.set("word/media/image1.png", vec![0]);
        archive.set("word/media/image2.jpeg", vec![0]);
        archive.set("word/styles.xml", b"<w:styles/>".to_vec());

        let media: Vec<&str> = archive.media_paths().collect();
        assert_eq!(media, vec!["word/media/image1.png", "word/media/image2.jpeg"]);
    }
}
