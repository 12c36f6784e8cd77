/// The in-memory OPC package the workbook core reads from and writes to.
///
/// This module provides the main OpcPackage type, which holds every part of an
/// Open Packaging Convention package as raw bytes keyed by zip member name, and
/// lazily parsed relationship tables shared behind read/write locks.
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{PACKAGE_URI, PackURI};
use crate::ooxml::opc::rel::Relationships;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Shared handle to one relationship table.
pub type SharedRelationships = Arc<RwLock<Relationships>>;

/// Main API class for working with OPC packages.
///
/// Parts are stored by zip member name (no leading slash). Reading a part that
/// does not exist yields an empty slice rather than an error, so callers can
/// synthesize defaults for parts that are created on first save.
///
/// Relationship tables are parsed on first request and cached; the cache and
/// each table are lock-guarded so that several readers can resolve targets
/// while another caller adds relationships during package assembly.
#[derive(Debug, Default)]
pub struct OpcPackage {
    /// Raw part contents, indexed by member name
    parts: HashMap<String, Vec<u8>>,

    /// Member names in archive order
    order: Vec<String>,

    /// Parsed relationship tables, indexed by the member name of the .rels part
    rels: RwLock<HashMap<String, SharedRelationships>>,
}

impl OpcPackage {
    /// Create a new empty OPC package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an OPC package from a file.
    ///
    /// # Example
    /// ```no_run
    /// use xlbook::ooxml::opc::OpcPackage;
    ///
    /// let pkg = OpcPackage::open("book.xlsx").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load an OPC package from an in-memory zip archive.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    /// Load an OPC package from a reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut package = Self::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut blob = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut blob)?;
            package.write_part(&name, blob);
        }

        debug!(parts = package.part_count(), "opened package");
        Ok(package)
    }

    /// Get the content of a part, or an empty slice if the part is absent.
    pub fn read_part(&self, membername: &str) -> &[u8] {
        self.parts
            .get(membername.trim_start_matches('/'))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Store the content of a part, replacing any previous content.
    ///
    /// Writing a `.rels` part drops its cached table so the next lookup sees
    /// the new bytes.
    pub fn write_part(&mut self, membername: &str, blob: Vec<u8>) {
        let membername = membername.trim_start_matches('/').to_string();
        self.rels.get_mut().remove(&membername);
        if self.parts.insert(membername.clone(), blob).is_none() {
            self.order.push(membername);
        }
    }

    /// Check if a part exists in the package.
    pub fn contains_part(&self, membername: &str) -> bool {
        self.parts.contains_key(membername.trim_start_matches('/'))
    }

    /// Get the number of parts in the package.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Get the relationship table stored in the given `.rels` part.
    ///
    /// The table is parsed once and shared; a missing part yields an empty
    /// table that is written out on save if relationships get added to it.
    pub fn relationships(&self, rels_membername: &str) -> Result<SharedRelationships> {
        let key = rels_membername.trim_start_matches('/');

        if let Some(rels) = self.rels.read().get(key) {
            return Ok(Arc::clone(rels));
        }

        let parsed = Relationships::from_xml(self.read_part(key))?;
        let mut cache = self.rels.write();
        // Another caller may have parsed the same table in the meantime.
        let rels = cache
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(parsed)));
        Ok(Arc::clone(rels))
    }

    /// Get the package-level relationship table (`_rels/.rels`).
    pub fn package_relationships(&self) -> Result<SharedRelationships> {
        let rels_uri = PackURI::from_membername(PACKAGE_URI).rels_uri();
        self.relationships(rels_uri.membername())
    }

    /// Relate a source part to a target, reusing an existing relationship.
    ///
    /// # Returns
    /// The relationship ID (rId)
    pub fn relate_to(&self, rels_membername: &str, target_ref: &str, reltype: &str) -> Result<String> {
        let rels = self.relationships(rels_membername)?;
        let mut rels = rels.write();
        Ok(rels.get_or_add(reltype, target_ref).r_id().to_string())
    }

    /// Check whether the package declares a main office document.
    pub fn has_office_document(&self) -> Result<bool> {
        let rels = self.package_relationships()?;
        let rels = rels.read();
        Ok(rels
            .iter()
            .any(|rel| {
                rel.reltype() == relationship_type::OFFICE_DOCUMENT
                    || rel.reltype() == relationship_type::STRICT_OFFICE_DOCUMENT
            }))
    }

    /// Serialize the package into a zip archive.
    ///
    /// Relationship tables changed since they were loaded are written back
    /// in place of their original `.rels` parts.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        self.write_to(&mut writer)?;
        Ok(writer.finish()?.into_inner())
    }

    /// Save the package to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = ZipWriter::new(file);
        self.write_to(&mut writer)?;
        writer.finish()?;
        debug!(path = %path.as_ref().display(), "saved package");
        Ok(())
    }

    fn write_to<W: Write + Seek>(&self, writer: &mut ZipWriter<W>) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let modified_rels: HashMap<String, String> = self
            .rels
            .read()
            .iter()
            .filter_map(|(name, rels)| {
                let rels = rels.read();
                rels.is_modified().then(|| (name.clone(), rels.to_xml()))
            })
            .collect();

        for name in &self.order {
            writer.start_file(name.as_str(), options)?;
            match modified_rels.get(name) {
                Some(xml) => writer.write_all(xml.as_bytes())?,
                None => writer.write_all(&self.parts[name])?,
            }
        }

        // Tables created from scratch have no part yet.
        let mut fresh: Vec<&String> = modified_rels
            .keys()
            .filter(|name| !self.parts.contains_key(name.as_str()))
            .collect();
        fresh.sort();
        for name in fresh {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(modified_rels[name].as_bytes())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_minimal_xlsx() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        writer.start_file("[Content_Types].xml", options).unwrap();
        writer
            .write_all(br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#)
            .unwrap();

        writer.start_file("_rels/.rels", options).unwrap();
        writer
            .write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#)
            .unwrap();

        writer.start_file("xl/workbook.xml", options).unwrap();
        writer
            .write_all(br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"/>"#)
            .unwrap();

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_open_package() {
        let pkg = OpcPackage::from_bytes(&create_minimal_xlsx()).unwrap();
        assert_eq!(pkg.part_count(), 3);
        assert!(pkg.contains_part("xl/workbook.xml"));
        assert!(pkg.contains_part("/xl/workbook.xml"));
        assert!(pkg.has_office_document().unwrap());
    }

    #[test]
    fn test_read_missing_part_is_empty() {
        let pkg = OpcPackage::new();
        assert!(pkg.read_part("xl/workbook.xml").is_empty());
    }

    #[test]
    fn test_relationship_tables_are_shared() {
        let pkg = OpcPackage::from_bytes(&create_minimal_xlsx()).unwrap();
        let first = pkg.package_relationships().unwrap();
        let second = pkg.package_relationships().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.read().len(), 1);
    }

    #[test]
    fn test_relate_to_round_trips_through_zip() {
        let pkg = OpcPackage::from_bytes(&create_minimal_xlsx()).unwrap();
        let r_id = pkg
            .relate_to(
                "xl/_rels/workbook.xml.rels",
                "worksheets/sheet1.xml",
                relationship_type::WORKSHEET,
            )
            .unwrap();
        assert_eq!(r_id, "rId1");

        let reopened = OpcPackage::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        let rels = reopened.relationships("xl/_rels/workbook.xml.rels").unwrap();
        let rels = rels.read();
        let rel = rels.get("rId1").unwrap();
        assert_eq!(rel.target_ref(), "worksheets/sheet1.xml");
        assert_eq!(rel.reltype(), relationship_type::WORKSHEET);
    }

    #[test]
    fn test_write_part_invalidates_cached_table() {
        let mut pkg = OpcPackage::from_bytes(&create_minimal_xlsx()).unwrap();
        assert_eq!(pkg.package_relationships().unwrap().read().len(), 1);

        pkg.write_part("_rels/.rels", b"".to_vec());
        assert!(pkg.package_relationships().unwrap().read().is_empty());
        assert!(!pkg.has_office_document().unwrap());
    }
}
