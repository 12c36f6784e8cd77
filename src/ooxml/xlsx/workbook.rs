//! Excel workbook handle.
//!
//! A [`Workbook`] owns the package and, once loaded, the decoded workbook
//! part. The descriptor is decoded at most once per handle; every edit goes
//! through the cached copy, and it is encoded back into the package only when
//! [`Workbook::workbook_writer`] runs (which every save does).

use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::OpcPackage;
use crate::ooxml::opc::constants::{namespace, relationship_type};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_MEMBER, PACKAGE_URI, PackURI};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::descriptor::{AlternateContent, WorkbookDescriptor};
use super::namespace::{NamespaceRegistry, replace_relationship_tokens, strict_to_transitional};
use super::paths;
use super::template;

/// An Excel workbook backed by an OPC package.
#[derive(Debug)]
pub struct Workbook {
    /// The underlying OPC package
    package: OpcPackage,
    /// Decoded workbook part, filled on first access
    workbook: Option<WorkbookDescriptor>,
    /// Root namespace declarations captured per decoded part
    namespaces: NamespaceRegistry,
}

impl Workbook {
    /// Create a new empty workbook.
    ///
    /// The package holds a content type table, the package relationship to
    /// `xl/workbook.xml` and an empty workbook part without sheets.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use xlbook::ooxml::xlsx::Workbook;
    ///
    /// let mut workbook = Workbook::new()?;
    /// workbook.set_workbook("Sheet1", 1, 1)?;
    /// workbook.save("new_workbook.xlsx")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new() -> Result<Self> {
        let mut package = OpcPackage::new();
        package.write_part(
            CONTENT_TYPES_MEMBER,
            template::default_content_types_xml().into_bytes(),
        );
        package.write_part(
            template::DEFAULT_WORKBOOK_PATH,
            template::default_workbook_xml().into_bytes(),
        );

        let package_rels = PackURI::from_membername(PACKAGE_URI).rels_uri();
        package.relate_to(
            package_rels.membername(),
            template::DEFAULT_WORKBOOK_PATH,
            relationship_type::OFFICE_DOCUMENT,
        )?;

        Ok(Self::from_package(package))
    }

    /// Wrap an already loaded package.
    pub fn from_package(package: OpcPackage) -> Self {
        Workbook {
            package,
            workbook: None,
            namespaces: NamespaceRegistry::new(),
        }
    }

    /// Open a workbook from a path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let package = OpcPackage::open(path)?;
        Ok(Self::from_package(package))
    }

    /// Load a workbook from an in-memory `.xlsx` archive.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let package = OpcPackage::from_bytes(data)?;
        Ok(Self::from_package(package))
    }

    /// The underlying package.
    ///
    /// The workbook part in it is stale while the cached descriptor holds
    /// unsaved edits.
    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    /// Member name of the workbook part, empty if the package declares none.
    pub fn workbook_path(&self) -> Result<String> {
        paths::workbook_path(&self.package)
    }

    /// Member name of the workbook's relationship part.
    pub fn workbook_rels_path(&self) -> Result<String> {
        Ok(paths::workbook_rels_path(&self.workbook_path()?))
    }

    /// Get the decoded workbook part, decoding it on first use.
    ///
    /// A missing or empty part yields an empty descriptor. Later calls return
    /// the same cached instance without touching the package. A failed decode
    /// caches nothing.
    pub fn workbook_reader(&mut self) -> Result<&mut WorkbookDescriptor> {
        let descriptor = match self.workbook.take() {
            Some(descriptor) => descriptor,
            None => self.load_workbook()?,
        };
        Ok(self.workbook.insert(descriptor))
    }

    fn load_workbook(&mut self) -> Result<WorkbookDescriptor> {
        let path = self.workbook_path()?;
        if path.is_empty() {
            warn!("package has no officeDocument relationship");
        }

        let content = strict_to_transitional(self.package.read_part(&path));
        let descriptor = WorkbookDescriptor::decode(&path, &content)?;

        if !self.namespaces.contains(&path) {
            self.namespaces.register_root(&path, &content)?;
            self.namespaces
                .add_namespace(&path, "r", namespace::OFC_RELATIONSHIPS);
        }

        debug!(
            part = %path,
            sheets = descriptor.sheets.len(),
            protected = descriptor.workbook_protection.is_some(),
            "decoded workbook part"
        );
        Ok(descriptor)
    }

    /// Encode the cached descriptor back into the package.
    ///
    /// Does nothing if the descriptor was never loaded. Fails with
    /// [`OoxmlError::PartNotFound`], leaving the descriptor untouched, when
    /// the package has no workbook relationship to write to.
    pub fn workbook_writer(&mut self) -> Result<()> {
        let Some(descriptor) = self.workbook.as_mut() else {
            return Ok(());
        };

        let path = paths::workbook_path(&self.package)?;
        if path.is_empty() {
            warn!("cannot write workbook part without an officeDocument relationship");
            return Err(OoxmlError::PartNotFound(
                "officeDocument relationship".to_string(),
            ));
        }

        if let Some(content) = descriptor.decoded_alternate_content.take() {
            descriptor.alternate_content = Some(AlternateContent {
                content,
                xmlns_mc: namespace::MARKUP_COMPATIBILITY.to_string(),
            });
        }

        let output = descriptor.encode();
        let output = self.namespaces.rewrite_root(&path, &output)?;
        let output = replace_relationship_tokens(&output);

        debug!(part = %path, bytes = output.len(), "wrote workbook part");
        self.package.write_part(&path, output);
        Ok(())
    }

    /// Flush pending edits and save the workbook to a file.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use xlbook::ooxml::xlsx::Workbook;
    ///
    /// let mut workbook = Workbook::open("input.xlsx")?;
    /// workbook.unprotect_workbook(None)?;
    /// workbook.save("output.xlsx")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.workbook_writer()?;
        self.package.save(path)?;
        Ok(())
    }

    /// Flush pending edits and write the `.xlsx` archive to `writer`.
    pub fn save_to<W: Write>(&mut self, mut writer: W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Flush pending edits and serialize the workbook to `.xlsx` bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.workbook_writer()?;
        Ok(self.package.to_bytes()?)
    }
}
