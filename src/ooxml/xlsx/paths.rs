//! Location of the workbook part and its relationship part.
//!
//! The workbook part is never assumed to live at `xl/workbook.xml`; it is
//! found through the package-level `officeDocument` relationship.

use crate::ooxml::error::Result;
use crate::ooxml::opc::OpcPackage;
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::packuri::PackURI;
use tracing::warn;

/// Whether a relationship type marks the main document part.
///
/// Strict-conformance packages use their own relationship namespace.
pub(crate) fn is_office_document(reltype: &str) -> bool {
    reltype == relationship_type::OFFICE_DOCUMENT
        || reltype == relationship_type::STRICT_OFFICE_DOCUMENT
}

/// Resolve the member name of the workbook part.
///
/// Returns an empty string when the package declares no main document,
/// including when `_rels/.rels` cannot be parsed. The package relationship
/// table is only read-locked.
pub fn workbook_path(package: &OpcPackage) -> Result<String> {
    let rels = match package.package_relationships() {
        Ok(rels) => rels,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable package relationships");
            return Ok(String::new());
        },
    };
    let rels = rels.read();
    Ok(rels
        .iter()
        .find(|rel| !rel.is_external() && is_office_document(rel.reltype()))
        .map(|rel| rel.target_ref().trim_start_matches('/').to_string())
        .unwrap_or_default())
}

/// Member name of the relationship part belonging to `workbook_path`.
///
/// `xl/workbook.xml` maps to `xl/_rels/workbook.xml.rels` and a part at the
/// package root such as `workbook.xml` maps to `_rels/workbook.xml.rels`.
/// An empty path has no relationship part and yields an empty string.
pub fn workbook_rels_path(workbook_path: &str) -> String {
    if workbook_path.is_empty() {
        return String::new();
    }
    PackURI::from_membername(workbook_path)
        .rels_uri()
        .membername()
        .to_string()
}
