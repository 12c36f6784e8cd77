//! Spreadsheet template module.
//!
//! Provides the bare minimum set of parts for a new package: the content
//! type table and an empty workbook part. The package relationship pointing
//! at the workbook is added through the relationship table.

use crate::ooxml::opc::constants::{content_type as ct, namespace as ns};

/// Member name of the workbook part in new packages.
pub const DEFAULT_WORKBOOK_PATH: &str = "xl/workbook.xml";

/// Generate a minimal `[Content_Types].xml`.
pub fn default_content_types_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<Types xmlns="{}">"#,
            r#"<Default Extension="rels" ContentType="{}"/>"#,
            r#"<Default Extension="xml" ContentType="{}"/>"#,
            r#"<Override PartName="/{}" ContentType="{}"/>"#,
            "</Types>"
        ),
        ns::OPC_CONTENT_TYPES,
        ct::OPC_RELATIONSHIPS,
        ct::XML,
        DEFAULT_WORKBOOK_PATH,
        ct::SML_SHEET_MAIN,
    )
}

/// Generate an empty workbook part.
pub fn default_workbook_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<workbook xmlns="{}" xmlns:r="{}"><sheets/></workbook>"#
        ),
        ns::SML_MAIN,
        ns::OFC_RELATIONSHIPS,
    )
}
