//! Excel (.xlsx) workbook part support.
//!
//! This module manages `xl/workbook.xml`: workbook properties, workbook
//! protection and the sheet list. The part is located through the package
//! relationships, decoded once into a [`WorkbookDescriptor`] cached on the
//! [`Workbook`] handle, and encoded back on save.
//!
//! # Example
//!
//! ```rust,no_run
//! use xlbook::ooxml::xlsx::{Workbook, WorkbookPropsOptions, WorkbookProtectionOptions};
//!
//! let mut workbook = Workbook::open("book.xlsx")?;
//! workbook.set_workbook_props(Some(&WorkbookPropsOptions {
//!     code_name: Some("Ledger".into()),
//!     ..Default::default()
//! }))?;
//! workbook.protect_workbook(Some(&WorkbookProtectionOptions {
//!     password: "secret".into(),
//!     lock_structure: true,
//!     ..Default::default()
//! }))?;
//!
//! for sheet in workbook.sheet_list()? {
//!     println!("{} ({})", sheet.name, sheet.r_id);
//! }
//! workbook.save("book.xlsx")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod descriptor;
pub mod namespace;
pub mod paths;
pub mod props;
pub mod protection;
pub mod sheets;
pub mod template;
pub mod workbook;

pub use descriptor::{
    AlternateContent, PreservedElement, SheetEntry, WorkbookDescriptor, WorkbookPr,
    WorkbookProtection,
};
pub use props::WorkbookPropsOptions;
pub use protection::{
    DEFAULT_PROTECTION_ALGORITHM, WORKBOOK_PROTECTION_SPIN_COUNT, WorkbookProtectionOptions,
};
pub use workbook::Workbook;
