//! xlbook - workbook-level editing for Excel `.xlsx` packages
//!
//! This library manages the workbook part of an Office Open XML spreadsheet:
//! it locates `xl/workbook.xml` through the package relationships, decodes it
//! lazily into a cached in-memory model, and writes it back on save with the
//! package's namespace declarations intact.
//!
//! # Features
//!
//! - **Workbook properties**: `date1904`, `filterPrivacy` and `codeName`
//! - **Workbook protection**: structure/window locks with ISO salted password
//!   hashes (MD4, MD5, SHA-1, SHA-256, SHA-384, SHA-512) and the legacy XOR
//!   verifier
//! - **Sheet registration**: append sheet references in tab order
//! - **Lossless round-trip**: markup that is not modelled is carried through
//!
//! # Example
//!
//! ```rust
//! use xlbook::{Workbook, WorkbookProtectionOptions};
//!
//! let mut workbook = Workbook::new()?;
//! workbook.set_workbook("Sheet1", 1, 1)?;
//! workbook.protect_workbook(Some(&WorkbookProtectionOptions {
//!     algorithm_name: "MD5".into(),
//!     password: "pw1".into(),
//!     lock_structure: true,
//!     ..Default::default()
//! }))?;
//!
//! let bytes = workbook.to_bytes()?;
//! let mut reopened = Workbook::from_bytes(&bytes)?;
//! reopened.unprotect_workbook(Some("pw1"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Shared helpers (XML escaping)
pub mod common;

/// OOXML (Office Open XML) package and workbook support
pub mod ooxml;

// Re-export commonly used types for convenience
pub use ooxml::xlsx::{
    SheetEntry, Workbook, WorkbookDescriptor, WorkbookPropsOptions, WorkbookProtectionOptions,
};
pub use ooxml::{OoxmlError, Result};
