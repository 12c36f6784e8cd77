//! Office Open XML (OOXML) format implementation.
//!
//! # Architecture
//!
//! 1. **OPC Layer** (`opc`): package handling (ZIP, parts, relationships)
//! 2. **Crypto** (`crypto`): password verifiers for protection records
//! 3. **Spreadsheet** (`xlsx`): the workbook part and its editing API
pub mod crypto;
pub mod error;
pub mod opc;
pub mod xlsx;

// Re-export commonly used types from OPC layer
pub use opc::{OpcPackage, PackURI};

// Re-export error types
pub use error::{OoxmlError, Result};
