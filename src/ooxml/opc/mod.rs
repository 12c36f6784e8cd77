/// Open Packaging Conventions (OPC) implementation.
///
/// This module provides the package layer the workbook core sits on:
///
/// - Part storage keyed by zip member name, read/written as raw bytes
/// - Relationship tables, parsed lazily and shared behind `parking_lot` locks
/// - ZIP-based physical packaging through the `zip` crate
pub mod constants;
pub mod error;
pub mod package;
pub mod packuri;
pub mod rel;

// Re-export commonly used types
pub use package::{OpcPackage, SharedRelationships};
pub use packuri::PackURI;
pub use rel::{Relationship, Relationships};
