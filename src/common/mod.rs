//! Common utilities shared across formats.

pub mod xml;
