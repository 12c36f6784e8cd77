//! XML text helpers shared by the part encoders.

mod escape;

pub use escape::escape_xml;
