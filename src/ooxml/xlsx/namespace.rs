//! Namespace bookkeeping for parts that are decoded and re-encoded.
//!
//! The encoder only knows the handful of namespaces the workbook model uses.
//! Everything else a producer declared on the root element (`xmlns:x15`,
//! `mc:Ignorable`, ...) is captured per part when the part is first read and
//! restored on the encoded root element, so preserved markup that relies on
//! those prefixes stays valid.

use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::namespace;
use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::trace;

const STRICT_NAMESPACES: [&str; 5] = [
    namespace::strict::SML_MAIN,
    namespace::strict::OFC_RELATIONSHIPS,
    namespace::strict::DML_MAIN,
    namespace::strict::DML_CHART,
    namespace::strict::DML_SPREADSHEET_DRAWING,
];

const TRANSITIONAL_NAMESPACES: [&str; 5] = [
    namespace::SML_MAIN,
    namespace::OFC_RELATIONSHIPS,
    namespace::DML_MAIN,
    namespace::DML_CHART,
    namespace::DML_SPREADSHEET_DRAWING,
];

static STRICT_TRANSLATOR: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(STRICT_NAMESPACES)
        .expect("Failed to build strict namespace translator")
});

/// Rewrite strict-conformance namespace URIs to their transitional form.
///
/// Returns the input unchanged (borrowed) when it holds no strict URI.
pub fn strict_to_transitional(xml: &[u8]) -> Cow<'_, [u8]> {
    if STRICT_TRANSLATOR.is_match(xml) {
        Cow::Owned(STRICT_TRANSLATOR.replace_all_bytes(xml, &TRANSITIONAL_NAMESPACES))
    } else {
        Cow::Borrowed(xml)
    }
}

/// Long-form relationship attribute emitted by the encoder, collapsed on write.
const RELATIONSHIPS_LONG_FORM: &str = concat!(
    r#"xmlns:relationships="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
    " relationships"
);

/// Collapse self-declared relationship references to the conventional `r:` prefix.
///
/// The encoder writes relationship-id attributes together with their own
/// namespace declaration so its output is valid on its own; packages store
/// them as `r:id` with `xmlns:r` declared once on the root element.
pub fn replace_relationship_tokens(xml: &[u8]) -> Vec<u8> {
    let finder = memchr::memmem::Finder::new(RELATIONSHIPS_LONG_FORM);
    let mut out = Vec::with_capacity(xml.len());
    let mut last = 0;
    for pos in finder.find_iter(xml) {
        out.extend_from_slice(&xml[last..pos]);
        out.push(b'r');
        last = pos + RELATIONSHIPS_LONG_FORM.len();
    }
    out.extend_from_slice(&xml[last..]);
    out
}

/// An attribute of a part's root element, value kept in escaped form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootAttr {
    pub name: String,
    pub value: String,
}

impl RootAttr {
    fn is_namespace_decl(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// Root-element attributes captured per part path.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    parts: HashMap<String, Vec<RootAttr>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the part's root attributes were already captured.
    pub fn contains(&self, part: &str) -> bool {
        self.parts.contains_key(part)
    }

    /// Captured root attributes for a part, in document order.
    pub fn attributes(&self, part: &str) -> &[RootAttr] {
        self.parts.get(part).map(Vec::as_slice).unwrap_or_default()
    }

    /// Capture the attributes of the root element of `xml` for `part`.
    ///
    /// A part without a root element registers an empty attribute list.
    pub fn register_root(&mut self, part: &str, xml: &[u8]) -> Result<()> {
        let mut attrs = Vec::new();
        let mut reader = Reader::from_reader(xml);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    attrs = root_attrs(e.attributes()).map_err(|e| OoxmlError::decode(part, e))?;
                    break;
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OoxmlError::decode(part, e)),
                _ => {},
            }
        }

        trace!(part, count = attrs.len(), "registered root attributes");
        self.parts.insert(part.to_string(), attrs);
        Ok(())
    }

    /// Make sure `part` declares `prefix` for `uri` on its root element.
    ///
    /// Nothing is added when the prefix is already declared.
    pub fn add_namespace(&mut self, part: &str, prefix: &str, uri: &str) {
        let attrs = self.parts.entry(part.to_string()).or_default();
        let name = format!("xmlns:{prefix}");
        if attrs.iter().all(|attr| attr.name != name) {
            attrs.push(RootAttr {
                name,
                value: uri.to_string(),
            });
        }
    }

    /// Replace the root element attributes of freshly encoded `xml`.
    ///
    /// Namespace declarations captured for `part` win; other attributes
    /// written by the encoder (such as `conformance`) keep the encoder's value.
    pub fn rewrite_root(&self, part: &str, xml: &[u8]) -> Result<Vec<u8>> {
        let captured = self.attributes(part);
        if captured.is_empty() {
            return Ok(xml.to_vec());
        }

        let mut reader = Reader::from_reader(xml);
        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| OoxmlError::Xml(e.to_string()))?;
            let (e, self_closing) = match event {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::Eof => return Ok(xml.to_vec()),
                _ => continue,
            };
            let end = reader.buffer_position() as usize;

            let encoded =
                root_attrs(e.attributes()).map_err(|e| OoxmlError::Xml(e.to_string()))?;
            let merged = merge_attrs(captured, encoded);

            let mut out = Vec::with_capacity(xml.len() + 256);
            out.extend_from_slice(&xml[..start]);
            out.push(b'<');
            out.extend_from_slice(e.name().as_ref());
            for attr in &merged {
                out.push(b' ');
                out.extend_from_slice(attr.name.as_bytes());
                out.extend_from_slice(b"=\"");
                out.extend_from_slice(attr.value.as_bytes());
                out.push(b'"');
            }
            out.extend_from_slice(if self_closing { b"/>".as_slice() } else { b">".as_slice() });
            out.extend_from_slice(&xml[end..]);
            return Ok(out);
        }
    }
}

fn root_attrs(
    attributes: quick_xml::events::attributes::Attributes<'_>,
) -> std::result::Result<Vec<RootAttr>, String> {
    let mut attrs = Vec::new();
    for attr in attributes {
        let attr = attr.map_err(|e| e.to_string())?;
        let name = std::str::from_utf8(attr.key.as_ref()).map_err(|e| e.to_string())?;
        let value = std::str::from_utf8(&attr.value).map_err(|e| e.to_string())?;
        attrs.push(RootAttr {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(attrs)
}

fn merge_attrs(captured: &[RootAttr], encoded: Vec<RootAttr>) -> Vec<RootAttr> {
    let mut merged = captured.to_vec();
    for attr in encoded {
        match merged.iter_mut().find(|m| m.name == attr.name) {
            Some(existing) if !attr.is_namespace_decl() => existing.value = attr.value,
            Some(_) => {},
            None => merged.push(attr),
        }
    }
    merged
}
