//! In-memory model of the workbook part (`xl/workbook.xml`).
//!
//! Only the pieces the workbook core edits are modelled: workbook properties,
//! workbook protection and the sheet list. The `mc:AlternateContent` block is
//! carried through as raw markup, and every other top-level child is kept as
//! raw outer XML and written back at its schema position, so a decode/encode
//! cycle never drops content this crate does not understand.

use crate::common::xml::escape_xml;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::namespace;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Top-level children of `CT_Workbook`, in schema order. `AlternateContent`
/// and `revisionPtr` sit where Excel writes them.
const WORKBOOK_CHILD_ORDER: [&[u8]; 21] = [
    b"fileVersion",
    b"fileSharing",
    b"workbookPr",
    b"AlternateContent",
    b"revisionPtr",
    b"workbookProtection",
    b"bookViews",
    b"sheets",
    b"functionGroups",
    b"externalReferences",
    b"definedNames",
    b"calcPr",
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

const RANK_WORKBOOK_PR: usize = 2;
const RANK_ALTERNATE_CONTENT: usize = 3;
const RANK_PROTECTION: usize = 5;
const RANK_SHEETS: usize = 7;

fn child_rank(local_name: &[u8]) -> Option<usize> {
    WORKBOOK_CHILD_ORDER
        .iter()
        .position(|name| *name == local_name)
}

/// The `workbookPr` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookPr {
    pub date1904: bool,
    pub filter_privacy: bool,
    pub code_name: String,
    /// Attributes not modelled above, in document order (unescaped values)
    pub extra_attrs: Vec<(String, String)>,
}

/// The `workbookProtection` element.
///
/// `algorithm_name` is empty when the record carries no verifiable hash.
/// Legacy `workbookPassword` verifiers are represented with the `XOR`
/// algorithm and a two-byte big-endian hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookProtection {
    pub lock_structure: bool,
    pub lock_windows: bool,
    pub algorithm_name: String,
    pub salt_value: Vec<u8>,
    pub hash_value: Vec<u8>,
    pub spin_count: u32,
    /// Revision-lock attributes and anything else not modelled above
    pub extra_attrs: Vec<(String, String)>,
}

/// One `sheet` entry of the `sheets` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub r_id: String,
    /// Visibility (`hidden`, `veryHidden`); `None` means visible
    pub state: Option<String>,
}

/// `mc:AlternateContent` in the form it is written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateContent {
    /// Raw inner markup
    pub content: String,
    pub xmlns_mc: String,
}

/// A top-level child kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedElement {
    rank: usize,
    xml: String,
}

impl PreservedElement {
    /// Raw outer XML of the element.
    pub fn xml(&self) -> &str {
        &self.xml
    }
}

/// Decoded form of the workbook part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookDescriptor {
    pub conformance: Option<String>,
    pub workbook_pr: Option<WorkbookPr>,
    /// Present when the workbook is protected
    pub workbook_protection: Option<WorkbookProtection>,
    /// Sheet references in tab order
    pub sheets: Vec<SheetEntry>,
    /// Written on encode
    pub alternate_content: Option<AlternateContent>,
    /// Filled on decode only; moved into `alternate_content` before encoding
    pub decoded_alternate_content: Option<String>,
    pub preserved: Vec<PreservedElement>,
}

impl WorkbookDescriptor {
    /// Decode a workbook part.
    ///
    /// Input without a root element (including empty input) yields an empty
    /// descriptor. A root element other than SpreadsheetML `workbook` is an
    /// error, as is malformed XML.
    pub fn decode(part: &str, xml: &[u8]) -> Result<Self> {
        let mut wb = Self::default();
        let mut reader = Reader::from_reader(xml);

        loop {
            match reader.read_event().map_err(|e| OoxmlError::decode(part, e))? {
                Event::Start(e) => {
                    check_root(part, &e)?;
                    wb.read_root_attrs(part, &e)?;
                    let rel_prefixes = relationship_prefixes(part, &e, &[])?;
                    wb.read_children(part, xml, &mut reader, &rel_prefixes)?;
                    return Ok(wb);
                },
                Event::Empty(e) => {
                    check_root(part, &e)?;
                    wb.read_root_attrs(part, &e)?;
                    return Ok(wb);
                },
                Event::Eof => return Ok(wb),
                _ => {},
            }
        }
    }

    fn read_root_attrs(&mut self, part: &str, e: &BytesStart<'_>) -> Result<()> {
        for attr in e.attributes() {
            let attr = attr.map_err(|e| OoxmlError::decode(part, e))?;
            if attr.key.as_ref() == b"conformance" {
                self.conformance = Some(attr_value(part, &attr)?);
            }
        }
        Ok(())
    }

    fn read_children(
        &mut self,
        part: &str,
        xml: &[u8],
        reader: &mut Reader<&[u8]>,
        rel_prefixes: &[Vec<u8>],
    ) -> Result<()> {
        let dec = |e: quick_xml::Error| OoxmlError::decode(part, e);
        let mut last_rank = 0;

        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event().map_err(dec)? {
                Event::Start(e) => {
                    let local = e.local_name();
                    match local.as_ref() {
                        b"workbookPr" => {
                            self.workbook_pr = Some(parse_workbook_pr(part, &e)?);
                            reader.read_to_end(e.name()).map_err(dec)?;
                            last_rank = RANK_WORKBOOK_PR;
                        },
                        b"workbookProtection" => {
                            self.workbook_protection = Some(parse_protection(part, &e)?);
                            reader.read_to_end(e.name()).map_err(dec)?;
                            last_rank = RANK_PROTECTION;
                        },
                        b"sheets" => {
                            let rel_prefixes = relationship_prefixes(part, &e, rel_prefixes)?;
                            self.read_sheets(part, reader, &rel_prefixes)?;
                            last_rank = RANK_SHEETS;
                        },
                        b"AlternateContent" if self.decoded_alternate_content.is_none() => {
                            let span = reader.read_to_end(e.name()).map_err(dec)?;
                            let inner = &xml[span.start as usize..span.end as usize];
                            self.decoded_alternate_content = Some(utf8(part, inner)?);
                            last_rank = RANK_ALTERNATE_CONTENT;
                        },
                        other => {
                            last_rank = child_rank(other).unwrap_or(last_rank);
                            reader.read_to_end(e.name()).map_err(dec)?;
                            let after = reader.buffer_position() as usize;
                            self.preserve(part, last_rank, &xml[before..after])?;
                        },
                    }
                },
                Event::Empty(e) => {
                    let local = e.local_name();
                    match local.as_ref() {
                        b"workbookPr" => {
                            self.workbook_pr = Some(parse_workbook_pr(part, &e)?);
                            last_rank = RANK_WORKBOOK_PR;
                        },
                        b"workbookProtection" => {
                            self.workbook_protection = Some(parse_protection(part, &e)?);
                            last_rank = RANK_PROTECTION;
                        },
                        b"sheets" => last_rank = RANK_SHEETS,
                        b"AlternateContent" if self.decoded_alternate_content.is_none() => {
                            self.decoded_alternate_content = Some(String::new());
                            last_rank = RANK_ALTERNATE_CONTENT;
                        },
                        other => {
                            last_rank = child_rank(other).unwrap_or(last_rank);
                            let after = reader.buffer_position() as usize;
                            self.preserve(part, last_rank, &xml[before..after])?;
                        },
                    }
                },
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(OoxmlError::decode(part, "unexpected end of document"));
                },
                _ => {},
            }
        }
    }

    fn read_sheets(
        &mut self,
        part: &str,
        reader: &mut Reader<&[u8]>,
        rel_prefixes: &[Vec<u8>],
    ) -> Result<()> {
        let dec = |e: quick_xml::Error| OoxmlError::decode(part, e);

        loop {
            match reader.read_event().map_err(dec)? {
                Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                    self.sheets.push(parse_sheet(part, &e, rel_prefixes)?);
                },
                Event::Start(e) => {
                    if e.local_name().as_ref() == b"sheet" {
                        self.sheets.push(parse_sheet(part, &e, rel_prefixes)?);
                    }
                    reader.read_to_end(e.name()).map_err(dec)?;
                },
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(OoxmlError::decode(part, "unexpected end of document"));
                },
                _ => {},
            }
        }
    }

    fn preserve(&mut self, part: &str, rank: usize, raw: &[u8]) -> Result<()> {
        self.preserved.push(PreservedElement {
            rank,
            xml: utf8(part, raw)?,
        });
        Ok(())
    }

    /// Encode the descriptor as a standalone XML document.
    ///
    /// Relationship ids are written with a local `relationships` namespace
    /// declaration; see [`super::namespace::replace_relationship_tokens`].
    pub fn encode(&self) -> Vec<u8> {
        let mut xml = String::with_capacity(2048);
        let mut preserved = self.preserved.iter().peekable();

        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(r#"<workbook xmlns=""#);
        xml.push_str(namespace::SML_MAIN);
        xml.push('"');
        if let Some(conformance) = &self.conformance {
            push_attr(&mut xml, "conformance", conformance);
        }
        xml.push('>');

        emit_preserved(&mut xml, &mut preserved, RANK_WORKBOOK_PR);
        if let Some(pr) = &self.workbook_pr {
            pr.write_xml(&mut xml);
        }

        emit_preserved(&mut xml, &mut preserved, RANK_ALTERNATE_CONTENT);
        if let Some(ac) = &self.alternate_content {
            xml.push_str(r#"<mc:AlternateContent xmlns:mc=""#);
            xml.push_str(&escape_xml(&ac.xmlns_mc));
            xml.push_str(r#"">"#);
            xml.push_str(&ac.content);
            xml.push_str("</mc:AlternateContent>");
        }

        emit_preserved(&mut xml, &mut preserved, RANK_PROTECTION);
        if let Some(protection) = &self.workbook_protection {
            protection.write_xml(&mut xml);
        }

        emit_preserved(&mut xml, &mut preserved, RANK_SHEETS);
        if self.sheets.is_empty() {
            xml.push_str("<sheets/>");
        } else {
            xml.push_str("<sheets>");
            for sheet in &self.sheets {
                sheet.write_xml(&mut xml);
            }
            xml.push_str("</sheets>");
        }

        emit_preserved(&mut xml, &mut preserved, usize::MAX);
        xml.push_str("</workbook>");

        xml.into_bytes()
    }
}

impl WorkbookPr {
    fn write_xml(&self, xml: &mut String) {
        xml.push_str("<workbookPr");
        if self.date1904 {
            push_attr(xml, "date1904", "1");
        }
        if self.filter_privacy {
            push_attr(xml, "filterPrivacy", "1");
        }
        if !self.code_name.is_empty() {
            push_attr(xml, "codeName", &self.code_name);
        }
        for (name, value) in &self.extra_attrs {
            push_attr(xml, name, value);
        }
        xml.push_str("/>");
    }
}

impl WorkbookProtection {
    fn write_xml(&self, xml: &mut String) {
        xml.push_str("<workbookProtection");
        if let Some(legacy) = self.legacy_password() {
            push_attr(xml, "workbookPassword", &format!("{legacy:04X}"));
        } else {
            if !self.algorithm_name.is_empty() {
                push_attr(xml, "workbookAlgorithmName", &self.algorithm_name);
            }
            if !self.hash_value.is_empty() {
                push_attr(xml, "workbookHashValue", &BASE64_ENGINE.encode(&self.hash_value));
            }
            if !self.salt_value.is_empty() {
                push_attr(xml, "workbookSaltValue", &BASE64_ENGINE.encode(&self.salt_value));
            }
            if self.spin_count != 0 {
                let mut buf = itoa::Buffer::new();
                push_attr(xml, "workbookSpinCount", buf.format(self.spin_count));
            }
        }
        for (name, value) in &self.extra_attrs {
            push_attr(xml, name, value);
        }
        if self.lock_structure {
            push_attr(xml, "lockStructure", "1");
        }
        if self.lock_windows {
            push_attr(xml, "lockWindows", "1");
        }
        xml.push_str("/>");
    }

    /// The record as a legacy `workbookPassword` verifier, if it has exactly
    /// that shape. Anything else is written with the ISO attributes.
    fn legacy_password(&self) -> Option<u16> {
        if self.algorithm_name != "XOR"
            || !self.salt_value.is_empty()
            || self.spin_count != 0
            || self.extra_attrs.iter().any(|(name, _)| name == "workbookPassword")
        {
            return None;
        }
        match self.hash_value[..] {
            [hi, lo] => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }
}

impl SheetEntry {
    fn write_xml(&self, xml: &mut String) {
        let mut buf = itoa::Buffer::new();
        xml.push_str("<sheet");
        push_attr(xml, "name", &self.name);
        push_attr(xml, "sheetId", buf.format(self.sheet_id));
        if let Some(state) = &self.state {
            push_attr(xml, "state", state);
        }
        push_attr(xml, "xmlns:relationships", namespace::OFC_RELATIONSHIPS);
        push_attr(xml, "relationships:id", &self.r_id);
        xml.push_str("/>");
    }
}

fn emit_preserved<'a>(
    xml: &mut String,
    preserved: &mut std::iter::Peekable<impl Iterator<Item = &'a PreservedElement>>,
    before_rank: usize,
) {
    while let Some(element) = preserved.next_if(|p| p.rank < before_rank) {
        xml.push_str(&element.xml);
    }
}

fn push_attr(xml: &mut String, name: &str, value: &str) {
    xml.push(' ');
    xml.push_str(name);
    xml.push_str("=\"");
    xml.push_str(&escape_xml(value));
    xml.push('"');
}

fn check_root(part: &str, e: &BytesStart<'_>) -> Result<()> {
    let name = e.name();
    if name.local_name().as_ref() != b"workbook" {
        return Err(OoxmlError::decode(
            part,
            format!(
                "expected <workbook> root element, found <{}>",
                String::from_utf8_lossy(name.as_ref())
            ),
        ));
    }

    let decl = match name.prefix() {
        Some(prefix) => format!("xmlns:{}", String::from_utf8_lossy(prefix.as_ref())),
        None => "xmlns".to_string(),
    };
    let mut found = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| OoxmlError::decode(part, e))?;
        if attr.key.as_ref() == decl.as_bytes() {
            found = Some(attr_value(part, &attr)?);
        }
    }

    match found.as_deref() {
        Some(namespace::SML_MAIN) => Ok(()),
        Some(other) => Err(OoxmlError::decode(
            part,
            format!("incompatible namespace '{other}' on <workbook>"),
        )),
        None => Err(OoxmlError::decode(part, "<workbook> has no namespace")),
    }
}

fn parse_workbook_pr(part: &str, e: &BytesStart<'_>) -> Result<WorkbookPr> {
    let mut pr = WorkbookPr::default();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| OoxmlError::decode(part, e))?;
        let value = attr_value(part, &attr)?;
        match attr.key.as_ref() {
            b"date1904" => pr.date1904 = parse_bool(part, "date1904", &value)?,
            b"filterPrivacy" => pr.filter_privacy = parse_bool(part, "filterPrivacy", &value)?,
            b"codeName" => pr.code_name = value,
            key => pr.extra_attrs.push((utf8(part, key)?, value)),
        }
    }
    Ok(pr)
}

fn parse_protection(part: &str, e: &BytesStart<'_>) -> Result<WorkbookProtection> {
    let mut protection = WorkbookProtection::default();
    let mut legacy = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|e| OoxmlError::decode(part, e))?;
        let value = attr_value(part, &attr)?;
        match attr.key.as_ref() {
            b"lockStructure" => {
                protection.lock_structure = parse_bool(part, "lockStructure", &value)?
            },
            b"lockWindows" => protection.lock_windows = parse_bool(part, "lockWindows", &value)?,
            b"workbookAlgorithmName" => protection.algorithm_name = value,
            b"workbookHashValue" => {
                protection.hash_value = parse_base64(part, "workbookHashValue", &value)?
            },
            b"workbookSaltValue" => {
                protection.salt_value = parse_base64(part, "workbookSaltValue", &value)?
            },
            b"workbookSpinCount" => {
                protection.spin_count = parse_u32(part, "workbookSpinCount", &value)?
            },
            b"workbookPassword" => legacy = Some(value),
            key => protection.extra_attrs.push((utf8(part, key)?, value)),
        }
    }

    if let Some(value) = legacy {
        match u16::from_str_radix(value.trim(), 16) {
            Ok(hash) if protection.algorithm_name.is_empty() => {
                protection.algorithm_name = "XOR".to_string();
                protection.hash_value = hash.to_be_bytes().to_vec();
            },
            Ok(_) => protection
                .extra_attrs
                .push(("workbookPassword".to_string(), value)),
            Err(_) => {
                warn!(part, value = %value, "ignoring malformed workbookPassword");
                protection
                    .extra_attrs
                    .push(("workbookPassword".to_string(), value));
            },
        }
    }

    Ok(protection)
}

fn parse_sheet(part: &str, e: &BytesStart<'_>, rel_prefixes: &[Vec<u8>]) -> Result<SheetEntry> {
    let rel_prefixes = relationship_prefixes(part, e, rel_prefixes)?;
    let mut sheet = SheetEntry {
        name: String::new(),
        sheet_id: 0,
        r_id: String::new(),
        state: None,
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| OoxmlError::decode(part, e))?;
        let value = attr_value(part, &attr)?;
        match attr.key.as_ref() {
            b"name" => sheet.name = value,
            b"sheetId" => sheet.sheet_id = parse_u32(part, "sheetId", &value)?,
            b"state" => sheet.state = Some(value),
            _ if attr.key.local_name().as_ref() == b"id" => {
                let bound = attr.key.prefix().is_some_and(|prefix| {
                    rel_prefixes.iter().any(|p| p.as_slice() == prefix.as_ref())
                });
                if bound {
                    sheet.r_id = value;
                }
            },
            _ => {},
        }
    }
    Ok(sheet)
}

/// Prefixes bound to the office relationships namespace in scope at `e`.
///
/// Starts from the prefixes inherited from the ancestors and applies the
/// `xmlns:*` declarations on `e`, so a prefix rebound to another namespace
/// drops out.
fn relationship_prefixes(
    part: &str,
    e: &BytesStart<'_>,
    inherited: &[Vec<u8>],
) -> Result<Vec<Vec<u8>>> {
    let mut prefixes = inherited.to_vec();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| OoxmlError::decode(part, e))?;
        let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") else {
            continue;
        };
        prefixes.retain(|p| p.as_slice() != prefix);
        if attr_value(part, &attr)? == namespace::OFC_RELATIONSHIPS {
            prefixes.push(prefix.to_vec());
        }
    }
    Ok(prefixes)
}

fn attr_value(part: &str, attr: &Attribute<'_>) -> Result<String> {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .map_err(|e| OoxmlError::decode(part, e))
}

fn utf8(part: &str, bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| OoxmlError::decode(part, e))
}

fn parse_bool(part: &str, name: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(OoxmlError::decode(
            part,
            format!("invalid boolean '{other}' for {name}"),
        )),
    }
}

fn parse_u32(part: &str, name: &str, value: &str) -> Result<u32> {
    atoi_simd::parse::<u32, false, false>(value.trim().as_bytes())
        .map_err(|_| OoxmlError::decode(part, format!("invalid integer '{value}' for {name}")))
}

fn parse_base64(part: &str, name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64_ENGINE
        .decode(value.trim())
        .map_err(|e| OoxmlError::decode(part, format!("invalid base64 for {name}: {e}")))
}
