use std::io::{Cursor, Write};

use proptest::prelude::*;
use tempfile::tempdir;
use xlbook::ooxml::opc::OpcPackage;
use xlbook::ooxml::xlsx::paths::workbook_rels_path;
use xlbook::{OoxmlError, Workbook, WorkbookPropsOptions, WorkbookProtectionOptions};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="x15" xmlns:x15="http://schemas.microsoft.com/office/spreadsheetml/2010/11/main"><fileVersion appName="xl" lastEdited="7"/><workbookPr filterPrivacy="1" defaultThemeVersion="166925"/><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><mc:Choice Requires="x15"><x15ac:absPath xmlns:x15ac="http://schemas.microsoft.com/office/spreadsheetml/2010/11/ac" url="C:\Books\"/></mc:Choice></mc:AlternateContent><bookViews><workbookView activeTab="0"/></bookViews><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets><definedNames><definedName name="Total">Sheet1!$A$1</definedName></definedNames><calcPr calcId="191029"/></workbook>"#;

fn build_xlsx(workbook_xml: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("xl/workbook.xml", workbook_xml),
    ] {
        writer.start_file(name, options).expect("start zip entry");
        writer.write_all(body.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

#[test]
fn flush_and_reload_round_trip() {
    let mut workbook = Workbook::from_bytes(&build_xlsx(WORKBOOK_XML)).expect("open workbook");
    workbook
        .set_workbook_props(Some(&WorkbookPropsOptions {
            date1904: Some(true),
            code_name: Some("Ledger".into()),
            ..Default::default()
        }))
        .expect("set props");
    workbook
        .protect_workbook(Some(&WorkbookProtectionOptions {
            algorithm_name: "SHA-256".into(),
            password: "secret".into(),
            lock_structure: true,
            lock_windows: true,
        }))
        .expect("protect");
    workbook.set_workbook("Sheet2", 2, 3).expect("register sheet");

    let expected = workbook.workbook_reader().expect("load").clone();
    let bytes = workbook.to_bytes().expect("serialize");

    let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
    let reloaded = reopened.workbook_reader().expect("reload");
    assert_eq!(reloaded.workbook_pr, expected.workbook_pr);
    assert_eq!(reloaded.workbook_protection, expected.workbook_protection);
    assert_eq!(reloaded.sheets, expected.sheets);
    assert_eq!(reloaded.preserved, expected.preserved);
    assert!(expected.decoded_alternate_content.is_some());
    assert_eq!(
        reloaded.decoded_alternate_content,
        expected.decoded_alternate_content
    );

    reopened
        .unprotect_workbook(Some("secret"))
        .expect("unprotect with the original password");
}

#[test]
fn flushed_part_keeps_package_conventions() {
    let mut workbook = Workbook::from_bytes(&build_xlsx(WORKBOOK_XML)).expect("open workbook");
    workbook.set_workbook("Sheet2", 2, 3).expect("register sheet");
    workbook.workbook_writer().expect("flush");

    let xml = std::str::from_utf8(workbook.package().read_part("xl/workbook.xml"))
        .expect("utf-8 part");
    assert!(xml.contains(r#"mc:Ignorable="x15""#));
    assert!(xml.contains(r#"<sheet name="Sheet2" sheetId="2" r:id="rId3"/>"#));
    assert!(xml.contains(r#"<calcPr calcId="191029"/>"#));
    assert!(xml.contains(r#"<definedName name="Total">Sheet1!$A$1</definedName>"#));
    assert!(xml.contains(r#"defaultThemeVersion="166925""#));
}

#[test]
fn save_and_open_from_disk() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("book.xlsx");

    let mut workbook = Workbook::new().expect("new workbook");
    workbook.set_workbook("Data", 1, 1).expect("register sheet");
    workbook
        .set_workbook_props(Some(&WorkbookPropsOptions {
            filter_privacy: Some(true),
            ..Default::default()
        }))
        .expect("set props");
    workbook.save(&path).expect("save workbook");

    let mut reopened = Workbook::open(&path).expect("open workbook");
    assert_eq!(reopened.workbook_path().expect("path"), "xl/workbook.xml");
    let sheets = reopened.sheet_list().expect("sheets");
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name, "Data");
    assert_eq!(sheets[0].r_id, "rId1");
    assert_eq!(
        reopened.get_workbook_props().expect("props").filter_privacy,
        Some(true)
    );
}

#[test]
fn save_to_writer_matches_to_bytes() {
    let mut workbook = Workbook::new().expect("new workbook");
    workbook.set_workbook("Sheet1", 1, 1).expect("register sheet");

    let mut out = Vec::new();
    workbook.save_to(&mut out).expect("save to writer");
    let package = OpcPackage::from_bytes(&out).expect("valid zip");
    assert!(package.contains_part("[Content_Types].xml"));
    assert!(package.contains_part("_rels/.rels"));
    assert!(package.has_office_document().expect("package rels"));
}

#[test]
fn open_missing_file() {
    let dir = tempdir().expect("create temp dir");
    let err = Workbook::open(dir.path().join("absent.xlsx")).unwrap_err();
    assert!(matches!(err, OoxmlError::Opc(_)));
}

#[test]
fn malformed_workbook_part_is_a_decode_error() {
    let mut workbook =
        Workbook::from_bytes(&build_xlsx("<workbook><sheets>")).expect("open package");
    let err = workbook.get_workbook_props().unwrap_err();
    assert!(matches!(err, OoxmlError::Decode { ref part, .. } if part == "xl/workbook.xml"));

    // Nothing was cached, so saving leaves the part as it was.
    let bytes = workbook.to_bytes().expect("serialize");
    let package = OpcPackage::from_bytes(&bytes).expect("reopen");
    assert_eq!(package.read_part("xl/workbook.xml"), b"<workbook><sheets>");
}

#[test]
fn rels_path_conventions() {
    let workbook = Workbook::from_package(OpcPackage::new());
    assert_eq!(workbook.workbook_path().expect("path"), "");
    assert_eq!(workbook_rels_path("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
    assert_eq!(workbook_rels_path("workbook.xml"), "_rels/workbook.xml.rels");
}

fn tri_state_bool() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![Just(None), any::<bool>().prop_map(Some)]
}

fn tri_state_string() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[A-Za-z_]{0,12}".prop_map(Some)]
}

fn props_options() -> impl Strategy<Value = WorkbookPropsOptions> {
    (tri_state_bool(), tri_state_bool(), tri_state_string()).prop_map(
        |(date1904, filter_privacy, code_name)| WorkbookPropsOptions {
            date1904,
            filter_privacy,
            code_name,
        },
    )
}

proptest! {
    #[test]
    fn props_update_only_given_fields(first in props_options(), second in props_options()) {
        let mut workbook = Workbook::new().expect("new workbook");
        workbook.set_workbook_props(Some(&first)).expect("first update");
        workbook.set_workbook_props(Some(&second)).expect("second update");

        let merged = workbook.get_workbook_props().expect("props");
        prop_assert_eq!(
            merged.date1904,
            Some(second.date1904.or(first.date1904).unwrap_or(false))
        );
        prop_assert_eq!(
            merged.filter_privacy,
            Some(second.filter_privacy.or(first.filter_privacy).unwrap_or(false))
        );
        prop_assert_eq!(
            merged.code_name.clone(),
            Some(second.code_name.clone().or(first.code_name.clone()).unwrap_or_default())
        );

        // What was set survives a flush and reload.
        let bytes = workbook.to_bytes().expect("serialize");
        let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
        prop_assert_eq!(reopened.get_workbook_props().expect("props"), merged);
    }
}
