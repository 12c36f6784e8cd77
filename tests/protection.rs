use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use md5::{Digest, Md5};
use tracing_subscriber::EnvFilter;
use xlbook::ooxml::xlsx::WORKBOOK_PROTECTION_SPIN_COUNT;
use xlbook::{OoxmlError, Workbook, WorkbookProtectionOptions};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn protect(workbook: &mut Workbook, algorithm_name: &str, password: &str) {
    workbook
        .protect_workbook(Some(&WorkbookProtectionOptions {
            algorithm_name: algorithm_name.into(),
            password: password.into(),
            lock_structure: true,
            lock_windows: false,
        }))
        .expect("protect workbook");
}

/// Hash computed without going through the crate's derivation code.
fn reference_md5(password: &str, salt: &[u8], spin_count: u32) -> Vec<u8> {
    let utf16: Vec<u8> = password
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();

    let mut hash = Md5::new().chain_update(salt).chain_update(&utf16).finalize().to_vec();
    for round in 0..spin_count {
        hash = Md5::new()
            .chain_update(&hash)
            .chain_update(round.to_le_bytes())
            .finalize()
            .to_vec();
    }
    hash
}

#[test]
fn md5_protection_matches_independent_derivation() {
    init_tracing();
    let mut workbook = Workbook::new().expect("new workbook");
    protect(&mut workbook, "MD5", "pw1");

    let bytes = workbook.to_bytes().expect("serialize");
    let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
    let record = reopened
        .workbook_reader()
        .expect("load")
        .workbook_protection
        .clone()
        .expect("protection record");

    assert_eq!(record.algorithm_name, "MD5");
    assert_eq!(record.spin_count, WORKBOOK_PROTECTION_SPIN_COUNT);
    assert_eq!(record.salt_value.len(), 16);
    assert_eq!(
        record.hash_value,
        reference_md5("pw1", &record.salt_value, record.spin_count)
    );

    reopened.unprotect_workbook(Some("pw1")).expect("verify pw1");
}

#[test]
fn md5_known_answer_from_stored_attributes() {
    let xml = format!(
        concat!(
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<workbookProtection workbookAlgorithmName="MD5" workbookHashValue="{}" "#,
            r#"workbookSaltValue="AAECAwQFBgcICQoLDA0ODw==" workbookSpinCount="100000" lockStructure="1"/>"#,
            "</workbook>"
        ),
        "xbc54ZQbeC/SAUP9KKGTdQ=="
    );
    let salt = BASE64_ENGINE
        .decode("AAECAwQFBgcICQoLDA0ODw==")
        .expect("valid base64");
    assert_eq!(
        BASE64_ENGINE.encode(reference_md5("pw1", &salt, 100_000)),
        "xbc54ZQbeC/SAUP9KKGTdQ=="
    );

    let mut package = xlbook::ooxml::OpcPackage::new();
    package.write_part(
        "_rels/.rels",
        br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_vec(),
    );
    package.write_part("xl/workbook.xml", xml.into_bytes());
    let mut workbook = Workbook::from_package(package);

    assert!(matches!(
        workbook.unprotect_workbook(Some("pw2")),
        Err(OoxmlError::WrongPassword)
    ));
    workbook.unprotect_workbook(Some("pw1")).expect("verify pw1");
}

#[test]
fn nonstandard_xor_record_keeps_its_hash_across_save() {
    init_tracing();
    let mut package = xlbook::ooxml::OpcPackage::new();
    package.write_part(
        "_rels/.rels",
        br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_vec(),
    );
    package.write_part(
        "xl/workbook.xml",
        br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><workbookProtection workbookAlgorithmName="XOR" workbookHashValue="AAECAw==" lockStructure="1"/></workbook>"#.to_vec(),
    );
    let mut workbook = Workbook::from_package(package);
    let before = workbook
        .workbook_reader()
        .expect("load")
        .workbook_protection
        .clone();

    let bytes = workbook.to_bytes().expect("serialize");
    let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
    let after = reopened
        .workbook_reader()
        .expect("load")
        .workbook_protection
        .clone();
    assert_eq!(after, before);

    assert!(matches!(
        reopened.unprotect_workbook(Some("anything")),
        Err(OoxmlError::WrongPassword)
    ));
}

#[test]
fn wrong_password_keeps_record_across_save() {
    let mut workbook = Workbook::new().expect("new workbook");
    protect(&mut workbook, "SHA-512", "correct horse");

    let err = workbook.unprotect_workbook(Some("battery staple")).unwrap_err();
    assert!(matches!(err, OoxmlError::WrongPassword));

    let bytes = workbook.to_bytes().expect("serialize");
    let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
    assert!(
        reopened
            .workbook_reader()
            .expect("load")
            .workbook_protection
            .is_some()
    );
    reopened
        .unprotect_workbook(Some("correct horse"))
        .expect("verify");
    assert!(
        reopened
            .workbook_reader()
            .expect("load")
            .workbook_protection
            .is_none()
    );
}

#[test]
fn every_algorithm_verifies_after_reload() {
    for algorithm in ["XOR", "MD4", "MD5", "SHA-1", "SHA-256", "SHA-384", "SHA-512"] {
        let mut workbook = Workbook::new().expect("new workbook");
        protect(&mut workbook, algorithm, "Pa55word");

        let bytes = workbook.to_bytes().expect("serialize");
        let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
        assert!(
            matches!(
                reopened.unprotect_workbook(Some("pa55word")),
                Err(OoxmlError::WrongPassword)
            ),
            "{algorithm}"
        );
        reopened
            .unprotect_workbook(Some("Pa55word"))
            .unwrap_or_else(|e| panic!("{algorithm}: {e}"));
    }
}

#[test]
fn override_unprotect_clears_hashed_record() {
    let mut workbook = Workbook::new().expect("new workbook");
    protect(&mut workbook, "SHA-1", "secret");
    workbook.unprotect_workbook(None).expect("override");

    let bytes = workbook.to_bytes().expect("serialize");
    let mut reopened = Workbook::from_bytes(&bytes).expect("reopen");
    assert!(matches!(
        reopened.unprotect_workbook(Some("secret")),
        Err(OoxmlError::NotProtected)
    ));
}

#[test]
fn password_length_is_checked_before_mutation() {
    let mut workbook = Workbook::new().expect("new workbook");
    let err = workbook
        .protect_workbook(Some(&WorkbookProtectionOptions {
            password: "x".repeat(256),
            lock_structure: true,
            ..Default::default()
        }))
        .unwrap_err();
    assert!(matches!(err, OoxmlError::InvalidPasswordLength { max: 255 }));
    assert!(
        workbook
            .workbook_reader()
            .expect("load")
            .workbook_protection
            .is_none()
    );
}
