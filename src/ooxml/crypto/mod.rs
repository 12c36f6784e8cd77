//! Password hashing used by OOXML document protection.
//!
//! Workbook and sheet protection records store a password verifier rather than
//! the password itself. Two families exist: the legacy 16-bit XOR hash written
//! by Excel 97-2003, and the ISO/IEC 29500 salted, iterated hash selected by
//! algorithm name.
mod password;

pub use password::{
    HashAlgorithm, MAX_PASSWORD_LENGTH, PasswordHash, SALT_LENGTH, derive_password_hash,
    legacy_password_hash,
};

/// Encode a password the way OOXML hashes consume it (UTF-16LE, no BOM).
fn password_to_utf16le(password: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(password.len() * 2);
    for ch in password.encode_utf16() {
        buf.extend_from_slice(&ch.to_le_bytes());
    }
    buf
}
