//! Workbook protection (`workbookProtection`).
//!
//! Protection is recorded in the workbook part for spreadsheet applications
//! to honour; nothing here restricts what the API itself may do.
//!
//! Password verifiers follow the ISO/IEC 29500 scheme: a salted hash iterated
//! [`WORKBOOK_PROTECTION_SPIN_COUNT`] times. The legacy `XOR` verifier is
//! accepted for compatibility with files written by old Excel versions.

use crate::ooxml::crypto::{HashAlgorithm, derive_password_hash};
use crate::ooxml::error::{OoxmlError, Result};
use tracing::debug;

use super::descriptor::WorkbookProtection;
use super::workbook::Workbook;

/// Hash iterations used when setting a workbook password.
pub const WORKBOOK_PROTECTION_SPIN_COUNT: u32 = 100_000;

/// Algorithm used when [`WorkbookProtectionOptions::algorithm_name`] is empty.
pub const DEFAULT_PROTECTION_ALGORITHM: &str = "SHA-512";

/// Options for [`Workbook::protect_workbook`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookProtectionOptions {
    /// One of `XOR`, `MD4`, `MD5`, `SHA-1`, `SHA-256`, `SHA-384`, `SHA-512`;
    /// empty selects [`DEFAULT_PROTECTION_ALGORITHM`]
    pub algorithm_name: String,
    /// Empty leaves any stored password untouched
    pub password: String,
    pub lock_structure: bool,
    pub lock_windows: bool,
}

impl Workbook {
    /// Protect the workbook structure and/or windows.
    ///
    /// The lock flags are always taken from `opts` (`None` clears both).
    /// With a non-empty password a fresh salt is generated and the verifier
    /// replaces whatever was stored before; with an empty password the stored
    /// verifier is kept, so locks can be toggled without re-keying.
    ///
    /// Fails with [`OoxmlError::UnsupportedAlgorithm`] or
    /// [`OoxmlError::InvalidPasswordLength`] before anything is changed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xlbook::ooxml::xlsx::{Workbook, WorkbookProtectionOptions};
    ///
    /// let mut workbook = Workbook::new()?;
    /// workbook.protect_workbook(Some(&WorkbookProtectionOptions {
    ///     algorithm_name: "SHA-256".into(),
    ///     password: "secret".into(),
    ///     lock_structure: true,
    ///     ..Default::default()
    /// }))?;
    /// workbook.unprotect_workbook(Some("secret"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn protect_workbook(&mut self, opts: Option<&WorkbookProtectionOptions>) -> Result<()> {
        let default_opts = WorkbookProtectionOptions::default();
        let opts = opts.unwrap_or(&default_opts);
        let wb = self.workbook_reader()?;

        let key = if opts.password.is_empty() {
            None
        } else {
            let name = if opts.algorithm_name.is_empty() {
                DEFAULT_PROTECTION_ALGORITHM
            } else {
                opts.algorithm_name.as_str()
            };
            let algorithm: HashAlgorithm = name.parse()?;
            let derived = derive_password_hash(
                &opts.password,
                algorithm,
                None,
                WORKBOOK_PROTECTION_SPIN_COUNT,
            )?;
            Some((algorithm, derived))
        };

        let protection = wb
            .workbook_protection
            .get_or_insert_with(WorkbookProtection::default);
        protection.lock_structure = opts.lock_structure;
        protection.lock_windows = opts.lock_windows;

        if let Some((algorithm, derived)) = key {
            protection.algorithm_name = algorithm.name().to_string();
            protection.hash_value = derived.hash;
            protection.salt_value = derived.salt;
            // The legacy verifier carries no iteration count.
            protection.spin_count = match algorithm {
                HashAlgorithm::Xor => 0,
                _ => WORKBOOK_PROTECTION_SPIN_COUNT,
            };
            protection
                .extra_attrs
                .retain(|(name, _)| name != "workbookPassword");
            debug!(%algorithm, "workbook password set");
        }

        Ok(())
    }

    /// Remove workbook protection.
    ///
    /// Without a password the protection record is dropped unconditionally.
    /// This administrative override never verifies anything, so callers that
    /// need verification must pass the password.
    ///
    /// With a password the workbook must be protected
    /// ([`OoxmlError::NotProtected`] otherwise). If the record holds a
    /// verifier, the password is hashed with the stored algorithm, salt and
    /// spin count and must match ([`OoxmlError::WrongPassword`] otherwise).
    /// A record without a verifier accepts any password.
    pub fn unprotect_workbook(&mut self, password: Option<&str>) -> Result<()> {
        let wb = self.workbook_reader()?;

        if let Some(password) = password {
            let protection = wb
                .workbook_protection
                .as_ref()
                .ok_or(OoxmlError::NotProtected)?;

            if !protection.algorithm_name.is_empty() {
                let algorithm: HashAlgorithm = protection.algorithm_name.parse()?;
                let derived = derive_password_hash(
                    password,
                    algorithm,
                    Some(protection.salt_value.as_slice()),
                    protection.spin_count,
                )?;
                if derived.hash != protection.hash_value {
                    return Err(OoxmlError::WrongPassword);
                }
            }
        }

        if wb.workbook_protection.take().is_some() {
            debug!(verified = password.is_some(), "workbook protection removed");
        }
        Ok(())
    }
}
