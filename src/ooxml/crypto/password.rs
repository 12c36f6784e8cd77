use crate::ooxml::error::{OoxmlError, Result};
use rand::TryRng;
use rand::rngs::SysRng as OsRng;
use sha2::Digest;
use std::fmt;
use std::str::FromStr;

use super::password_to_utf16le;

/// Longest password accepted by Office protection dialogs, in UTF-16 code units.
pub const MAX_PASSWORD_LENGTH: usize = 255;

/// Size of freshly generated salts, matching what Office writes.
pub const SALT_LENGTH: usize = 16;

/// Legacy passwords only contribute their first 15 characters.
const LEGACY_PASSWORD_CHARS: usize = 15;

/// Hash algorithms accepted in `*AlgorithmName` protection attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// Legacy 16-bit XOR verifier (no salt, no spin)
    Xor,
    Md4,
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// The name written to XML, e.g. `SHA-512`.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Xor => "XOR",
            HashAlgorithm::Md4 => "MD4",
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = OoxmlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "XOR" => Ok(HashAlgorithm::Xor),
            "MD4" => Ok(HashAlgorithm::Md4),
            "MD5" => Ok(HashAlgorithm::Md5),
            "SHA-1" => Ok(HashAlgorithm::Sha1),
            "SHA-256" => Ok(HashAlgorithm::Sha256),
            "SHA-384" => Ok(HashAlgorithm::Sha384),
            "SHA-512" => Ok(HashAlgorithm::Sha512),
            other => Err(OoxmlError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a password derivation: the verifier and the salt it was made with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Derive the password verifier stored in protection records.
///
/// For the ISO algorithms the derivation is
/// `H0 = H(salt || UTF-16LE(password))` followed by `spin_count` rounds of
/// `Hn = H(Hn-1 || LE32(n - 1))`. When `salt` is `None` a fresh random salt
/// of [`SALT_LENGTH`] bytes is generated.
///
/// [`HashAlgorithm::Xor`] ignores salt and spin count and yields the legacy
/// 16-bit verifier as two big-endian bytes with an empty salt.
pub fn derive_password_hash(
    password: &str,
    algorithm: HashAlgorithm,
    salt: Option<&[u8]>,
    spin_count: u32,
) -> Result<PasswordHash> {
    let units = password.encode_utf16().count();
    if units == 0 || units > MAX_PASSWORD_LENGTH {
        return Err(OoxmlError::InvalidPasswordLength {
            max: MAX_PASSWORD_LENGTH,
        });
    }

    let digest: fn(&[u8], &[u8], u32) -> Vec<u8> = match algorithm {
        HashAlgorithm::Xor => {
            return Ok(PasswordHash {
                hash: legacy_password_hash(password).to_be_bytes().to_vec(),
                salt: Vec::new(),
            });
        },
        HashAlgorithm::Md4 => spin::<md4::Md4>,
        HashAlgorithm::Md5 => spin::<md5::Md5>,
        HashAlgorithm::Sha1 => spin::<sha1::Sha1>,
        HashAlgorithm::Sha256 => spin::<sha2::Sha256>,
        HashAlgorithm::Sha384 => spin::<sha2::Sha384>,
        HashAlgorithm::Sha512 => spin::<sha2::Sha512>,
    };

    let salt = match salt {
        Some(salt) => salt.to_vec(),
        None => generate_salt()?,
    };
    let hash = digest(&salt, &password_to_utf16le(password), spin_count);

    Ok(PasswordHash { hash, salt })
}

/// Excel's legacy 16-bit password verifier.
///
/// Not a cryptographic hash: it only exists so files written by old Excel
/// versions can still be verified.
pub fn legacy_password_hash(password: &str) -> u16 {
    let mut hash: u32 = 0;
    let mut len: u32 = 0;

    for (i, ch) in password
        .encode_utf16()
        .take(LEGACY_PASSWORD_CHARS)
        .enumerate()
    {
        let value = (ch as u32) << (i + 1);
        let rotated = value >> 15;
        hash ^= (value & 0x7fff) | rotated;
        len += 1;
    }

    hash ^= len;
    hash ^= 0xCE4B;
    hash as u16
}

fn spin<D: Digest>(salt: &[u8], password: &[u8], spin_count: u32) -> Vec<u8> {
    // Initial hash: H[init] = H(salt || password)
    let mut hasher = D::new();
    hasher.update(salt);
    hasher.update(password);
    let mut hash = hasher.finalize().to_vec();

    // Iterative hashing: H[n] = H(H[n-1] || count_le_u32), for spinCount cycles
    for i in 0..spin_count {
        let mut hasher = D::new();
        hasher.update(&hash);
        hasher.update(i.to_le_bytes());
        hash = hasher.finalize().to_vec();
    }

    hash
}

fn generate_salt() -> Result<Vec<u8>> {
    let mut salt = vec![0u8; SALT_LENGTH];
    let mut rng = OsRng;
    rng.try_fill_bytes(&mut salt)
        .map_err(|e| OoxmlError::Other(format!("failed to generate password salt: {e}")))?;
    Ok(salt)
}
