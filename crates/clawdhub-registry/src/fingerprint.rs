//! Content-addressed bundle fingerprints.
//!
//! A bundle fingerprint identifies the contents of a version irrespective
//! of metadata: it is the SHA-256 of the newline-joined, path-sorted
//! `path:sha256` lines of the bundle's files. The CLI computes the same
//! fingerprint locally that the server computes at publish time, which is
//! what makes `sync` idempotent.

use sha2::{Digest, Sha256};

/// Lowercase 64-hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the bundle fingerprint over `(path, sha256)` pairs.
///
/// The result depends only on the multiset of pairs: entries are sorted by
/// path before hashing, so enumeration order never matters.
pub fn bundle_fingerprint<P, H>(files: &[(P, H)]) -> String
where
    P: AsRef<str>,
    H: AsRef<str>,
{
    let mut lines: Vec<String> = files
        .iter()
        .map(|(path, sha)| format!("{}:{}", path.as_ref(), sha.as_ref()))
        .collect();
    lines.sort();
    sha256_hex(lines.join("\n").as_bytes())
}

/// Whether `s` is a well-formed lowercase 64-hex digest.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
