//! Package identity hashing
//!
//! Two identities are tracked for every package:
//!
//! - **identity hash**: `H(manager, source, id)`. Recognizes "the same package"
//!   across independent listing calls and deduplicates queued operations.
//! - **versioned hash**: `H(manager, source, id, version [, new_version])`. Used
//!   for exact-state comparison, e.g. keying the installed-packages cache.
//!
//! Every part is fed to the digest with its byte length in front, so no choice
//! of field contents can make two different tuples hash alike. Hashes are the
//! first 8 bytes of a SHA-256 digest, so they are stable across runs and processes.

use sha2::{Digest, Sha256};

pub type PackageHash = u64;

pub fn identity_hash(manager: &str, source: &str, id: &str) -> PackageHash {
    hash_parts(&[manager, source, id])
}

pub fn versioned_hash(
    manager: &str,
    source: &str,
    id: &str,
    version: &str,
    new_version: Option<&str>,
) -> PackageHash {
    match new_version {
        Some(new) => hash_parts(&[manager, source, id, version, new]),
        None => hash_parts(&[manager, source, id, version]),
    }
}

fn hash_parts(parts: &[&str]) -> PackageHash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }

    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

#[cfg(test)]
mod tests;
