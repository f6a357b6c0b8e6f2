// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Hash algorithms selectable at construction time.

use core::fmt;

use fastcrypto::hash::{Blake2b256, HashFunction, Keccak256, Sha3_256, Sha256};
use serde::{Deserialize, Serialize};

/// The length of the digests produced by every supported [`HashAlgorithm`].
pub const DIGEST_LEN: usize = 32;

/// The hash algorithm used for signature verification and challenge identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// Keccak-256, as used by Ethereum.
    Keccak256,
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA3-256.
    #[serde(rename = "sha3_256")]
    Sha3_256,
    /// BLAKE2b with a 256-bit output.
    Blake2b256,
}

impl HashAlgorithm {
    /// All supported hash algorithms.
    pub const ALL: [Self; 4] = [
        Self::Keccak256,
        Self::Sha256,
        Self::Sha3_256,
        Self::Blake2b256,
    ];

    /// Hashes `data`.
    pub fn digest(self, data: &[u8]) -> [u8; DIGEST_LEN] {
        self.digest_parts(&[data])
    }

    /// Hashes the concatenation of `parts` without materializing it.
    pub fn digest_parts(self, parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
        match self {
            Self::Keccak256 => hash_parts::<Keccak256>(parts),
            Self::Sha256 => hash_parts::<Sha256>(parts),
            Self::Sha3_256 => hash_parts::<Sha3_256>(parts),
            Self::Blake2b256 => hash_parts::<Blake2b256>(parts),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keccak256 => "keccak256",
            Self::Sha256 => "sha256",
            Self::Sha3_256 => "sha3_256",
            Self::Blake2b256 => "blake2b256",
        };
        f.write_str(name)
    }
}

/// Computes the Keccak-256 digest of the concatenation of `parts`.
///
/// Identities and the re-encryption challenge scalar are defined over Keccak-256 independently
/// of the configured [`HashAlgorithm`].
pub(crate) fn keccak256(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    hash_parts::<Keccak256>(parts)
}

fn hash_parts<H: HashFunction<DIGEST_LEN>>(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = H::default();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().digest
}

#[cfg(test)]
mod tests {
    use arbiter_test_utils::param_test;

    use super::*;

    param_test! {
        digest_of_empty_input_matches_reference: [
            keccak256: (
                HashAlgorithm::Keccak256,
                "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
            ),
            sha256: (
                HashAlgorithm::Sha256,
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            ),
            sha3_256: (
                HashAlgorithm::Sha3_256,
                "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
            ),
            blake2b256: (
                HashAlgorithm::Blake2b256,
                "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
            ),
        ]
    }
    fn digest_of_empty_input_matches_reference(algorithm: HashAlgorithm, expected: &str) {
        assert_eq!(hex::encode(algorithm.digest(b"")), expected);
    }

    #[test]
    fn digest_parts_equals_digest_of_concatenation() {
        for algorithm in HashAlgorithm::ALL {
            assert_eq!(
                algorithm.digest_parts(&[b"re-", b"encryption", b""]),
                algorithm.digest(b"re-encryption"),
                "{algorithm}"
            );
        }
    }

    #[test]
    fn algorithms_produce_distinct_digests() {
        let digests: std::collections::HashSet<_> = HashAlgorithm::ALL
            .iter()
            .map(|algorithm| algorithm.digest(b"capsule"))
            .collect();
        assert_eq!(digests.len(), HashAlgorithm::ALL.len());
    }

    #[test]
    fn serde_names_match_display() -> arbiter_test_utils::Result {
        for algorithm in HashAlgorithm::ALL {
            let encoded = serde_yaml::to_string(&algorithm)?;
            assert_eq!(encoded.trim(), algorithm.to_string());
            assert_eq!(serde_yaml::from_str::<HashAlgorithm>(&encoded)?, algorithm);
        }
        Ok(())
    }
}
