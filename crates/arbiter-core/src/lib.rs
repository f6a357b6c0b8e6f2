// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Core functionality for adjudicating misbehavior challenges against re-encryption workers.
//!
//! Anyone holding evidence that a worker produced an incorrect capsule fragment can submit it to
//! an [`Adjudicator`]. The adjudicator checks the chain of signatures binding requester, worker,
//! and the disputed data, decodes the capsule and fragment, verifies the re-encryption proof, and
//! slashes the worker's stake through the [`escrow::StakingEscrow`] collaborator if the fragment is
//! incorrect. Each (capsule, fragment) pair is adjudicated at most once.

use core::fmt;

use serde::{Deserialize, Serialize};

pub mod adjudicator;
pub mod config;
pub mod correctness;
pub mod decode;
pub mod escrow;
pub mod hash;
pub mod keys;
pub mod ledger;
pub mod metrics;
pub mod signature_chain;

mod errors;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adjudicator::{Adjudicator, ChallengeEvidence};
pub use errors::ChallengeError;
pub use hash::HashAlgorithm;
pub use keys::{Address, WorkerIdentity};
pub use ledger::Verdict;

/// An amount of stake, in the smallest unit of the staking escrow.
pub type StakeAmount = u64;

/// The identifier of a challenge, `Hash(capsule ‖ cfrag)` under the configured hash algorithm.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub [u8; Self::LENGTH]);

impl ChallengeId {
    /// The length of a challenge ID in bytes.
    pub const LENGTH: usize = hash::DIGEST_LEN;

    /// Computes the challenge ID for the raw capsule and fragment bytes.
    pub fn compute(hash_algorithm: HashAlgorithm, capsule: &[u8], cfrag: &[u8]) -> Self {
        Self(hash_algorithm.digest_parts(&[capsule, cfrag]))
    }

    /// Returns the challenge ID as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ChallengeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengeId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_id_is_hash_of_concatenation() {
        // Capsules have a fixed size, so the boundary needs no separator.
        let a = ChallengeId::compute(HashAlgorithm::Sha256, b"abc", b"def");
        let b = ChallengeId::compute(HashAlgorithm::Sha256, b"abcd", b"ef");
        assert_eq!(a, b);
        assert_eq!(a.0, HashAlgorithm::Sha256.digest(b"abcdef"));
    }

    #[test]
    fn challenge_id_depends_on_hash_algorithm() {
        let sha = ChallengeId::compute(HashAlgorithm::Sha256, b"capsule", b"cfrag");
        let keccak = ChallengeId::compute(HashAlgorithm::Keccak256, b"capsule", b"cfrag");
        assert_ne!(sha, keccak);
    }

    #[test]
    fn challenge_id_displays_as_hex() {
        let id = ChallengeId([0xab; ChallengeId::LENGTH]);
        assert_eq!(id.to_string(), format!("0x{}", "ab".repeat(32)));
    }
}
