// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Verification of the signatures binding requester, worker, and the disputed artifacts.
//!
//! A chain consists of four links, checked in order:
//!
//! 1. the requester signed the capsule;
//! 2. the worker countersigned the requester's capsule signature;
//! 3. the worker signed the capsule fragment;
//! 4. the worker's staking account signed the worker's public key.
//!
//! The first three links must recover to the submitted keys. The fourth yields the identity whose
//! stake backs the worker.

use core::fmt;

use crate::{
    hash::HashAlgorithm,
    keys::{CanonicalPublicKey, RecoverableSignature, SignatureError, WorkerIdentity},
};

/// A link of the signature chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLink {
    /// The requester's signature over the capsule.
    RequesterCapsule,
    /// The worker's signature over the requester's capsule signature.
    WorkerCountersignature,
    /// The worker's signature over the capsule fragment.
    WorkerCFrag,
    /// The staking account's signature over the worker's public key.
    WorkerAttestation,
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::RequesterCapsule => "requester's capsule signature",
            Self::WorkerCountersignature => "worker's countersignature",
            Self::WorkerCFrag => "worker's fragment signature",
            Self::WorkerAttestation => "worker's key attestation",
        };
        f.write_str(description)
    }
}

/// Error returned when a link of the signature chain is broken.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SignatureChainError {
    /// The signature cannot be parsed or no key can be recovered from it.
    #[error("the {link} is malformed")]
    MalformedSignature {
        /// The broken link.
        link: ChainLink,
        /// The parsing or recovery failure.
        #[source]
        source: SignatureError,
    },
    /// The signature was produced by a key other than the expected one.
    #[error("the {link} was not produced by the expected key")]
    SignerMismatch {
        /// The broken link.
        link: ChainLink,
    },
}

impl SignatureChainError {
    /// Returns the broken link.
    pub fn link(&self) -> ChainLink {
        match self {
            Self::MalformedSignature { link, .. } | Self::SignerMismatch { link } => *link,
        }
    }
}

/// The raw artifacts and signatures of a chain, borrowed from the submitted evidence.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct SignatureChain<'a> {
    pub capsule: &'a [u8],
    pub cfrag: &'a [u8],
    pub capsule_signature_by_requester: &'a [u8],
    pub capsule_signature_by_requester_and_worker: &'a [u8],
    pub cfrag_signature_by_worker: &'a [u8],
    pub requester_key: &'a CanonicalPublicKey,
    pub worker_key: &'a CanonicalPublicKey,
    pub worker_key_attestation: &'a [u8],
}

/// Verifies signature chains, hashing every signed message with a fixed algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureChainVerifier {
    hash_algorithm: HashAlgorithm,
}

impl SignatureChainVerifier {
    /// Creates a verifier using `hash_algorithm` for all signed messages.
    pub fn new(hash_algorithm: HashAlgorithm) -> Self {
        Self { hash_algorithm }
    }

    /// Verifies all four links and returns the identity recovered from the key attestation.
    pub fn verify_chain(
        &self,
        chain: &SignatureChain<'_>,
    ) -> Result<WorkerIdentity, SignatureChainError> {
        self.verify_link(
            ChainLink::RequesterCapsule,
            chain.capsule,
            chain.capsule_signature_by_requester,
            chain.requester_key,
        )?;
        // The worker signs the requester's signature bytes, not the capsule.
        self.verify_link(
            ChainLink::WorkerCountersignature,
            chain.capsule_signature_by_requester,
            chain.capsule_signature_by_requester_and_worker,
            chain.worker_key,
        )?;
        self.verify_link(
            ChainLink::WorkerCFrag,
            chain.cfrag,
            chain.cfrag_signature_by_worker,
            chain.worker_key,
        )?;

        let staker = self.recover(
            ChainLink::WorkerAttestation,
            chain.worker_key.as_bytes(),
            chain.worker_key_attestation,
        )?;
        Ok(staker.address())
    }

    fn verify_link(
        &self,
        link: ChainLink,
        message: &[u8],
        signature: &[u8],
        expected_signer: &CanonicalPublicKey,
    ) -> Result<(), SignatureChainError> {
        if self.recover(link, message, signature)? == *expected_signer {
            Ok(())
        } else {
            Err(SignatureChainError::SignerMismatch { link })
        }
    }

    fn recover(
        &self,
        link: ChainLink,
        message: &[u8],
        signature: &[u8],
    ) -> Result<CanonicalPublicKey, SignatureChainError> {
        RecoverableSignature::from_bytes(signature)
            .and_then(|signature| signature.recover(&self.hash_algorithm.digest(message)))
            .map_err(|source| SignatureChainError::MalformedSignature { link, source })
    }
}

#[cfg(test)]
mod tests {
    use arbiter_test_utils::param_test;

    use super::*;
    use crate::{
        adjudicator::ChallengeEvidence,
        test_utils::{self, Party, ReEncryptionFixture},
    };

    struct Setup {
        requester: Party,
        worker: Party,
        staker: Party,
        evidence: ChallengeEvidence,
    }

    fn setup(hash_algorithm: HashAlgorithm) -> Setup {
        let requester = test_utils::party(1);
        let worker = test_utils::party(2);
        let staker = test_utils::party(3);
        let evidence = test_utils::signed_evidence(
            hash_algorithm,
            &requester,
            &worker,
            &staker,
            &ReEncryptionFixture::incorrect(4),
        );
        Setup {
            requester,
            worker,
            staker,
            evidence,
        }
    }

    fn verify(
        hash_algorithm: HashAlgorithm,
        setup: &Setup,
    ) -> Result<WorkerIdentity, SignatureChainError> {
        let requester_key = setup.requester.canonical_public_key();
        let worker_key = setup.worker.canonical_public_key();
        SignatureChainVerifier::new(hash_algorithm)
            .verify_chain(&setup.evidence.signature_chain(&requester_key, &worker_key))
    }

    #[test]
    fn valid_chain_recovers_staker_for_every_hash_algorithm() -> arbiter_test_utils::Result {
        for hash_algorithm in HashAlgorithm::ALL {
            let setup = setup(hash_algorithm);
            assert_eq!(verify(hash_algorithm, &setup)?, setup.staker.address());
        }
        Ok(())
    }

    #[test]
    fn chain_signed_under_another_hash_algorithm_is_rejected() {
        let setup = setup(HashAlgorithm::Keccak256);
        assert_eq!(
            verify(HashAlgorithm::Sha256, &setup),
            Err(SignatureChainError::SignerMismatch {
                link: ChainLink::RequesterCapsule
            })
        );
    }

    param_test! {
        detects_signature_by_wrong_party: [
            requester_capsule: (ChainLink::RequesterCapsule),
            worker_countersignature: (ChainLink::WorkerCountersignature),
            worker_cfrag: (ChainLink::WorkerCFrag),
        ]
    }
    fn detects_signature_by_wrong_party(link: ChainLink) {
        let hash_algorithm = HashAlgorithm::Sha256;
        let mut setup = setup(hash_algorithm);
        let intruder = test_utils::party(99);
        let evidence = &mut setup.evidence;
        match link {
            ChainLink::RequesterCapsule => {
                evidence.capsule_signature_by_requester =
                    intruder.sign(hash_algorithm, &evidence.capsule);
                // Keep the countersignature valid so that only the first link is broken.
                evidence.capsule_signature_by_requester_and_worker = setup
                    .worker
                    .sign(hash_algorithm, &evidence.capsule_signature_by_requester);
            }
            ChainLink::WorkerCountersignature => {
                evidence.capsule_signature_by_requester_and_worker =
                    intruder.sign(hash_algorithm, &evidence.capsule_signature_by_requester);
            }
            ChainLink::WorkerCFrag => {
                evidence.cfrag_signature_by_worker = intruder.sign(hash_algorithm, &evidence.cfrag);
            }
            ChainLink::WorkerAttestation => unreachable!("the attestation recovers any signer"),
        }

        assert_eq!(
            verify(hash_algorithm, &setup),
            Err(SignatureChainError::SignerMismatch { link })
        );
    }

    #[test]
    fn countersignature_over_capsule_instead_of_signature_is_rejected() {
        let hash_algorithm = HashAlgorithm::Sha256;
        let mut setup = setup(hash_algorithm);
        setup.evidence.capsule_signature_by_requester_and_worker = setup
            .worker
            .sign(hash_algorithm, &setup.evidence.capsule);

        assert_eq!(
            verify(hash_algorithm, &setup),
            Err(SignatureChainError::SignerMismatch {
                link: ChainLink::WorkerCountersignature
            })
        );
    }

    #[test]
    fn attestation_of_another_key_yields_another_identity() -> arbiter_test_utils::Result {
        let hash_algorithm = HashAlgorithm::Sha256;
        let mut setup = setup(hash_algorithm);
        setup.evidence.worker_key_attestation = setup.staker.sign(
            hash_algorithm,
            setup.requester.canonical_public_key().as_bytes(),
        );

        assert_ne!(verify(hash_algorithm, &setup)?, setup.staker.address());
        Ok(())
    }

    param_test! {
        reports_malformed_signatures: [
            requester_capsule: (ChainLink::RequesterCapsule),
            worker_countersignature: (ChainLink::WorkerCountersignature),
            worker_cfrag: (ChainLink::WorkerCFrag),
            worker_attestation: (ChainLink::WorkerAttestation),
        ]
    }
    fn reports_malformed_signatures(link: ChainLink) {
        let hash_algorithm = HashAlgorithm::Sha256;
        let mut setup = setup(hash_algorithm);
        let evidence = &mut setup.evidence;
        let signature = match link {
            ChainLink::RequesterCapsule => &mut evidence.capsule_signature_by_requester,
            ChainLink::WorkerCountersignature => {
                &mut evidence.capsule_signature_by_requester_and_worker
            }
            ChainLink::WorkerCFrag => &mut evidence.cfrag_signature_by_worker,
            ChainLink::WorkerAttestation => &mut evidence.worker_key_attestation,
        };
        signature.truncate(64);

        let error = verify(hash_algorithm, &setup).expect_err("truncated signature");
        assert_eq!(error.link(), link);
        assert!(matches!(
            error,
            SignatureChainError::MalformedSignature {
                source: SignatureError::Length(64),
                ..
            }
        ));
    }
}
