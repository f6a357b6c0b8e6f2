// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    ChallengeId,
    decode::DecodeError,
    escrow::EscrowError,
    keys::InvalidInputError,
    ledger::AlreadyAdjudicated,
    signature_chain::SignatureChainError,
};

/// Error returned when a challenge is rejected.
///
/// Except for [`ChallengeError::Escrow`], every variant is caused by the submitted evidence and
/// will recur if the same evidence is submitted again. In all cases the challenge remains
/// unadjudicated, apart from [`ChallengeError::AlreadyChallenged`] where it already was.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    /// A public key is structurally invalid.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
    /// The (capsule, fragment) pair has already been adjudicated.
    #[error("challenge {0} has already been adjudicated")]
    AlreadyChallenged(ChallengeId),
    /// A link of the signature chain is broken.
    #[error("invalid signature chain: {0}")]
    InvalidSignatureChain(#[from] SignatureChainError),
    /// The worker's identity holds no stake.
    #[error("the worker identity {0} holds no stake")]
    NotAStaker(crate::WorkerIdentity),
    /// The capsule, fragment, or precomputed data could not be decoded or are inconsistent.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] DecodeError),
    /// The staking escrow failed; no stake was changed.
    #[error("staking escrow failure: {0}")]
    Escrow(#[from] EscrowError),
}

impl ChallengeError {
    /// Returns the label under which the error is reported in metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::AlreadyChallenged(_) => "already_challenged",
            Self::InvalidSignatureChain(_) => "invalid_signature_chain",
            Self::NotAStaker(_) => "not_a_staker",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::Escrow(_) => "escrow_failure",
        }
    }
}

impl From<AlreadyAdjudicated> for ChallengeError {
    fn from(AlreadyAdjudicated(challenge_id): AlreadyAdjudicated) -> Self {
        Self::AlreadyChallenged(challenge_id)
    }
}
