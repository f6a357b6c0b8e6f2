// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! The challenge entry point.
//!
//! A challenge moves its (capsule, fragment) pair from unseen to adjudicated, at most once. The
//! steps of [`Adjudicator::challenge`] are:
//!
//! 1. normalize both public keys;
//! 2. reject the challenge if its ID has already been adjudicated;
//! 3. verify the signature chain and recover the worker's identity;
//! 4. require that the identity holds stake;
//! 5. decode the payloads and check the precomputed data against them;
//! 6. run the correctness verifier;
//! 7. reserve the ID, slash the worker if the fragment is incorrect, and record the verdict.
//!
//! Only the last step changes state. Any failure before or during it leaves the pair unseen. While
//! the slash of step 7 is in flight, other submissions of the same pair are rejected as already
//! challenged.

use std::sync::Arc;

use anyhow::Context as _;
use prometheus::Registry;

use crate::{
    ChallengeError,
    ChallengeId,
    config::AdjudicatorConfig,
    correctness::{CorrectnessVerifier, UmbralParameters, UmbralVerifier},
    decode::{Capsule, CapsuleFrag, PrecomputedData},
    escrow::StakingEscrow,
    keys::{CanonicalPublicKey, KeyRole},
    ledger::{ChallengeLedger, Verdict},
    metrics::{self, ChallengeMetricSet, with_label},
    signature_chain::{SignatureChain, SignatureChainVerifier},
};

/// The evidence submitted with a challenge, as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeEvidence {
    /// The encoded capsule.
    pub capsule: Vec<u8>,
    /// The encoded capsule fragment under dispute.
    pub cfrag: Vec<u8>,
    /// The requester's signature over the capsule.
    pub capsule_signature_by_requester: Vec<u8>,
    /// The worker's signature over `capsule_signature_by_requester`.
    pub capsule_signature_by_requester_and_worker: Vec<u8>,
    /// The worker's signature over the capsule fragment.
    pub cfrag_signature_by_worker: Vec<u8>,
    /// The requester's uncompressed public key.
    pub requester_public_key: Vec<u8>,
    /// The worker's uncompressed public key.
    pub worker_public_key: Vec<u8>,
    /// The staking account's signature over the worker's canonical public key.
    pub worker_key_attestation: Vec<u8>,
    /// The encoded precomputed data.
    pub precomputed_data: Vec<u8>,
}

impl ChallengeEvidence {
    /// Returns the signature chain of the evidence for the given normalized keys.
    pub fn signature_chain<'a>(
        &'a self,
        requester_key: &'a CanonicalPublicKey,
        worker_key: &'a CanonicalPublicKey,
    ) -> SignatureChain<'a> {
        SignatureChain {
            capsule: &self.capsule,
            cfrag: &self.cfrag,
            capsule_signature_by_requester: &self.capsule_signature_by_requester,
            capsule_signature_by_requester_and_worker: &self
                .capsule_signature_by_requester_and_worker,
            cfrag_signature_by_worker: &self.cfrag_signature_by_worker,
            requester_key,
            worker_key,
            worker_key_attestation: &self.worker_key_attestation,
        }
    }
}

/// Adjudicates challenges against workers and slashes those that produced incorrect fragments.
#[derive(Debug)]
pub struct Adjudicator {
    config: AdjudicatorConfig,
    signature_chain_verifier: SignatureChainVerifier,
    correctness_verifier: Arc<dyn CorrectnessVerifier>,
    umbral_parameters: UmbralParameters,
    escrow: Arc<dyn StakingEscrow>,
    ledger: ChallengeLedger,
    metrics: ChallengeMetricSet,
}

impl Adjudicator {
    /// Creates an adjudicator verifying fragments with the [`UmbralVerifier`].
    ///
    /// Fails if the configuration is invalid or the metrics cannot be registered on `registry`.
    pub fn new(
        config: AdjudicatorConfig,
        escrow: Arc<dyn StakingEscrow>,
        registry: &Registry,
    ) -> anyhow::Result<Self> {
        let verifier = UmbralVerifier::new(UmbralParameters::secp256k1()?);
        Self::with_verifier(config, escrow, Arc::new(verifier), registry)
    }

    /// Creates an adjudicator with a custom correctness verifier.
    pub fn with_verifier(
        config: AdjudicatorConfig,
        escrow: Arc<dyn StakingEscrow>,
        correctness_verifier: Arc<dyn CorrectnessVerifier>,
        registry: &Registry,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let metrics =
            ChallengeMetricSet::new(registry).context("unable to register challenge metrics")?;
        tracing::info!(
            hash_algorithm = %config.hash_algorithm,
            penalty = config.penalty,
            "created adjudicator"
        );

        Ok(Self {
            signature_chain_verifier: SignatureChainVerifier::new(config.hash_algorithm),
            config,
            correctness_verifier,
            umbral_parameters: UmbralParameters::secp256k1()?,
            escrow,
            ledger: ChallengeLedger::new(),
            metrics,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AdjudicatorConfig {
        &self.config
    }

    /// Returns the ID under which the (capsule, fragment) pair is adjudicated.
    pub fn challenge_id(&self, capsule: &[u8], cfrag: &[u8]) -> ChallengeId {
        ChallengeId::compute(self.config.hash_algorithm, capsule, cfrag)
    }

    /// Returns true if the challenge has been adjudicated.
    pub fn is_adjudicated(&self, challenge_id: &ChallengeId) -> bool {
        self.ledger.is_adjudicated(challenge_id)
    }

    /// Returns the verdict of an adjudicated challenge.
    pub fn verdict(&self, challenge_id: &ChallengeId) -> Option<Verdict> {
        self.ledger.verdict(challenge_id)
    }

    /// Adjudicates a challenge.
    ///
    /// On success the challenge is adjudicated and the returned verdict states whether the worker
    /// was slashed. On failure nothing has changed.
    pub fn challenge(&self, evidence: &ChallengeEvidence) -> Result<Verdict, ChallengeError> {
        let challenge_id = self.challenge_id(&evidence.capsule, &evidence.cfrag);
        let _guard = tracing::info_span!("challenge", %challenge_id).entered();

        let result = self.adjudicate(challenge_id, evidence);
        let outcome = match &result {
            Ok(verdict) if verdict.slashed() => metrics::OUTCOME_SLASHED,
            Ok(_) => metrics::OUTCOME_CLEARED,
            Err(error) => error.label(),
        };
        with_label!(self.metrics.challenges_total, outcome).inc();
        if let Ok(verdict) = &result {
            self.metrics.penalty_total.inc_by(verdict.penalty);
        }
        result
    }

    fn adjudicate(
        &self,
        challenge_id: ChallengeId,
        evidence: &ChallengeEvidence,
    ) -> Result<Verdict, ChallengeError> {
        let requester_key = CanonicalPublicKey::from_uncompressed(
            &evidence.requester_public_key,
            KeyRole::Requester,
        )?;
        let worker_key =
            CanonicalPublicKey::from_uncompressed(&evidence.worker_public_key, KeyRole::Worker)?;

        if self.ledger.is_adjudicated(&challenge_id) {
            tracing::debug!("challenge has already been adjudicated");
            return Err(ChallengeError::AlreadyChallenged(challenge_id));
        }

        let worker = self
            .signature_chain_verifier
            .verify_chain(&evidence.signature_chain(&requester_key, &worker_key))
            .inspect_err(|error| tracing::warn!(%error, "rejecting unauthenticated challenge"))?;

        let stake = self.escrow.locked_stake(&worker)?;
        if stake == 0 {
            tracing::debug!(%worker, "worker identity holds no stake");
            return Err(ChallengeError::NotAStaker(worker));
        }

        let capsule = Capsule::from_bytes(&evidence.capsule)?;
        let cfrag = CapsuleFrag::from_bytes(&evidence.cfrag)?;
        let precomputed = PrecomputedData::from_bytes(&evidence.precomputed_data)?;
        precomputed
            .check_consistency(&capsule, &cfrag, &self.umbral_parameters)
            .inspect_err(|error| tracing::debug!(%error, "precomputed data is inconsistent"))?;

        let cfrag_correct = self
            .correctness_verifier
            .is_correct(&capsule, &cfrag, &precomputed);

        let verdict = self.ledger.adjudicate(challenge_id, || {
            let penalty = if cfrag_correct {
                0
            } else {
                self.escrow.slash(&worker, self.config.penalty)?;
                tracing::warn!(%worker, penalty = self.config.penalty, "slashed worker");
                self.config.penalty
            };
            Ok::<_, ChallengeError>(Verdict {
                challenge_id,
                worker,
                cfrag_correct,
                penalty,
            })
        })?;

        tracing::info!(%worker, cfrag_correct, stake, "challenge adjudicated");
        Ok(verdict)
    }
}
