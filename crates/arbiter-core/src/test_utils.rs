// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Utility functions for tests.
//!
//! These functions can be used in test and non-test code, but panic on errors.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use k256::{NonZeroScalar, ProjectivePoint, Scalar, ecdsa::SigningKey};
use rand::{RngCore, SeedableRng, rngs::StdRng};

use crate::{
    Address,
    HashAlgorithm,
    StakeAmount,
    adjudicator::ChallengeEvidence,
    correctness::{UmbralParameters, challenge_scalar, kfrag_validity_digest},
    decode::{Capsule, CapsuleFrag, CorrectnessProof, CurvePoint, CurveScalar, PrecomputedData},
    escrow::{EscrowError, StakingEscrow},
    keys::{CanonicalPublicKey, RecoverableSignature, SIGNATURE_LEN},
};

/// A participant holding a secp256k1 key pair.
#[derive(Debug, Clone)]
pub struct Party {
    signing_key: SigningKey,
}

/// Returns a party whose key is deterministically derived from `seed`.
pub fn party(seed: u64) -> Party {
    Party::random(&mut StdRng::seed_from_u64(seed))
}

impl Party {
    fn random(rng: &mut StdRng) -> Self {
        Self {
            signing_key: SigningKey::random(rng),
        }
    }

    /// Returns the party's signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Returns the party's public key in canonical form.
    pub fn canonical_public_key(&self) -> CanonicalPublicKey {
        CanonicalPublicKey::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Returns the party's 65-byte uncompressed public key.
    pub fn uncompressed_public_key(&self) -> Vec<u8> {
        self.canonical_public_key().to_uncompressed().to_vec()
    }

    /// Returns the party's address.
    pub fn address(&self) -> Address {
        self.canonical_public_key().address()
    }

    /// Signs the digest of `message` and returns the 65-byte recoverable signature.
    pub fn sign(&self, hash_algorithm: HashAlgorithm, message: &[u8]) -> Vec<u8> {
        RecoverableSignature::sign_digest(&self.signing_key, &hash_algorithm.digest(message))
            .expect("signing a digest succeeds")
            .to_bytes()
            .to_vec()
    }
}

/// A capsule re-encrypted into a fragment with a valid correctness proof, together with
/// consistent precomputed data.
#[derive(Debug, Clone)]
pub struct ReEncryptionFixture {
    /// The capsule.
    pub capsule: Capsule,
    /// The fragment.
    pub cfrag: CapsuleFrag,
    /// The precomputed data matching the capsule and fragment.
    pub precomputed: PrecomputedData,
}

impl ReEncryptionFixture {
    /// Returns a fragment that was correctly re-encrypted.
    pub fn honest(seed: u64) -> Self {
        Self::new(seed, false)
    }

    /// Returns a fragment whose point `E1` was re-encrypted with a key other than the one its
    /// proof commits to.
    pub fn incorrect(seed: u64) -> Self {
        Self::new(seed, true)
    }

    fn new(seed: u64, re_encrypt_with_other_key: bool) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut scalar = || *NonZeroScalar::random(&mut rng);
        let params = UmbralParameters::secp256k1().expect("the standard parameters are valid");
        let generator = ProjectivePoint::GENERATOR;
        let point_u = params.point_u.to_projective();

        let capsule = Capsule {
            point_e: point(generator * scalar()),
            point_v: point(generator * scalar()),
            signature: CurveScalar::from(scalar()),
        };
        let point_e = capsule.point_e.to_projective();
        let point_v = capsule.point_v.to_projective();

        let kfrag_key = scalar();
        let blinding = scalar();
        let e1_key = if re_encrypt_with_other_key {
            scalar()
        } else {
            kfrag_key
        };
        let point_precursor = point(generator * scalar());

        let mut kfrag_id = [0; 32];
        rng.fill_bytes(&mut kfrag_id);
        let delegator = Party::random(&mut rng);

        let mut cfrag = CapsuleFrag {
            point_e1: point(point_e * e1_key),
            point_v1: point(point_v * kfrag_key),
            kfrag_id,
            point_precursor,
            proof: CorrectnessProof {
                point_e2: point(point_e * blinding),
                point_v2: point(point_v * blinding),
                kfrag_commitment: point(point_u * kfrag_key),
                kfrag_pok: point(point_u * blinding),
                signature: CurveScalar::from(Scalar::ZERO),
                kfrag_signature: [0; SIGNATURE_LEN],
                metadata: format!("fixture {seed}").into_bytes(),
            },
        };
        let h = challenge_scalar(&capsule, &cfrag, &params);
        cfrag.proof.signature = CurveScalar::from(blinding + h * kfrag_key);

        let kfrag_signature = RecoverableSignature::sign_digest(
            delegator.signing_key(),
            &kfrag_validity_digest(&cfrag),
        )
        .expect("signing a digest succeeds");
        cfrag.proof.kfrag_signature = kfrag_signature.scalars();

        let precomputed = PrecomputedData::derive(
            &capsule,
            &cfrag,
            &params,
            delegator.address(),
            [kfrag_signature.recovery_byte(), 0, 0, 0, 0],
        );

        Self {
            capsule,
            cfrag,
            precomputed,
        }
    }

    /// Replaces the proof response `z` with zero and rederives the precomputed data.
    ///
    /// The products `z·E`, `z·V`, and `z·U` become the identity.
    pub fn with_zero_response(mut self) -> Self {
        let params = UmbralParameters::secp256k1().expect("the standard parameters are valid");
        self.cfrag.proof.signature = CurveScalar::from(Scalar::ZERO);
        self.precomputed = PrecomputedData::derive(
            &self.capsule,
            &self.cfrag,
            &params,
            self.precomputed.delegator_address,
            self.precomputed.lost_bytes,
        );
        self
    }

    /// Returns the encoded capsule.
    pub fn capsule_bytes(&self) -> Vec<u8> {
        self.capsule.to_bytes()
    }

    /// Returns the encoded fragment.
    pub fn cfrag_bytes(&self) -> Vec<u8> {
        self.cfrag.to_bytes()
    }

    /// Returns the encoded precomputed data.
    pub fn precomputed_bytes(&self) -> Vec<u8> {
        self.precomputed.to_bytes()
    }
}

fn point(point: ProjectivePoint) -> CurvePoint {
    CurvePoint::from_projective(point).expect("point is not the identity")
}

/// Returns evidence for the fixture with a valid signature chain.
///
/// The `staker` attests the `worker`'s key, so the chain resolves to the staker's address.
pub fn signed_evidence(
    hash_algorithm: HashAlgorithm,
    requester: &Party,
    worker: &Party,
    staker: &Party,
    fixture: &ReEncryptionFixture,
) -> ChallengeEvidence {
    let capsule = fixture.capsule_bytes();
    let cfrag = fixture.cfrag_bytes();
    let capsule_signature_by_requester = requester.sign(hash_algorithm, &capsule);

    ChallengeEvidence {
        capsule_signature_by_requester_and_worker: worker
            .sign(hash_algorithm, &capsule_signature_by_requester),
        cfrag_signature_by_worker: worker.sign(hash_algorithm, &cfrag),
        requester_public_key: requester.uncompressed_public_key(),
        worker_public_key: worker.uncompressed_public_key(),
        worker_key_attestation: staker.sign(
            hash_algorithm,
            worker.canonical_public_key().as_bytes(),
        ),
        precomputed_data: fixture.precomputed_bytes(),
        capsule,
        cfrag,
        capsule_signature_by_requester,
    }
}

/// A staking escrow keeping stakes in memory and recording every slash.
#[derive(Debug, Default)]
pub struct InMemoryEscrow {
    state: Mutex<EscrowState>,
}

#[derive(Debug, Default)]
struct EscrowState {
    stakes: HashMap<Address, StakeAmount>,
    slashes: Vec<(Address, StakeAmount)>,
    offline: bool,
}

impl InMemoryEscrow {
    /// Creates an escrow in which `staker` has locked `amount`.
    pub fn with_stake(staker: Address, amount: StakeAmount) -> Self {
        let escrow = Self::default();
        escrow.set_stake(staker, amount);
        escrow
    }

    /// Sets the stake locked by `staker`.
    pub fn set_stake(&self, staker: Address, amount: StakeAmount) {
        self.state().stakes.insert(staker, amount);
    }

    /// Returns all slashes applied so far, in order.
    pub fn slashes(&self) -> Vec<(Address, StakeAmount)> {
        self.state().slashes.clone()
    }

    /// Makes every subsequent slash fail with [`EscrowError::Unavailable`] while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    fn state(&self) -> MutexGuard<'_, EscrowState> {
        self.state.lock().expect("escrow lock is not poisoned")
    }
}

impl StakingEscrow for InMemoryEscrow {
    fn locked_stake(&self, staker: &Address) -> Result<StakeAmount, EscrowError> {
        Ok(self.state().stakes.get(staker).copied().unwrap_or(0))
    }

    fn slash(&self, staker: &Address, penalty: StakeAmount) -> Result<(), EscrowError> {
        let mut guard = self.state();
        let state = &mut *guard;
        if state.offline {
            return Err(EscrowError::Unavailable("the escrow is offline".to_owned()));
        }
        let stake = state
            .stakes
            .get_mut(staker)
            .filter(|stake| **stake >= penalty)
            .ok_or_else(|| EscrowError::Reverted("insufficient stake".to_owned()))?;
        *stake -= penalty;
        state.slashes.push((*staker, penalty));
        Ok(())
    }
}
