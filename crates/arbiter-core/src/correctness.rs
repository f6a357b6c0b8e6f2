// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Verification of re-encryption correctness proofs.
//!
//! A worker holding the key fragment `rk` re-encrypts a capsule `(E, V)` into the fragment points
//! `E1 = rk·E` and `V1 = rk·V`. Alongside, it publishes a commitment `U1 = rk·U` for the public
//! parameter `U` and a non-interactive proof of knowledge of `rk` consisting of:
//!
//! 1. the blinded points `E2 = t·E`, `V2 = t·V`, and `U2 = t·U` for a random scalar `t`;
//! 2. the response `z = t + h·rk`, where `h` is the challenge scalar derived from all public points
//!    and the fragment metadata (see [`challenge_scalar`]).
//!
//! The fragment is correct if and only if all three of the following equations hold:
//!
//! - `z·E = E2 + h·E1`
//! - `z·V = V2 + h·V1`
//! - `z·U = U2 + h·U1`
//!
//! The challenger additionally supplies [`PrecomputedData`]. It is never trusted: before the
//! verdict is computed, [`PrecomputedData::check_consistency`] recomputes every supplied value and
//! fails on any mismatch. Products that are the identity, e.g. `z·E` for `z = 0`, have a defined
//! encoding so that every decodable fragment has consistent precomputed data. The verdict itself
//! is always derived from recomputed values.

use k256::{
    AffinePoint,
    FieldBytes,
    ProjectivePoint,
    Scalar,
    U256,
    elliptic_curve::ops::Reduce,
};
use num_bigint::BigUint;

use crate::{
    decode::{
        AffineCoordinates,
        Capsule,
        CapsuleFrag,
        Coordinate,
        CurvePoint,
        DecodeError,
        LOST_BYTES_SIZE,
        POINT_SIZE,
        PrecomputedData,
        SCALAR_SIZE,
    },
    hash::{self, DIGEST_LEN},
    keys::{Address, RecoverableSignature},
};

/// The compressed encoding of the default Umbral parameter `U` on secp256k1.
const UMBRAL_POINT_U: [u8; POINT_SIZE] = [
    0x02, 0x03, 0xc9, 0x87, 0x95, 0x77, 0x3f, 0xf1, 0xc2, 0x41, 0xfc, 0x0b, 0x1c, 0xce, 0xd8, 0x5e,
    0x80, 0xf8, 0x36, 0x65, 0x81, 0xdd, 0xa5, 0xc9, 0x45, 0x21, 0x75, 0xeb, 0xd4, 0x13, 0x85, 0xfa,
    0x1f,
];

/// The domain separation tag of the challenge scalar, zero-padded to a full word.
const CHALLENGE_DOMAIN: &[u8] = b"hash_to_curvebn";

/// The group order of secp256k1 minus one.
const GROUP_ORDER_MINUS_ONE: [u8; SCALAR_SIZE] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x40,
];

/// Public parameters of the re-encryption scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmbralParameters {
    /// The point `U` to which key fragments are committed.
    pub point_u: CurvePoint,
}

impl UmbralParameters {
    /// Returns the standard parameters on secp256k1.
    pub fn secp256k1() -> Result<Self, DecodeError> {
        Ok(Self {
            point_u: CurvePoint::from_compressed(&UMBRAL_POINT_U, "U")?,
        })
    }
}

/// Decides whether a capsule fragment is a valid re-encryption of a capsule.
///
/// Implementations must be pure and deterministic: the same inputs always produce the same
/// verdict and nothing is mutated. Returning `false` is not an error; it is the evidence of
/// misbehavior a challenge is looking for.
#[cfg_attr(test, mockall::automock)]
pub trait CorrectnessVerifier: std::fmt::Debug + Send + Sync {
    /// Returns true iff `cfrag` is a correct re-encryption of `capsule`.
    fn is_correct(
        &self,
        capsule: &Capsule,
        cfrag: &CapsuleFrag,
        precomputed: &PrecomputedData,
    ) -> bool;
}

/// Verifies the re-encryption proof by recomputing both sides of every proof equation.
#[derive(Debug, Clone)]
pub struct UmbralVerifier {
    params: UmbralParameters,
}

impl UmbralVerifier {
    /// Creates a verifier for the given parameters.
    pub fn new(params: UmbralParameters) -> Self {
        Self { params }
    }
}

impl CorrectnessVerifier for UmbralVerifier {
    fn is_correct(
        &self,
        capsule: &Capsule,
        cfrag: &CapsuleFrag,
        _precomputed: &PrecomputedData,
    ) -> bool {
        let products = ProofProducts::compute(capsule, cfrag, &self.params);
        let proof = &cfrag.proof;

        products.e_z == proof.point_e2.to_projective() + products.e1_h
            && products.v_z == proof.point_v2.to_projective() + products.v1_h
            && products.u_z == proof.kfrag_pok.to_projective() + products.u1_h
    }
}

/// Computes the challenge scalar `h` of a fragment's correctness proof.
///
/// `h = 1 + ((hi·2^256 + lo) mod (n - 1))` where `hi` and `lo` are the Keccak-256 digests of the
/// hash input prefixed with `0x00` and `0x01` respectively. The result is never zero.
pub fn challenge_scalar(
    capsule: &Capsule,
    cfrag: &CapsuleFrag,
    params: &UmbralParameters,
) -> Scalar {
    let proof = &cfrag.proof;
    let mut domain = [0u8; SCALAR_SIZE];
    domain[..CHALLENGE_DOMAIN.len()].copy_from_slice(CHALLENGE_DOMAIN);
    let parts: [&[u8]; 12] = [
        &domain,
        &[0u8; SCALAR_SIZE],
        capsule.point_e.as_bytes(),
        cfrag.point_e1.as_bytes(),
        proof.point_e2.as_bytes(),
        capsule.point_v.as_bytes(),
        cfrag.point_v1.as_bytes(),
        proof.point_v2.as_bytes(),
        params.point_u.as_bytes(),
        proof.kfrag_commitment.as_bytes(),
        proof.kfrag_pok.as_bytes(),
        &proof.metadata,
    ];
    let input = parts.concat();

    let hi = hash::keccak256(&[&[0x00], &input]);
    let lo = hash::keccak256(&[&[0x01], &input]);
    let wide = (BigUint::from_bytes_be(&hi) << (8 * SCALAR_SIZE)) | BigUint::from_bytes_be(&lo);
    let reduced = wide % BigUint::from_bytes_be(&GROUP_ORDER_MINUS_ONE) + 1u32;

    // The reduced value is below the group order, so the reduction below is the identity.
    let digits = reduced.to_bytes_be();
    let mut repr = [0u8; SCALAR_SIZE];
    repr[SCALAR_SIZE - digits.len()..].copy_from_slice(&digits);
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&repr))
}

/// The scalar products appearing in the proof equations.
#[derive(Debug, Clone, Copy)]
struct ProofProducts {
    e_z: ProjectivePoint,
    e1_h: ProjectivePoint,
    v_z: ProjectivePoint,
    v1_h: ProjectivePoint,
    u_z: ProjectivePoint,
    u1_h: ProjectivePoint,
}

impl ProofProducts {
    fn compute(capsule: &Capsule, cfrag: &CapsuleFrag, params: &UmbralParameters) -> Self {
        let h = challenge_scalar(capsule, cfrag, params);
        let z = *cfrag.proof.signature.scalar();
        Self {
            e_z: capsule.point_e.to_projective() * z,
            e1_h: cfrag.point_e1.to_projective() * h,
            v_z: capsule.point_v.to_projective() * z,
            v1_h: cfrag.point_v1.to_projective() * h,
            u_z: params.point_u.to_projective() * z,
            u1_h: cfrag.proof.kfrag_commitment.to_projective() * h,
        }
    }
}

fn coordinates(point: ProjectivePoint) -> AffineCoordinates {
    AffineCoordinates::of(&AffinePoint::from(point))
}

fn y_coordinate(point: &CurvePoint) -> Coordinate {
    point.coordinates().y
}

/// Returns the digest the delegator signs when issuing the key fragment used for `cfrag`:
/// `Keccak256(kfrag_id ‖ U1 ‖ precursor)`.
pub fn kfrag_validity_digest(cfrag: &CapsuleFrag) -> [u8; DIGEST_LEN] {
    hash::keccak256(&[
        &cfrag.kfrag_id,
        cfrag.proof.kfrag_commitment.as_bytes(),
        cfrag.point_precursor.as_bytes(),
    ])
}

impl PrecomputedData {
    /// Derives precomputed data consistent with `capsule` and `cfrag`.
    ///
    /// The delegator's address and the lost signature bytes are passed through unchanged.
    pub fn derive(
        capsule: &Capsule,
        cfrag: &CapsuleFrag,
        params: &UmbralParameters,
        delegator_address: Address,
        lost_bytes: [u8; LOST_BYTES_SIZE],
    ) -> Self {
        let products = ProofProducts::compute(capsule, cfrag, params);
        let proof = &cfrag.proof;
        Self {
            point_e_y: y_coordinate(&capsule.point_e),
            point_e_z: coordinates(products.e_z),
            point_e1_y: y_coordinate(&cfrag.point_e1),
            point_e1_h: coordinates(products.e1_h),
            point_e2_y: y_coordinate(&proof.point_e2),
            point_v_y: y_coordinate(&capsule.point_v),
            point_v_z: coordinates(products.v_z),
            point_v1_y: y_coordinate(&cfrag.point_v1),
            point_v1_h: coordinates(products.v1_h),
            point_v2_y: y_coordinate(&proof.point_v2),
            point_u_z: coordinates(products.u_z),
            point_u1_y: y_coordinate(&proof.kfrag_commitment),
            point_u1_h: coordinates(products.u1_h),
            point_u2_y: y_coordinate(&proof.kfrag_pok),
            kfrag_validity_digest: kfrag_validity_digest(cfrag),
            delegator_address,
            lost_bytes,
        }
    }

    /// Checks every supplied value against the values recomputed from `capsule` and `cfrag`, and
    /// checks that the key fragment signature over the fragment's validity digest was produced by
    /// the delegator.
    pub fn check_consistency(
        &self,
        capsule: &Capsule,
        cfrag: &CapsuleFrag,
        params: &UmbralParameters,
    ) -> Result<(), DecodeError> {
        let proof = &cfrag.proof;
        let y_coordinates = [
            ("E.y", &capsule.point_e, &self.point_e_y),
            ("E1.y", &cfrag.point_e1, &self.point_e1_y),
            ("E2.y", &proof.point_e2, &self.point_e2_y),
            ("V.y", &capsule.point_v, &self.point_v_y),
            ("V1.y", &cfrag.point_v1, &self.point_v1_y),
            ("V2.y", &proof.point_v2, &self.point_v2_y),
            ("U1.y", &proof.kfrag_commitment, &self.point_u1_y),
            ("U2.y", &proof.kfrag_pok, &self.point_u2_y),
        ];
        for (field, point, supplied) in y_coordinates {
            if y_coordinate(point) != *supplied {
                return Err(DecodeError::InconsistentPrecomputedData { field });
            }
        }

        let products = ProofProducts::compute(capsule, cfrag, params);
        let products = [
            ("z·E", products.e_z, &self.point_e_z),
            ("h·E1", products.e1_h, &self.point_e1_h),
            ("z·V", products.v_z, &self.point_v_z),
            ("h·V1", products.v1_h, &self.point_v1_h),
            ("z·U", products.u_z, &self.point_u_z),
            ("h·U1", products.u1_h, &self.point_u1_h),
        ];
        for (field, product, supplied) in products {
            if coordinates(product) != *supplied {
                return Err(DecodeError::InconsistentPrecomputedData { field });
            }
        }

        if kfrag_validity_digest(cfrag) != self.kfrag_validity_digest {
            return Err(DecodeError::InconsistentPrecomputedData {
                field: "key fragment validity digest",
            });
        }

        let signer = RecoverableSignature::from_parts(&proof.kfrag_signature, self.lost_bytes[0])
            .and_then(|signature| signature.recover(&self.kfrag_validity_digest))
            .map_err(|_| DecodeError::InvalidKFragSignature)?;
        if signer.address() != self.delegator_address {
            return Err(DecodeError::InvalidKFragSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, ReEncryptionFixture};

    fn params() -> UmbralParameters {
        UmbralParameters::secp256k1().expect("the standard parameters are valid")
    }

    fn verifier() -> UmbralVerifier {
        UmbralVerifier::new(params())
    }

    #[test]
    fn default_parameter_has_the_expected_y_coordinate() {
        assert_eq!(
            hex::encode(y_coordinate(&params().point_u)),
            "7880ed56962d7c0ae44d6f14bb53b5fe64b31ea44a41d0316f3a598778f0f936"
        );
    }

    #[test]
    fn accepts_honest_fragment() {
        let fixture = ReEncryptionFixture::honest(11);
        assert!(verifier().is_correct(&fixture.capsule, &fixture.cfrag, &fixture.precomputed));
    }

    #[test]
    fn rejects_fragment_re_encrypted_with_another_key() {
        let fixture = ReEncryptionFixture::incorrect(12);
        assert!(!verifier().is_correct(&fixture.capsule, &fixture.cfrag, &fixture.precomputed));
    }

    #[test]
    fn metadata_is_bound_to_the_proof() {
        let mut fixture = ReEncryptionFixture::honest(13);
        let params = params();
        let original = challenge_scalar(&fixture.capsule, &fixture.cfrag, &params);

        fixture.cfrag.proof.metadata.push(0);

        assert_ne!(
            challenge_scalar(&fixture.capsule, &fixture.cfrag, &params),
            original
        );
        assert!(!verifier().is_correct(&fixture.capsule, &fixture.cfrag, &fixture.precomputed));
    }

    #[test]
    fn challenge_scalar_is_deterministic_and_nonzero() {
        let fixture = ReEncryptionFixture::honest(14);
        let params = params();
        let h = challenge_scalar(&fixture.capsule, &fixture.cfrag, &params);

        assert_eq!(h, challenge_scalar(&fixture.capsule, &fixture.cfrag, &params));
        assert_ne!(h, Scalar::ZERO);
    }

    #[test]
    fn consistent_precomputed_data_passes() -> arbiter_test_utils::Result {
        for fixture in [ReEncryptionFixture::honest(15), ReEncryptionFixture::incorrect(15)] {
            fixture
                .precomputed
                .check_consistency(&fixture.capsule, &fixture.cfrag, &params())?;
        }
        Ok(())
    }

    #[test]
    fn rejects_forged_y_coordinate() {
        let fixture = ReEncryptionFixture::honest(16);
        let mut precomputed = fixture.precomputed.clone();
        precomputed.point_v1_y = precomputed.point_v_y;

        assert_eq!(
            precomputed.check_consistency(&fixture.capsule, &fixture.cfrag, &params()),
            Err(DecodeError::InconsistentPrecomputedData { field: "V1.y" })
        );
    }

    #[test]
    fn rejects_forged_product() {
        // A challenger could try to make an honest fragment look incorrect by supplying a valid
        // point that is not the actual product.
        let fixture = ReEncryptionFixture::honest(17);
        let mut precomputed = fixture.precomputed.clone();
        precomputed.point_e1_h = ReEncryptionFixture::honest(18).precomputed.point_e1_h;

        assert_eq!(
            precomputed.check_consistency(&fixture.capsule, &fixture.cfrag, &params()),
            Err(DecodeError::InconsistentPrecomputedData { field: "h·E1" })
        );
    }

    #[test]
    fn zero_response_has_consistent_precomputed_data() -> arbiter_test_utils::Result {
        let fixture = ReEncryptionFixture::incorrect(22).with_zero_response();

        assert_eq!(fixture.precomputed.point_e_z, AffineCoordinates::IDENTITY);
        assert_eq!(fixture.precomputed.point_v_z, AffineCoordinates::IDENTITY);
        assert_eq!(fixture.precomputed.point_u_z, AffineCoordinates::IDENTITY);
        fixture
            .precomputed
            .check_consistency(&fixture.capsule, &fixture.cfrag, &params())?;
        assert!(!verifier().is_correct(&fixture.capsule, &fixture.cfrag, &fixture.precomputed));
        Ok(())
    }

    #[test]
    fn rejects_foreign_digest_signed_by_foreign_key() -> arbiter_test_utils::Result {
        let fixture = ReEncryptionFixture::honest(23);
        let forger = test_utils::party(24);
        let digest = [0x42; DIGEST_LEN];
        let signature = RecoverableSignature::sign_digest(forger.signing_key(), &digest)?;

        let mut cfrag = fixture.cfrag.clone();
        cfrag.proof.kfrag_signature = signature.scalars();
        let mut precomputed = PrecomputedData::derive(
            &fixture.capsule,
            &cfrag,
            &params(),
            forger.address(),
            [signature.recovery_byte(), 0, 0, 0, 0],
        );
        precomputed.kfrag_validity_digest = digest;

        assert_eq!(
            precomputed.check_consistency(&fixture.capsule, &cfrag, &params()),
            Err(DecodeError::InconsistentPrecomputedData {
                field: "key fragment validity digest"
            })
        );
        Ok(())
    }

    #[test]
    fn rejects_kfrag_signature_of_another_delegator() {
        let fixture = ReEncryptionFixture::honest(19);
        let mut precomputed = fixture.precomputed.clone();
        precomputed.delegator_address = test_utils::party(20).address();

        assert_eq!(
            precomputed.check_consistency(&fixture.capsule, &fixture.cfrag, &params()),
            Err(DecodeError::InvalidKFragSignature)
        );
    }

    #[test]
    fn rejects_invalid_kfrag_recovery_byte() {
        let fixture = ReEncryptionFixture::honest(21);
        let mut precomputed = fixture.precomputed.clone();
        precomputed.lost_bytes[0] = 42;

        assert_eq!(
            precomputed.check_consistency(&fixture.capsule, &fixture.cfrag, &params()),
            Err(DecodeError::InvalidKFragSignature)
        );
    }
}
