// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Decoding of capsules, capsule fragments, and precomputed verification data.
//!
//! All records use fixed-width big-endian fields. Points are SEC1-compressed, scalars are reduced
//! modulo the group order. Decoding is total: every byte sequence either yields a fully validated
//! record or a [`DecodeError`]. The raw bytes are not retained here; callers keep them for hashing
//! and signature checks.

use core::fmt;

use k256::{
    AffinePoint,
    EncodedPoint,
    FieldBytes,
    ProjectivePoint,
    Scalar,
    elliptic_curve::{
        PrimeField,
        sec1::{FromEncodedPoint, ToEncodedPoint},
    },
};

use crate::keys::{ADDRESS_LEN, Address, SIGNATURE_LEN};

/// The size of a compressed curve point.
pub const POINT_SIZE: usize = 33;
/// The size of a scalar or of a single field coordinate.
pub const SCALAR_SIZE: usize = 32;
/// The size of an encoded [`Capsule`].
pub const CAPSULE_SIZE: usize = 2 * POINT_SIZE + SCALAR_SIZE;
/// The size of an encoded [`CorrectnessProof`] without metadata.
pub const MIN_CORRECTNESS_PROOF_SIZE: usize = 4 * POINT_SIZE + SCALAR_SIZE + SIGNATURE_LEN;
/// The minimum size of an encoded [`CapsuleFrag`], reached when its metadata is empty.
pub const MIN_CAPSULE_FRAG_SIZE: usize = 3 * POINT_SIZE + SCALAR_SIZE + MIN_CORRECTNESS_PROOF_SIZE;
/// The number of lost signature bytes carried by [`PrecomputedData`].
pub const LOST_BYTES_SIZE: usize = 5;
/// The size of encoded [`PrecomputedData`].
pub const PRECOMPUTED_DATA_SIZE: usize =
    20 * SCALAR_SIZE + SCALAR_SIZE + ADDRESS_LEN + LOST_BYTES_SIZE;

/// A big-endian field element, as used for a single point coordinate.
pub type Coordinate = [u8; SCALAR_SIZE];

/// The kind of record being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// A [`Capsule`].
    Capsule,
    /// A [`CapsuleFrag`].
    CapsuleFrag,
    /// A [`PrecomputedData`] record.
    PrecomputedData,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capsule => f.write_str("capsule"),
            Self::CapsuleFrag => f.write_str("capsule fragment"),
            Self::PrecomputedData => f.write_str("precomputed data"),
        }
    }
}

/// Error returned when a payload cannot be decoded or is inconsistent with the records it
/// accompanies.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload does not have the fixed length of its record.
    #[error("the {record} must be exactly {expected} bytes long, but is {actual}")]
    WrongLength {
        /// The record being decoded.
        record: Record,
        /// The required length.
        expected: usize,
        /// The length of the payload.
        actual: usize,
    },
    /// The payload is shorter than the minimum length of its record.
    #[error("the {record} must be at least {minimum} bytes long, but is {actual}")]
    TooShort {
        /// The record being decoded.
        record: Record,
        /// The minimum length.
        minimum: usize,
        /// The length of the payload.
        actual: usize,
    },
    /// A field is not a compressed point on the curve.
    #[error("{field} is not a valid compressed curve point")]
    InvalidPoint {
        /// The name of the field.
        field: &'static str,
    },
    /// A field is not a scalar below the group order.
    #[error("{field} is not a valid scalar")]
    InvalidScalar {
        /// The name of the field.
        field: &'static str,
    },
    /// A pair of coordinates does not describe a point on the curve.
    #[error("{field} does not describe a point on the curve")]
    InvalidCoordinates {
        /// The name of the field.
        field: &'static str,
    },
    /// A precomputed value does not match the value derived from the capsule and fragment.
    #[error("the precomputed {field} does not match the capsule and fragment")]
    InconsistentPrecomputedData {
        /// The name of the field.
        field: &'static str,
    },
    /// The key fragment signature does not recover to the delegator's address.
    #[error("the key fragment signature was not produced by the delegator")]
    InvalidKFragSignature,
}

/// Sequential reader over a length-checked payload.
#[derive(Debug)]
struct Reader<'a> {
    record: Record,
    total: usize,
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn exact(record: Record, bytes: &'a [u8], expected: usize) -> Result<Self, DecodeError> {
        if bytes.len() != expected {
            return Err(DecodeError::WrongLength {
                record,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self::new(record, bytes))
    }

    fn at_least(record: Record, bytes: &'a [u8], minimum: usize) -> Result<Self, DecodeError> {
        if bytes.len() < minimum {
            return Err(DecodeError::TooShort {
                record,
                minimum,
                actual: bytes.len(),
            });
        }
        Ok(Self::new(record, bytes))
    }

    fn new(record: Record, bytes: &'a [u8]) -> Self {
        Self {
            record,
            total: bytes.len(),
            bytes,
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let (head, rest) = self
            .bytes
            .split_first_chunk::<N>()
            .ok_or(DecodeError::TooShort {
                record: self.record,
                minimum: self.total - self.bytes.len() + N,
                actual: self.total,
            })?;
        self.bytes = rest;
        Ok(*head)
    }

    fn point(&mut self, field: &'static str) -> Result<CurvePoint, DecodeError> {
        CurvePoint::from_compressed(&self.array()?, field)
    }

    fn scalar(&mut self, field: &'static str) -> Result<CurveScalar, DecodeError> {
        CurveScalar::from_bytes(&self.array()?, field)
    }

    fn coordinates(&mut self, field: &'static str) -> Result<AffineCoordinates, DecodeError> {
        let coordinates = AffineCoordinates {
            x: self.array()?,
            y: self.array()?,
        };
        coordinates
            .to_point()
            .map(|_| coordinates)
            .ok_or(DecodeError::InvalidCoordinates { field })
    }

    fn remainder(self) -> &'a [u8] {
        self.bytes
    }
}

/// A non-identity point on secp256k1 together with its compressed encoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint {
    compressed: [u8; POINT_SIZE],
    point: AffinePoint,
}

impl CurvePoint {
    /// Decompresses a SEC1-compressed point.
    pub fn from_compressed(
        bytes: &[u8; POINT_SIZE],
        field: &'static str,
    ) -> Result<Self, DecodeError> {
        let invalid = DecodeError::InvalidPoint { field };
        let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| invalid.clone())?;
        if !encoded.is_compressed() {
            return Err(invalid);
        }
        let point = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or(invalid)?;
        Ok(Self {
            compressed: *bytes,
            point,
        })
    }

    /// Wraps an affine point, returning `None` for the identity.
    pub fn from_affine(point: AffinePoint) -> Option<Self> {
        let compressed = point.to_encoded_point(true).as_bytes().try_into().ok()?;
        Some(Self { compressed, point })
    }

    /// Wraps a projective point, returning `None` for the identity.
    pub fn from_projective(point: ProjectivePoint) -> Option<Self> {
        Self::from_affine(AffinePoint::from(point))
    }

    /// Returns the compressed encoding.
    pub fn as_bytes(&self) -> &[u8; POINT_SIZE] {
        &self.compressed
    }

    /// Returns the point in projective form for arithmetic.
    pub fn to_projective(&self) -> ProjectivePoint {
        ProjectivePoint::from(self.point)
    }

    /// Returns the point's affine coordinates.
    pub fn coordinates(&self) -> AffineCoordinates {
        AffineCoordinates::of(&self.point)
    }
}

impl fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurvePoint({})", hex::encode(self.compressed))
    }
}

/// A scalar modulo the order of secp256k1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveScalar(Scalar);

impl CurveScalar {
    /// Parses a big-endian scalar, rejecting values not below the group order.
    pub fn from_bytes(bytes: &[u8; SCALAR_SIZE], field: &'static str) -> Result<Self, DecodeError> {
        Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
            .map(Self)
            .ok_or(DecodeError::InvalidScalar { field })
    }

    /// Returns the big-endian encoding.
    pub fn to_bytes(&self) -> [u8; SCALAR_SIZE] {
        field_bytes_to_array(&self.0.to_bytes())
    }

    /// Returns the underlying scalar.
    pub fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl From<Scalar> for CurveScalar {
    fn from(scalar: Scalar) -> Self {
        Self(scalar)
    }
}

/// The uncompressed coordinates of a point.
///
/// The identity is encoded as all-zero coordinates; `(0, 0)` is not on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffineCoordinates {
    /// The x-coordinate.
    pub x: Coordinate,
    /// The y-coordinate.
    pub y: Coordinate,
}

impl AffineCoordinates {
    /// The encoding of the identity.
    pub const IDENTITY: Self = Self {
        x: [0; SCALAR_SIZE],
        y: [0; SCALAR_SIZE],
    };

    /// Returns the coordinates of `point`.
    pub fn of(point: &AffinePoint) -> Self {
        let encoded = point.to_encoded_point(false);
        match (encoded.x(), encoded.y()) {
            (Some(x), Some(y)) => Self {
                x: field_bytes_to_array(x),
                y: field_bytes_to_array(y),
            },
            _ => Self::IDENTITY,
        }
    }

    /// Returns the point with these coordinates, or `None` if it is not on the curve.
    pub fn to_point(&self) -> Option<AffinePoint> {
        if *self == Self::IDENTITY {
            return Some(AffinePoint::IDENTITY);
        }
        let encoded = EncodedPoint::from_affine_coordinates(
            &FieldBytes::clone_from_slice(&self.x),
            &FieldBytes::clone_from_slice(&self.y),
            false,
        );
        AffinePoint::from_encoded_point(&encoded).into()
    }
}

fn field_bytes_to_array(bytes: &FieldBytes) -> [u8; SCALAR_SIZE] {
    let mut array = [0; SCALAR_SIZE];
    array.copy_from_slice(bytes);
    array
}

/// An encapsulated symmetric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capsule {
    /// The ephemeral point `E`.
    pub point_e: CurvePoint,
    /// The ephemeral point `V`.
    pub point_v: CurvePoint,
    /// The capsule's Schnorr-style signature scalar.
    pub signature: CurveScalar,
}

impl Capsule {
    /// Decodes a capsule from exactly [`CAPSULE_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::exact(Record::Capsule, bytes, CAPSULE_SIZE)?;
        Ok(Self {
            point_e: reader.point("capsule point E")?,
            point_v: reader.point("capsule point V")?,
            signature: reader.scalar("capsule signature")?,
        })
    }

    /// Encodes the capsule.
    pub fn to_bytes(&self) -> Vec<u8> {
        [
            &self.point_e.as_bytes()[..],
            self.point_v.as_bytes(),
            &self.signature.to_bytes(),
        ]
        .concat()
    }
}

/// The proof attached to a capsule fragment that it was re-encrypted with the committed key
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectnessProof {
    /// `t·E` for the prover's blinding scalar `t`.
    pub point_e2: CurvePoint,
    /// `t·V`.
    pub point_v2: CurvePoint,
    /// The commitment `rk·U` to the key fragment.
    pub kfrag_commitment: CurvePoint,
    /// `t·U`, the proof of knowledge of the key fragment.
    pub kfrag_pok: CurvePoint,
    /// The response `z = t + h·rk`.
    pub signature: CurveScalar,
    /// The delegator's `r ‖ s` signature over the key fragment.
    pub kfrag_signature: [u8; SIGNATURE_LEN],
    /// Application-defined metadata bound into the challenge scalar.
    pub metadata: Vec<u8>,
}

/// A worker's re-encryption of a capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleFrag {
    /// `rk·E`.
    pub point_e1: CurvePoint,
    /// `rk·V`.
    pub point_v1: CurvePoint,
    /// The identifier of the key fragment used.
    pub kfrag_id: [u8; SCALAR_SIZE],
    /// The precursor point of the key fragment.
    pub point_precursor: CurvePoint,
    /// The correctness proof.
    pub proof: CorrectnessProof,
}

impl CapsuleFrag {
    /// Decodes a capsule fragment from at least [`MIN_CAPSULE_FRAG_SIZE`] bytes; everything after
    /// the fixed-width fields is metadata.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::at_least(Record::CapsuleFrag, bytes, MIN_CAPSULE_FRAG_SIZE)?;
        let point_e1 = reader.point("fragment point E1")?;
        let point_v1 = reader.point("fragment point V1")?;
        let kfrag_id = reader.array()?;
        let point_precursor = reader.point("fragment precursor")?;
        let point_e2 = reader.point("proof point E2")?;
        let point_v2 = reader.point("proof point V2")?;
        let kfrag_commitment = reader.point("proof key fragment commitment")?;
        let kfrag_pok = reader.point("proof key fragment proof of knowledge")?;
        let signature = reader.scalar("proof signature")?;
        let kfrag_signature = reader.array()?;
        let metadata = reader.remainder().to_vec();

        Ok(Self {
            point_e1,
            point_v1,
            kfrag_id,
            point_precursor,
            proof: CorrectnessProof {
                point_e2,
                point_v2,
                kfrag_commitment,
                kfrag_pok,
                signature,
                kfrag_signature,
                metadata,
            },
        })
    }

    /// Encodes the capsule fragment.
    pub fn to_bytes(&self) -> Vec<u8> {
        let proof = &self.proof;
        [
            &self.point_e1.as_bytes()[..],
            self.point_v1.as_bytes(),
            &self.kfrag_id,
            self.point_precursor.as_bytes(),
            proof.point_e2.as_bytes(),
            proof.point_v2.as_bytes(),
            proof.kfrag_commitment.as_bytes(),
            proof.kfrag_pok.as_bytes(),
            &proof.signature.to_bytes(),
            &proof.kfrag_signature,
            &proof.metadata,
        ]
        .concat()
    }
}

/// Auxiliary values accompanying a challenge: decompressed y-coordinates of the capsule and
/// fragment points, the scalar products used by the correctness equations, and the data needed to
/// check the key fragment signature.
///
/// Products are named after their factors, e.g. `point_e_z` is `z·E` and `point_e1_h` is `h·E1`.
/// A product that is the identity is encoded as [`AffineCoordinates::IDENTITY`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct PrecomputedData {
    pub point_e_y: Coordinate,
    pub point_e_z: AffineCoordinates,
    pub point_e1_y: Coordinate,
    pub point_e1_h: AffineCoordinates,
    pub point_e2_y: Coordinate,
    pub point_v_y: Coordinate,
    pub point_v_z: AffineCoordinates,
    pub point_v1_y: Coordinate,
    pub point_v1_h: AffineCoordinates,
    pub point_v2_y: Coordinate,
    pub point_u_z: AffineCoordinates,
    pub point_u1_y: Coordinate,
    pub point_u1_h: AffineCoordinates,
    pub point_u2_y: Coordinate,
    /// The digest signed by the delegator when issuing the key fragment; it must equal
    /// `Keccak256(kfrag_id ‖ U1 ‖ precursor)` of the fragment.
    pub kfrag_validity_digest: [u8; SCALAR_SIZE],
    /// The address of the delegator.
    pub delegator_address: Address,
    /// Signature bytes not carried by the fragment; the first is the recovery byte of the key
    /// fragment signature.
    pub lost_bytes: [u8; LOST_BYTES_SIZE],
}

impl PrecomputedData {
    /// Decodes precomputed data from exactly [`PRECOMPUTED_DATA_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::exact(Record::PrecomputedData, bytes, PRECOMPUTED_DATA_SIZE)?;
        Ok(Self {
            point_e_y: reader.array()?,
            point_e_z: reader.coordinates("z·E")?,
            point_e1_y: reader.array()?,
            point_e1_h: reader.coordinates("h·E1")?,
            point_e2_y: reader.array()?,
            point_v_y: reader.array()?,
            point_v_z: reader.coordinates("z·V")?,
            point_v1_y: reader.array()?,
            point_v1_h: reader.coordinates("h·V1")?,
            point_v2_y: reader.array()?,
            point_u_z: reader.coordinates("z·U")?,
            point_u1_y: reader.array()?,
            point_u1_h: reader.coordinates("h·U1")?,
            point_u2_y: reader.array()?,
            kfrag_validity_digest: reader.array()?,
            delegator_address: Address(reader.array()?),
            lost_bytes: reader.array()?,
        })
    }

    /// Encodes the precomputed data.
    pub fn to_bytes(&self) -> Vec<u8> {
        [
            &self.point_e_y[..],
            &self.point_e_z.x,
            &self.point_e_z.y,
            &self.point_e1_y,
            &self.point_e1_h.x,
            &self.point_e1_h.y,
            &self.point_e2_y,
            &self.point_v_y,
            &self.point_v_z.x,
            &self.point_v_z.y,
            &self.point_v1_y,
            &self.point_v1_h.x,
            &self.point_v1_h.y,
            &self.point_v2_y,
            &self.point_u_z.x,
            &self.point_u_z.y,
            &self.point_u1_y,
            &self.point_u1_h.x,
            &self.point_u1_h.y,
            &self.point_u2_y,
            &self.kfrag_validity_digest,
            self.delegator_address.as_bytes(),
            &self.lost_bytes,
        ]
        .concat()
    }
}
