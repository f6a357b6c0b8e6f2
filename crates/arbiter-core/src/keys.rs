// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Public keys, identities, and recoverable signatures on secp256k1.

use core::fmt;

use k256::{
    EncodedPoint,
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
};
use serde::{Deserialize, Serialize};

use crate::hash::{self, DIGEST_LEN};

/// The length of an uncompressed SEC1 public key, including its tag byte.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;
/// The length of a canonical public key (`x ‖ y`).
pub const CANONICAL_KEY_LEN: usize = 64;
/// The SEC1 tag of uncompressed public keys.
pub const UNCOMPRESSED_KEY_TAG: u8 = 0x04;
/// The length of a recoverable signature (`r ‖ s ‖ v`).
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;
/// The length of a non-recoverable signature (`r ‖ s`).
pub const SIGNATURE_LEN: usize = 64;
/// The length of an [`Address`].
pub const ADDRESS_LEN: usize = 20;

/// The party a public key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// The party that authorized the re-encryption.
    Requester,
    /// The worker that produced the fragment.
    Worker,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requester => f.write_str("requester"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

/// Error returned when a submitted public key is structurally invalid.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InvalidInputError {
    /// The key does not have the length of an uncompressed key.
    #[error("the {role} public key must be {UNCOMPRESSED_KEY_LEN} bytes long, but is {actual}")]
    KeyLength {
        /// The owner of the key.
        role: KeyRole,
        /// The length of the submitted key.
        actual: usize,
    },
    /// The key does not start with the uncompressed tag.
    #[error("the {role} public key starts with {tag:#04x} instead of the uncompressed tag 0x04")]
    KeyTag {
        /// The owner of the key.
        role: KeyRole,
        /// The submitted tag byte.
        tag: u8,
    },
}

/// Error returned when a signature cannot be parsed or no key can be recovered from it.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature has the wrong length.
    #[error("the signature must be {RECOVERABLE_SIGNATURE_LEN} bytes long, but is {0}")]
    Length(usize),
    /// The recovery byte is none of 0, 1, 27, or 28.
    #[error("invalid recovery byte {0}")]
    RecoveryByte(u8),
    /// The `r ‖ s` part is not a valid ECDSA signature.
    #[error("the signature scalars are out of range")]
    Scalars,
    /// No public key can be recovered for the message.
    #[error("no public key can be recovered from the signature")]
    Unrecoverable,
}

/// A secp256k1 public key in canonical form: the 64-byte `x ‖ y` coordinate pair without the
/// SEC1 tag byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalPublicKey([u8; CANONICAL_KEY_LEN]);

impl CanonicalPublicKey {
    /// Normalizes an uncompressed (65-byte, `0x04`-tagged) public key by dropping its tag.
    ///
    /// Only the structure is checked; the coordinates are not required to lie on the curve, as a
    /// key off the curve can never match a recovered signer.
    pub fn from_uncompressed(bytes: &[u8], role: KeyRole) -> Result<Self, InvalidInputError> {
        let Some((&tag, coordinates)) = bytes.split_first() else {
            return Err(InvalidInputError::KeyLength { role, actual: 0 });
        };
        let coordinates = <[u8; CANONICAL_KEY_LEN]>::try_from(coordinates).map_err(|_| {
            InvalidInputError::KeyLength {
                role,
                actual: bytes.len(),
            }
        })?;
        if tag != UNCOMPRESSED_KEY_TAG {
            return Err(InvalidInputError::KeyTag { role, tag });
        }
        Ok(Self(coordinates))
    }

    /// Returns the canonical form of a verifying key.
    ///
    /// # Panics
    ///
    /// Panics if the key has no uncompressed encoding, which no valid key lacks.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self::from_encoded_point(&key.to_encoded_point(false))
            .expect("an uncompressed encoding of a valid key has 64 coordinate bytes")
    }

    fn from_encoded_point(point: &EncodedPoint) -> Option<Self> {
        point
            .as_bytes()
            .get(1..)
            .and_then(|coordinates| coordinates.try_into().ok())
            .map(Self)
    }

    /// Returns the `x ‖ y` bytes of the key.
    pub fn as_bytes(&self) -> &[u8; CANONICAL_KEY_LEN] {
        &self.0
    }

    /// Returns the uncompressed, tagged encoding of the key.
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_KEY_LEN] {
        let mut bytes = [0; UNCOMPRESSED_KEY_LEN];
        bytes[0] = UNCOMPRESSED_KEY_TAG;
        bytes[1..].copy_from_slice(&self.0);
        bytes
    }

    /// Returns the address of the account controlled by this key.
    pub fn address(&self) -> Address {
        Address::from_digest(hash::keccak256(&[&self.0]))
    }
}

impl fmt::Debug for CanonicalPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalPublicKey({})", hex::encode(self.0))
    }
}

/// The address of an account: the 20 low-order bytes of the Keccak-256 digest of its canonical
/// public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

/// The staked identity of a worker, recovered from its key attestation.
pub type WorkerIdentity = Address;

impl Address {
    fn from_digest(digest: [u8; DIGEST_LEN]) -> Self {
        let mut address = [0; ADDRESS_LEN];
        address.copy_from_slice(&digest[DIGEST_LEN - ADDRESS_LEN..]);
        Self(address)
    }

    /// Returns the address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// An ECDSA signature over secp256k1 together with its recovery ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    signature: Signature,
    recovery_id: RecoveryId,
}

impl RecoverableSignature {
    /// Offset added to recovery IDs by Ethereum-style encodings.
    const RECOVERY_BYTE_OFFSET: u8 = 27;

    /// Parses a 65-byte `r ‖ s ‖ v` signature, accepting `v` in `{0, 1, 27, 28}`.
    ///
    /// Signatures with a high `s` are accepted and normalized; see [`Self::from_parts`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let Some((&recovery_byte, scalars)) = bytes.split_last() else {
            return Err(SignatureError::Length(0));
        };
        let scalars = <&[u8; SIGNATURE_LEN]>::try_from(scalars)
            .map_err(|_| SignatureError::Length(bytes.len()))?;
        Self::from_parts(scalars, recovery_byte)
    }

    /// Builds a signature from its `r ‖ s` scalars and a separate recovery byte.
    ///
    /// A high `s` is replaced by `n - s` and the parity of the recovery ID is flipped, so both
    /// forms of a signature recover the same key.
    pub fn from_parts(
        scalars: &[u8; SIGNATURE_LEN],
        recovery_byte: u8,
    ) -> Result<Self, SignatureError> {
        let normalized = if recovery_byte >= Self::RECOVERY_BYTE_OFFSET {
            recovery_byte - Self::RECOVERY_BYTE_OFFSET
        } else {
            recovery_byte
        };
        let recovery_id = RecoveryId::from_byte(normalized)
            .filter(|id| !id.is_x_reduced())
            .ok_or(SignatureError::RecoveryByte(recovery_byte))?;
        let signature = Signature::from_slice(scalars).map_err(|_| SignatureError::Scalars)?;
        let (signature, recovery_id) = match signature.normalize_s() {
            Some(normalized) => (
                normalized,
                RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
            ),
            None => (signature, recovery_id),
        };
        Ok(Self {
            signature,
            recovery_id,
        })
    }

    /// Signs a 32-byte message digest.
    pub fn sign_digest(
        signing_key: &SigningKey,
        digest: &[u8; DIGEST_LEN],
    ) -> Result<Self, SignatureError> {
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|_| SignatureError::Scalars)?;
        Ok(Self {
            signature,
            recovery_id,
        })
    }

    /// Recovers the canonical public key that produced this signature over `digest`.
    pub fn recover(&self, digest: &[u8; DIGEST_LEN]) -> Result<CanonicalPublicKey, SignatureError> {
        let key = VerifyingKey::recover_from_prehash(digest, &self.signature, self.recovery_id)
            .map_err(|_| SignatureError::Unrecoverable)?;
        CanonicalPublicKey::from_encoded_point(&key.to_encoded_point(false))
            .ok_or(SignatureError::Unrecoverable)
    }

    /// Returns the `r ‖ s` scalars.
    pub fn scalars(&self) -> [u8; SIGNATURE_LEN] {
        let mut bytes = [0; SIGNATURE_LEN];
        bytes.copy_from_slice(&self.signature.to_bytes());
        bytes
    }

    /// Returns the Ethereum-style recovery byte (27 or 28).
    pub fn recovery_byte(&self) -> u8 {
        self.recovery_id.to_byte() + Self::RECOVERY_BYTE_OFFSET
    }

    /// Returns the 65-byte `r ‖ s ‖ v` encoding.
    pub fn to_bytes(&self) -> [u8; RECOVERABLE_SIGNATURE_LEN] {
        let mut bytes = [0; RECOVERABLE_SIGNATURE_LEN];
        bytes[..SIGNATURE_LEN].copy_from_slice(&self.scalars());
        bytes[SIGNATURE_LEN] = self.recovery_byte();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use arbiter_test_utils::param_test;

    use k256::{FieldBytes, Scalar, elliptic_curve::PrimeField};

    use super::*;
    use crate::test_utils;

    fn generator_key() -> SigningKey {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        SigningKey::from_slice(&secret).expect("1 is a valid secret key")
    }

    #[test]
    fn address_of_generator_matches_ethereum() {
        let key = CanonicalPublicKey::from_verifying_key(generator_key().verifying_key());
        assert_eq!(
            key.address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn canonical_key_strips_only_the_tag() {
        let verifying_key = *generator_key().verifying_key();
        let uncompressed = verifying_key.to_encoded_point(false);
        let key = CanonicalPublicKey::from_uncompressed(uncompressed.as_bytes(), KeyRole::Worker)
            .expect("valid uncompressed key");

        assert_eq!(&key.as_bytes()[..], &uncompressed.as_bytes()[1..]);
        assert_eq!(&key.to_uncompressed()[..], uncompressed.as_bytes());
    }

    param_test! {
        rejects_malformed_keys: [
            empty: (vec![], InvalidInputError::KeyLength { role: KeyRole::Requester, actual: 0 }),
            canonical: (
                vec![1; 64],
                InvalidInputError::KeyLength { role: KeyRole::Requester, actual: 64 }
            ),
            too_long: (
                vec![4; 66],
                InvalidInputError::KeyLength { role: KeyRole::Requester, actual: 66 }
            ),
            compressed_tag: (
                [vec![2], vec![1; 64]].concat(),
                InvalidInputError::KeyTag { role: KeyRole::Requester, tag: 2 }
            ),
        ]
    }
    fn rejects_malformed_keys(bytes: Vec<u8>, expected: InvalidInputError) {
        assert_eq!(
            CanonicalPublicKey::from_uncompressed(&bytes, KeyRole::Requester),
            Err(expected)
        );
    }

    #[test]
    fn recovers_signer() -> arbiter_test_utils::Result {
        let party = test_utils::party(3);
        let digest = [7u8; DIGEST_LEN];
        let signature = RecoverableSignature::sign_digest(party.signing_key(), &digest)?;

        assert_eq!(signature.recover(&digest)?, party.canonical_public_key());
        assert_ne!(signature.recover(&[8u8; DIGEST_LEN])?, party.canonical_public_key());
        Ok(())
    }

    #[test]
    fn accepts_raw_and_ethereum_recovery_bytes() -> arbiter_test_utils::Result {
        let party = test_utils::party(4);
        let digest = [9u8; DIGEST_LEN];
        let signature = RecoverableSignature::sign_digest(party.signing_key(), &digest)?;

        let mut raw = signature.to_bytes();
        raw[SIGNATURE_LEN] -= 27;
        assert_eq!(RecoverableSignature::from_bytes(&raw)?, signature);
        assert_eq!(
            RecoverableSignature::from_bytes(&signature.to_bytes())?,
            signature
        );
        Ok(())
    }

    #[test]
    fn high_s_signature_recovers_the_same_signer() -> arbiter_test_utils::Result {
        let party = test_utils::party(5);
        let digest = [11u8; DIGEST_LEN];
        let signature = RecoverableSignature::sign_digest(party.signing_key(), &digest)?;

        let mut high_s = signature.to_bytes();
        let s: Scalar = Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(
            &high_s[32..SIGNATURE_LEN],
        )))
        .expect("s is a valid scalar");
        high_s[32..SIGNATURE_LEN].copy_from_slice(&(-s).to_bytes());
        high_s[SIGNATURE_LEN] = if high_s[SIGNATURE_LEN] == 27 { 28 } else { 27 };

        let parsed = RecoverableSignature::from_bytes(&high_s)?;
        assert_eq!(parsed, signature);
        assert_eq!(parsed.recover(&digest)?, party.canonical_public_key());
        Ok(())
    }

    param_test! {
        rejects_malformed_signatures: [
            empty: (vec![], SignatureError::Length(0)),
            without_recovery_byte: (vec![1; 64], SignatureError::Length(64)),
            recovery_byte_out_of_range: (
                [vec![1; 64], vec![29]].concat(),
                SignatureError::RecoveryByte(29)
            ),
            zero_scalars: ([vec![0; 64], vec![27]].concat(), SignatureError::Scalars),
        ]
    }
    fn rejects_malformed_signatures(bytes: Vec<u8>, expected: SignatureError) {
        assert_eq!(RecoverableSignature::from_bytes(&bytes), Err(expected));
    }
}
