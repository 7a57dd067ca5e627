// SPDX-License-Identifier: Apache-2.0
//! Per-input signing keys and signatures.
//!
//! The sequencer returns one view scalar `x` per input. The spend scalar `y`
//! is expanded from the user's spend seed the way Ed25519 expands a seed, and
//! the input is signed with `k = x + y`. `k·G` is the ghost key of the output
//! being spent, so signatures verify with the plain Ed25519 equation.

use std::fmt;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::{clamp_integer, Scalar};
use sha2::{Digest, Sha512};
use tx_builder::{Hash, InputSignatures, PrivateKey, PublicKey, RawTransaction};
use zeroize::Zeroizing;

use crate::{SpendKey, TransferError};

/// View scalar for one input, as returned by the sequencer. Never persisted.
#[derive(Clone)]
pub struct ViewKey(Zeroizing<[u8; 32]>);

impl ViewKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_hex(value: &str) -> Result<Self, TransferError> {
        let bytes = Zeroizing::new(
            hex::decode(value).map_err(|e| TransferError::InvalidKey(format!("view key: {e}")))?,
        );
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            TransferError::InvalidKey(format!("view key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// The scalar, which must be canonically encoded.
    fn scalar(&self) -> Result<Zeroizing<Scalar>, TransferError> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(*self.0))
            .map(Zeroizing::new)
            .ok_or_else(|| TransferError::InvalidKey("view key is not a canonical scalar".into()))
    }
}

impl fmt::Debug for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ViewKey(..)")
    }
}

/// `clamp(SHA-512(seed)[..32]) mod ℓ`
pub fn expand_spend_key(spend: &SpendKey) -> Zeroizing<Scalar> {
    let mut digest = Zeroizing::new([0u8; 64]);
    digest.copy_from_slice(&Sha512::digest(spend.as_bytes()));
    let mut lower = Zeroizing::new([0u8; 32]);
    lower.copy_from_slice(&digest[..32]);
    Zeroizing::new(Scalar::from_bytes_mod_order(clamp_integer(*lower)))
}

/// Public counterpart of the expanded spend scalar.
pub fn spend_public_key(spend: &SpendKey) -> PublicKey {
    PublicKey::from_point(&EdwardsPoint::mul_base(&expand_spend_key(spend)))
}

/// `k = x + y` for one input.
pub fn derive_signing_key(view: &ViewKey, spend: &SpendKey) -> Result<PrivateKey, TransferError> {
    let x = view.scalar()?;
    let y = expand_spend_key(spend);
    Ok(PrivateKey::from_scalar(*x + *y))
}

/// One single-slot signature group per view key, in input order.
pub fn sign_inputs(
    payload_hash: &Hash,
    views: &[ViewKey],
    spend: &SpendKey,
) -> Result<Vec<InputSignatures>, TransferError> {
    views
        .iter()
        .map(|view| {
            let key = derive_signing_key(view, spend)?;
            Ok(InputSignatures::single(key.sign(payload_hash)))
        })
        .collect()
}

/// Signs every input of `tx` over its payload hash.
///
/// The view key count is checked before anything is signed.
pub fn sign_transaction(
    tx: &mut RawTransaction,
    views: &[ViewKey],
    spend: &SpendKey,
) -> Result<(), TransferError> {
    if views.len() != tx.inputs().len() {
        return Err(TransferError::ViewKeyCountMismatch {
            expected: tx.inputs().len(),
            got: views.len(),
        });
    }
    let signatures = sign_inputs(&tx.payload_hash(), views, spend)?;
    tx.attach_signatures(signatures)?;
    Ok(())
}
