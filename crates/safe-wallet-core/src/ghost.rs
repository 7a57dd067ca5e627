// SPDX-License-Identifier: Apache-2.0
//! One-time ("ghost") destination keys for script outputs.
//!
//! For a recipient with view key `V = a·G` and spend key `S = b·G`, output
//! position `i` uses a fresh scalar `r`:
//!
//! ```text
//! mask = r·G
//! key  = Hs(r·V ‖ i)·G + S
//! ```
//!
//! The recipient recovers the private key as `Hs(a·mask ‖ i) + b`.

use std::collections::{HashMap, HashSet};

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use safe_rpc::{CallContext, GhostKeyRequest, SafeClient};
use tx_builder::{hash_to_scalar, PrivateKey, PublicKey};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{GhostKeys, RetryPolicy, TransferError};

/// Resolves the one-time keys of one script output position.
///
/// Implementations are shared across the builder's worker threads.
pub trait GhostKeyProvider: Sync {
    fn resolve(
        &self,
        ctx: &CallContext,
        members: &[String],
        threshold: u8,
        index: u32,
    ) -> Result<GhostKeys, TransferError>;
}

/// Members must be non-empty and distinct, with `1 <= threshold <= members`.
pub fn validate_address(members: &[String], threshold: u8) -> Result<(), TransferError> {
    if members.is_empty() {
        return Err(TransferError::InvalidAddress("no members".into()));
    }
    let mut seen = HashSet::with_capacity(members.len());
    if let Some(dup) = members.iter().find(|m| !seen.insert(m.as_str())) {
        return Err(TransferError::InvalidAddress(format!("duplicate member {dup}")));
    }
    if threshold == 0 || threshold as usize > members.len() {
        return Err(TransferError::InvalidAddress(format!(
            "threshold {threshold} out of range for {} members",
            members.len()
        )));
    }
    Ok(())
}

/// Hint the network keys its one-time material by; stable per (trace, index).
pub fn ghost_hint(trace: &Uuid, index: u32) -> Uuid {
    Uuid::new_v5(trace, format!("OUTPUT:{index}").as_bytes())
}

/// Trace ids are usually UUIDs; anything else is mapped into one.
pub fn trace_namespace(trace_id: &str) -> Uuid {
    Uuid::parse_str(trace_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, trace_id.as_bytes()))
}

/// Asks the network for ghost keys via `POST /safe/keys`.
pub struct RemoteGhostKeys {
    client: SafeClient,
    trace: Uuid,
    retry: RetryPolicy,
}

impl RemoteGhostKeys {
    pub fn new(client: SafeClient, trace_id: &str) -> Self {
        Self {
            client,
            trace: trace_namespace(trace_id),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(
        &self,
        ctx: &CallContext,
        members: &[String],
        index: u32,
    ) -> Result<GhostKeys, TransferError> {
        let request = GhostKeyRequest {
            receivers: members.to_vec(),
            index,
            hint: ghost_hint(&self.trace, index).to_string(),
        };
        let envelope = self
            .client
            .request_ghost_keys(ctx, std::slice::from_ref(&request))?;
        if let Some(e) = envelope.api_error() {
            return Err(e.clone().into());
        }
        let mut entries = envelope.into_entries();
        if entries.len() != 1 {
            return Err(TransferError::protocol(format!(
                "ghost keys for index {index}: expected 1 entry, got {}",
                entries.len()
            )));
        }
        let entry = entries.remove(0);
        if entry.keys.len() != members.len() {
            return Err(TransferError::protocol(format!(
                "ghost keys for index {index}: {} keys for {} members",
                entry.keys.len(),
                members.len()
            )));
        }
        let mask = entry
            .mask
            .parse()
            .map_err(|e| TransferError::protocol(format!("ghost mask: {e}")))?;
        let keys = entry
            .keys
            .iter()
            .map(|k| k.parse())
            .collect::<Result<Vec<PublicKey>, _>>()
            .map_err(|e| TransferError::protocol(format!("ghost key: {e}")))?;
        Ok(GhostKeys { mask, keys })
    }
}

impl GhostKeyProvider for RemoteGhostKeys {
    fn resolve(
        &self,
        ctx: &CallContext,
        members: &[String],
        threshold: u8,
        index: u32,
    ) -> Result<GhostKeys, TransferError> {
        validate_address(members, threshold)?;
        self.retry
            .run(ctx, "ghost keys", || self.request(ctx, members, index))
    }
}

/// Public view and spend keys of an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberKeys {
    pub view: PublicKey,
    pub spend: PublicKey,
}

/// Derives ghost keys locally for members whose public keys are known.
pub struct LocalGhostKeys {
    directory: HashMap<String, MemberKeys>,
    seed: Zeroizing<[u8; 32]>,
}

impl LocalGhostKeys {
    /// `seed` makes the derivation reproducible for a retried attempt.
    pub fn new(directory: HashMap<String, MemberKeys>, seed: [u8; 32]) -> Self {
        Self {
            directory,
            seed: Zeroizing::new(seed),
        }
    }

    fn derive(&self, members: &[String], index: u32) -> Result<GhostKeys, TransferError> {
        let r = Zeroizing::new(hash_to_scalar(&[self.seed.as_slice(), &index.to_be_bytes()]));
        let mask = PublicKey::from_point(&EdwardsPoint::mul_base(&r));
        let keys = members
            .iter()
            .map(|member| {
                let known = self.directory.get(member).ok_or_else(|| {
                    TransferError::InvalidAddress(format!("no public keys for member {member}"))
                })?;
                let (Some(view), Some(spend)) = (known.view.to_point(), known.spend.to_point())
                else {
                    return Err(TransferError::InvalidAddress(format!(
                        "member {member} has an invalid public key"
                    )));
                };
                let shared = (*r * view).compress();
                let h = hash_to_scalar(&[shared.as_bytes(), &index.to_be_bytes()]);
                Ok(PublicKey::from_point(&(EdwardsPoint::mul_base(&h) + spend)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GhostKeys { mask, keys })
    }
}

impl GhostKeyProvider for LocalGhostKeys {
    fn resolve(
        &self,
        ctx: &CallContext,
        members: &[String],
        threshold: u8,
        index: u32,
    ) -> Result<GhostKeys, TransferError> {
        validate_address(members, threshold)?;
        ctx.check()?;
        self.derive(members, index)
    }
}

/// Recipient side: the private key behind the ghost key at `index`.
pub fn derive_ghost_private(
    view_private: &Scalar,
    spend_private: &Scalar,
    mask: &PublicKey,
    index: u32,
) -> Result<PrivateKey, TransferError> {
    let r = mask
        .to_point()
        .ok_or_else(|| TransferError::InvalidKey("mask is not a curve point".into()))?;
    let shared = (view_private * r).compress();
    let h = hash_to_scalar(&[shared.as_bytes(), &index.to_be_bytes()]);
    Ok(PrivateKey::from_scalar(h + spend_private))
}
