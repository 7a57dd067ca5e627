// SPDX-License-Identifier: Apache-2.0
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tx_builder::{Amount, Hash, PublicKey};
use uuid::Uuid;

use crate::TransferError;

/// An unspent output as listed by the network. Referenced, never copied into a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub transaction_hash: Hash,
    pub output_index: u32,
    pub amount: Amount,
    pub asset: Hash,
    /// Network-assigned listing counter; only used by `OutputOrder::BySequence`.
    pub sequence: u64,
}

impl TryFrom<safe_rpc::UnspentOutputEntry> for UnspentOutput {
    type Error = TransferError;

    fn try_from(entry: safe_rpc::UnspentOutputEntry) -> Result<Self, Self::Error> {
        let transaction_hash = entry.transaction_hash.parse().map_err(|e| {
            TransferError::protocol(format!("output {} hash: {e}", entry.output_id))
        })?;
        let asset = entry.asset.parse().map_err(|e| {
            TransferError::protocol(format!("output {} asset: {e}", entry.output_id))
        })?;
        let amount = entry.amount.parse().map_err(|e| {
            TransferError::protocol(format!("output {} amount: {e}", entry.output_id))
        })?;
        Ok(Self {
            transaction_hash,
            output_index: entry.output_index,
            amount,
            asset,
            sequence: entry.sequence,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecipient {
    /// Account ids, in the order their ghost keys appear in the output.
    pub members: Vec<String>,
    pub threshold: u8,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecipient {
    pub destination: String,
    pub tag: Option<String>,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Ghost-key output spendable by `threshold` of `members`.
    Script(ScriptRecipient),
    /// Plain withdrawal to an external chain address.
    Withdrawal(WithdrawalRecipient),
}

impl Recipient {
    pub fn script(members: Vec<String>, threshold: u8, amount: Amount) -> Self {
        Recipient::Script(ScriptRecipient {
            members,
            threshold,
            amount,
        })
    }

    pub fn withdrawal(destination: impl Into<String>, tag: Option<String>, amount: Amount) -> Self {
        Recipient::Withdrawal(WithdrawalRecipient {
            destination: destination.into(),
            tag,
            amount,
        })
    }

    pub fn amount(&self) -> Amount {
        match self {
            Recipient::Script(r) => r.amount,
            Recipient::Withdrawal(r) => r.amount,
        }
    }
}

/// One-time key material for a single output position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostKeys {
    pub mask: PublicKey,
    /// One key per address member, member order.
    pub keys: Vec<PublicKey>,
}

/// Server-side lifecycle of a transaction request keyed by trace id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencerState {
    Unspent,
    Signed,
    Spent,
    Unknown,
}

impl SequencerState {
    /// Unrecognised states map to `Unknown`, which the pipeline treats as terminal.
    pub fn parse(s: &str) -> Self {
        match s {
            "unspent" => SequencerState::Unspent,
            "signed" => SequencerState::Signed,
            "spent" => SequencerState::Spent,
            _ => SequencerState::Unknown,
        }
    }
}

/// Sorted member ids concatenated and hashed; the key the network indexes outputs by.
pub fn members_hash(members: &[String]) -> Hash {
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    Hash::digest(sorted.concat())
}

/// Accepts a canonical (lowercase, hyphenated) UUID asset id, which is hashed
/// into the kernel asset hash, or the 64-hex kernel asset hash itself.
pub fn parse_asset_id(asset_id: &str) -> Result<Hash, TransferError> {
    if let Ok(uuid) = Uuid::parse_str(asset_id) {
        if uuid.hyphenated().to_string() == asset_id {
            return Ok(Hash::digest(asset_id));
        }
    }
    Hash::from_str(asset_id).map_err(|_| TransferError::InvalidAssetId(asset_id.to_string()))
}
