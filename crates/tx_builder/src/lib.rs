// SPDX-License-Identifier: Apache-2.0
//! tx_builder: transaction model, ed25519 key types and the binary codec
//! for safe (UTXO, ghost-key) transactions.

use serde::Serialize;
use thiserror::Error;

mod amount;
mod keys;
mod model;
pub mod serial;

pub use amount::{Amount, AMOUNT_DECIMALS};
pub use keys::{hash_to_scalar, Hash, PrivateKey, PublicKey, Signature};
pub use model::{
    Input, InputSignatures, Output, RawTransaction, ScriptOutput, SignerSlot, ThresholdScript,
    WithdrawalOutput, EXTRA_SIZE_LIMIT, TX_VERSION,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("extra data is too long: {len} bytes")]
    ExtraTooLarge { len: usize },
    #[error("invalid amount {0}")]
    InvalidAmount(String),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid transaction: {0}")]
    Invalid(String),
    #[error("decode: {0}")]
    Decode(String),
}

/// Recipient-level view of one output, as re-derived from an assembled transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OutputView {
    Script {
        amount: Amount,
        threshold: u8,
        key_count: usize,
    },
    Withdrawal {
        amount: Amount,
        address: String,
        tag: Option<String>,
    },
}

/// Inputs and per-output recipient view of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub asset: Hash,
    pub inputs: Vec<Input>,
    pub outputs: Vec<OutputView>,
    pub extra: Vec<u8>,
    pub signed: bool,
}

impl From<&RawTransaction> for TransactionView {
    fn from(tx: &RawTransaction) -> Self {
        let outputs = tx
            .outputs()
            .iter()
            .map(|o| match o {
                Output::Script(s) => OutputView::Script {
                    amount: s.amount,
                    threshold: s.script.threshold(),
                    key_count: s.keys.len(),
                },
                Output::Withdrawal(w) => OutputView::Withdrawal {
                    amount: w.amount,
                    address: w.address.clone(),
                    tag: w.tag.clone(),
                },
            })
            .collect();
        Self {
            asset: *tx.asset(),
            inputs: tx.inputs().to_vec(),
            outputs,
            extra: tx.extra().to_vec(),
            signed: tx.is_signed(),
        }
    }
}

/// Parse a serialized transaction and return its recipient view.
///
/// The blob must re-encode to exactly the same bytes.
pub fn decompose_transaction(blob: &[u8]) -> Result<(RawTransaction, TransactionView), TxError> {
    let tx = RawTransaction::decode(blob)?;
    if tx.marshal().as_slice() != blob {
        return Err(TxError::Decode(
            "serialized bytes mismatch provided blob".into(),
        ));
    }
    let view = TransactionView::from(&tx);
    Ok((tx, view))
}
