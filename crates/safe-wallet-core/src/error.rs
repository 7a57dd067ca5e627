// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for a transfer attempt.

use safe_rpc::{ApiError, RpcError};
use thiserror::Error;
use tx_builder::{Amount, TxError};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid asset id {0}")]
    InvalidAssetId(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient outputs: available {available}, requested {requested}")]
    InsufficientFunds { available: Amount, requested: Amount },
    #[error("extra data is too long: {len} bytes")]
    ExtraTooLarge { len: usize },
    #[error("invalid view keys count: expected {expected}, got {got}")]
    ViewKeyCountMismatch { expected: usize, got: usize },
    #[error("sequencer echoed a raw transaction different from the one submitted")]
    IntegrityMismatch,
    #[error("protocol error: {reason}")]
    ProtocolError { reason: String },
    #[error("server error {code}: {description}")]
    ServerError { code: i64, description: String },
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Transport(#[from] RpcError),
}

impl TransferError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        TransferError::ProtocolError {
            reason: reason.into(),
        }
    }

    /// Only transport-level failures are worth re-issuing with the same trace id.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::Transport(e) if e.is_transient())
    }
}

impl From<ApiError> for TransferError {
    fn from(e: ApiError) -> Self {
        TransferError::ServerError {
            code: e.code,
            description: e.description,
        }
    }
}

impl From<TxError> for TransferError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::ExtraTooLarge { len } => TransferError::ExtraTooLarge { len },
            TxError::InvalidAmount(msg) => TransferError::InvalidAmount(msg),
            TxError::InvalidHex(msg) | TxError::Invalid(msg) | TxError::Decode(msg) => {
                TransferError::ProtocolError { reason: msg }
            }
        }
    }
}
