// SPDX-License-Identifier: Apache-2.0
//! Two-phase verify/submit exchange with the sequencer.
//!
//! Both phases are keyed by the trace id, so re-issuing either call for the
//! same logical transaction is safe. Verify returns the request state and one
//! view key per input; submit echoes the raw transaction it accepted.

use safe_rpc::{CallContext, Envelope, RpcError, SafeClient, SequencerEntry, TransactionRequest};
use tx_builder::RawTransaction;

use crate::signer::ViewKey;
use crate::{RetryPolicy, SequencerState, TransferError};

/// Transport for the two sequencer calls.
pub trait Sequencer {
    fn verify_raw(
        &self,
        ctx: &CallContext,
        request: &TransactionRequest,
    ) -> Result<Envelope<SequencerEntry>, RpcError>;

    fn submit_raw(
        &self,
        ctx: &CallContext,
        request: &TransactionRequest,
    ) -> Result<Envelope<SequencerEntry>, RpcError>;
}

impl Sequencer for SafeClient {
    fn verify_raw(
        &self,
        ctx: &CallContext,
        request: &TransactionRequest,
    ) -> Result<Envelope<SequencerEntry>, RpcError> {
        self.create_transaction_requests(ctx, std::slice::from_ref(request))
    }

    fn submit_raw(
        &self,
        ctx: &CallContext,
        request: &TransactionRequest,
    ) -> Result<Envelope<SequencerEntry>, RpcError> {
        self.submit_transactions(ctx, std::slice::from_ref(request))
    }
}

/// Outcome of the verify phase.
#[derive(Debug)]
pub enum Verification {
    /// Fresh request; one view key per input, ready to sign.
    Ready(Vec<ViewKey>),
    /// The trace id was already processed; nothing more to do.
    AlreadyProcessed(SequencerState),
}

pub struct SequencerProtocol<'a> {
    sequencer: &'a dyn Sequencer,
    retry: RetryPolicy,
}

impl<'a> SequencerProtocol<'a> {
    pub fn new(sequencer: &'a dyn Sequencer) -> Self {
        Self {
            sequencer,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn verify(
        &self,
        ctx: &CallContext,
        trace_id: &str,
        tx: &RawTransaction,
    ) -> Result<Verification, TransferError> {
        let request = TransactionRequest {
            request_id: trace_id.to_string(),
            raw: hex::encode(tx.marshal()),
        };
        let entry = self.retry.run(ctx, "verify", || {
            single_entry(trace_id, self.sequencer.verify_raw(ctx, &request)?)
        })?;

        let state = SequencerState::parse(&entry.state);
        if state != SequencerState::Unspent {
            tracing::info!(trace_id, state = %entry.state, "transaction request already processed");
            return Ok(Verification::AlreadyProcessed(state));
        }

        let views = entry.views.unwrap_or_default();
        let expected = tx.inputs().len();
        if views.len() != expected {
            return Err(TransferError::ViewKeyCountMismatch {
                expected,
                got: views.len(),
            });
        }
        let views = views
            .iter()
            .map(|v| ViewKey::from_hex(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Verification::Ready(views))
    }

    /// Submits the signed transaction and checks the echo byte for byte.
    pub fn submit(
        &self,
        ctx: &CallContext,
        trace_id: &str,
        tx: &RawTransaction,
    ) -> Result<SequencerState, TransferError> {
        let sent = tx.marshal();
        let request = TransactionRequest {
            request_id: trace_id.to_string(),
            raw: hex::encode(&sent),
        };
        let entry = self.retry.run(ctx, "submit", || {
            single_entry(trace_id, self.sequencer.submit_raw(ctx, &request)?)
        })?;

        let echoed = hex::decode(&entry.raw_transaction).map_err(|e| {
            TransferError::protocol(format!("submit echo is not hex: {e}"))
        })?;
        if echoed != sent {
            tracing::error!(trace_id, "sequencer echoed a different raw transaction");
            return Err(TransferError::IntegrityMismatch);
        }
        Ok(SequencerState::parse(&entry.state))
    }
}

/// Exactly one entry for our request; server errors surface verbatim.
fn single_entry(
    trace_id: &str,
    envelope: Envelope<SequencerEntry>,
) -> Result<SequencerEntry, TransferError> {
    if let Some(e) = envelope.api_error() {
        return Err(e.clone().into());
    }
    let mut entries = envelope.into_entries();
    if entries.len() != 1 {
        return Err(TransferError::protocol(format!(
            "expected 1 sequencer entry, got {}",
            entries.len()
        )));
    }
    let entry = entries.remove(0);
    // Entries may omit request_id; a present one must match.
    if !entry.request_id.is_empty() && entry.request_id != trace_id {
        return Err(TransferError::protocol(format!(
            "sequencer answered for request {}, sent {trace_id}",
            entry.request_id
        )));
    }
    Ok(entry)
}
