// SPDX-License-Identifier: Apache-2.0
use safe_rpc::{CallContext, SafeClient};
use tx_builder::{Amount, Hash, EXTRA_SIZE_LIMIT};

use crate::builder::build_transaction;
use crate::ghost::{GhostKeyProvider, RemoteGhostKeys};
use crate::selection::{OutputOrder, OutputSelector, OutputSource};
use crate::sequencer::{Sequencer, SequencerProtocol, Verification};
use crate::signer::sign_transaction;
use crate::{parse_asset_id, Recipient, RetryPolicy, SafeUser, SequencerState, TransferError};

/// One logical payment. Re-sending the same request with the same trace id
/// never produces a second transaction.
#[derive(Clone, Debug)]
pub struct TransferRequest {
    /// Canonical UUID asset id or 64-hex kernel asset hash.
    pub asset_id: String,
    pub recipients: Vec<Recipient>,
    pub trace_id: String,
    /// Goes into the transaction's extra field; at most 512 bytes.
    pub memo: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Submitted {
        trace_id: String,
        transaction_hash: Hash,
        state: SequencerState,
    },
    /// The sequencer already knows this trace id; nothing was signed or sent.
    AlreadyProcessed {
        trace_id: String,
        state: SequencerState,
    },
}

/// Select, build, verify, sign and submit, in that order.
pub struct Pipeline<'a> {
    pub outputs: &'a dyn OutputSource,
    pub ghosts: &'a dyn GhostKeyProvider,
    pub sequencer: &'a dyn Sequencer,
    pub order: OutputOrder,
    pub retry: RetryPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        outputs: &'a dyn OutputSource,
        ghosts: &'a dyn GhostKeyProvider,
        sequencer: &'a dyn Sequencer,
    ) -> Self {
        Self {
            outputs,
            ghosts,
            sequencer,
            order: OutputOrder::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn send(
        &self,
        ctx: &CallContext,
        user: &SafeUser,
        request: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        let _span = tracing::info_span!("transfer", trace_id = %request.trace_id).entered();

        let asset = parse_asset_id(&request.asset_id)?;
        if request.memo.len() > EXTRA_SIZE_LIMIT {
            return Err(TransferError::ExtraTooLarge {
                len: request.memo.len(),
            });
        }
        if request.recipients.is_empty() {
            return Err(TransferError::InvalidAmount("no recipients".into()));
        }
        if request.recipients.iter().any(|r| r.amount().is_zero()) {
            return Err(TransferError::InvalidAmount("zero recipient amount".into()));
        }
        let target = Amount::checked_sum(request.recipients.iter().map(Recipient::amount))
            .ok_or_else(|| TransferError::InvalidAmount("total amount overflows".into()))?;

        let owner = vec![user.user_id.clone()];
        let selector = OutputSelector {
            source: self.outputs,
            order: self.order,
            retry: self.retry.clone(),
        };
        let selection = selector.select(ctx, &owner, 1, &asset, target)?;

        let mut recipients = request.recipients.clone();
        if !selection.change.is_zero() {
            recipients.push(Recipient::script(owner, 1, selection.change));
        }

        let mut tx = build_transaction(
            ctx,
            self.ghosts,
            &asset,
            &selection.outputs,
            &recipients,
            &request.memo,
        )?;

        let protocol = SequencerProtocol::new(self.sequencer).with_retry(self.retry.clone());
        let views = match protocol.verify(ctx, &request.trace_id, &tx)? {
            Verification::Ready(views) => views,
            Verification::AlreadyProcessed(state) => {
                return Ok(TransferOutcome::AlreadyProcessed {
                    trace_id: request.trace_id.clone(),
                    state,
                })
            }
        };

        sign_transaction(&mut tx, &views, user.spend_key())?;
        let state = protocol.submit(ctx, &request.trace_id, &tx)?;
        let transaction_hash = tx.payload_hash();
        tracing::info!(%transaction_hash, ?state, "transaction submitted");
        Ok(TransferOutcome::Submitted {
            trace_id: request.trace_id.clone(),
            transaction_hash,
            state,
        })
    }
}

/// Runs the pipeline against the network with remote ghost keys.
pub fn send_transaction(
    ctx: &CallContext,
    client: &SafeClient,
    user: &SafeUser,
    request: &TransferRequest,
) -> Result<TransferOutcome, TransferError> {
    let ghosts = RemoteGhostKeys::new(client.clone(), &request.trace_id);
    Pipeline::new(client, &ghosts, client).send(ctx, user, request)
}
