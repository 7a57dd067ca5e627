// SPDX-License-Identifier: Apache-2.0
use rayon::prelude::*;
use safe_rpc::CallContext;
use tx_builder::{
    Amount, Hash, Input, Output, RawTransaction, ScriptOutput, ThresholdScript, TransactionView,
    WithdrawalOutput, EXTRA_SIZE_LIMIT,
};

use crate::ghost::{validate_address, GhostKeyProvider};
use crate::{Recipient, TransferError, UnspentOutput};

/// Assembles the unsigned transaction spending `inputs` to `recipients`.
///
/// Script recipients get ghost position indices `0..N-1` in recipient order,
/// withdrawals take no index. Positions are resolved in parallel; outputs keep
/// recipient order. The outputs must spend the inputs exactly, so any change
/// is expected as a trailing script recipient.
pub fn build_transaction(
    ctx: &CallContext,
    provider: &dyn GhostKeyProvider,
    asset: &Hash,
    inputs: &[UnspentOutput],
    recipients: &[Recipient],
    memo: &[u8],
) -> Result<RawTransaction, TransferError> {
    if memo.len() > EXTRA_SIZE_LIMIT {
        return Err(TransferError::ExtraTooLarge { len: memo.len() });
    }
    if recipients.is_empty() {
        return Err(TransferError::InvalidAmount("no recipients".into()));
    }
    if let Some(foreign) = inputs.iter().find(|o| &o.asset != asset) {
        return Err(TransferError::protocol(format!(
            "input {}:{} is not asset {asset}",
            foreign.transaction_hash, foreign.output_index
        )));
    }

    for recipient in recipients {
        if recipient.amount().is_zero() {
            return Err(TransferError::InvalidAmount("zero recipient amount".into()));
        }
        match recipient {
            Recipient::Script(r) => validate_address(&r.members, r.threshold)?,
            Recipient::Withdrawal(w) if w.destination.is_empty() => {
                return Err(TransferError::InvalidAddress("empty withdrawal destination".into()))
            }
            Recipient::Withdrawal(_) => {}
        }
    }

    let spent = Amount::checked_sum(inputs.iter().map(|o| o.amount))
        .ok_or_else(|| TransferError::InvalidAmount("input sum overflows".into()))?;
    let paid = Amount::checked_sum(recipients.iter().map(Recipient::amount))
        .ok_or_else(|| TransferError::InvalidAmount("output sum overflows".into()))?;
    if spent != paid {
        return Err(TransferError::InvalidAmount(format!(
            "outputs {paid} do not spend inputs {spent}"
        )));
    }

    let scripts: Vec<_> = recipients
        .iter()
        .filter_map(|r| match r {
            Recipient::Script(s) => Some(s),
            Recipient::Withdrawal(_) => None,
        })
        .collect();
    let index_limit = u32::try_from(scripts.len())
        .map_err(|_| TransferError::InvalidAmount("too many recipients".into()))?;
    let ghosts = scripts
        .par_iter()
        .zip((0..index_limit).into_par_iter())
        .map(|(s, index)| provider.resolve(ctx, &s.members, s.threshold, index))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ghosts = ghosts.into_iter();
    let mut outputs = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let output = match recipient {
            Recipient::Script(s) => {
                let ghost = ghosts
                    .next()
                    .ok_or_else(|| TransferError::protocol("ghost keys missing for output"))?;
                if ghost.keys.len() != s.members.len() {
                    return Err(TransferError::protocol(format!(
                        "{} ghost keys for {} members",
                        ghost.keys.len(),
                        s.members.len()
                    )));
                }
                Output::Script(ScriptOutput {
                    amount: s.amount,
                    keys: ghost.keys,
                    mask: ghost.mask,
                    script: ThresholdScript::new(s.threshold),
                })
            }
            Recipient::Withdrawal(w) => Output::Withdrawal(WithdrawalOutput {
                amount: w.amount,
                address: w.destination.clone(),
                tag: w.tag.clone(),
            }),
        };
        outputs.push(output);
    }

    let inputs = inputs
        .iter()
        .map(|o| Input {
            hash: o.transaction_hash,
            index: o.output_index,
        })
        .collect();
    let tx = RawTransaction::assemble(*asset, inputs, outputs, memo.to_vec())?;
    tracing::debug!(
        inputs = tx.inputs().len(),
        outputs = tx.outputs().len(),
        extra = memo.len(),
        "transaction assembled"
    );
    Ok(tx)
}

/// Inputs and per-output recipient view of an assembled transaction.
pub fn decompose(tx: &RawTransaction) -> TransactionView {
    TransactionView::from(tx)
}
