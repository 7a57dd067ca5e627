// SPDX-License-Identifier: Apache-2.0
//! First-fit selection of unspent outputs.

use safe_rpc::{CallContext, OutputsQuery, SafeClient};
use tx_builder::{Amount, Hash};

use crate::{RetryPolicy, TransferError, UnspentOutput};

/// Page size of the single listing request made per selection.
pub const OUTPUTS_PAGE_LIMIT: u32 = 500;

/// Order in which listed outputs are accumulated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputOrder {
    /// Exactly as the listing returned them.
    #[default]
    AsReturned,
    /// Ascending network sequence, oldest first.
    BySequence,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub outputs: Vec<UnspentOutput>,
    pub total: Amount,
    pub change: Amount,
}

/// Source of the unspent outputs owned by an address.
pub trait OutputSource: Sync {
    fn list_unspent(
        &self,
        ctx: &CallContext,
        members_hash: &Hash,
        threshold: u8,
        asset: &Hash,
    ) -> Result<Vec<UnspentOutput>, TransferError>;
}

impl OutputSource for SafeClient {
    fn list_unspent(
        &self,
        ctx: &CallContext,
        members_hash: &Hash,
        threshold: u8,
        asset: &Hash,
    ) -> Result<Vec<UnspentOutput>, TransferError> {
        let query = OutputsQuery {
            members_hash: members_hash.to_hex(),
            threshold,
            asset: asset.to_hex(),
            offset: 0,
            limit: OUTPUTS_PAGE_LIMIT,
        };
        let envelope = self.list_unspent_outputs(ctx, &query)?;
        if let Some(e) = envelope.api_error() {
            return Err(e.clone().into());
        }
        envelope
            .into_entries()
            .into_iter()
            .map(UnspentOutput::try_from)
            .collect()
    }
}

/// Shortest prefix (in `order`) whose sum reaches `target`.
///
/// Once the running sum reaches the target no further outputs are taken and
/// none already taken are dropped, even if a smaller subset would do.
/// A zero target is refused rather than spending the first listed output.
pub fn select_prefix(
    outputs: &[UnspentOutput],
    asset: &Hash,
    target: Amount,
    order: OutputOrder,
) -> Result<Selection, TransferError> {
    if target.is_zero() {
        return Err(TransferError::InvalidAmount("target amount is zero".into()));
    }
    if let Some(foreign) = outputs.iter().find(|o| &o.asset != asset) {
        return Err(TransferError::protocol(format!(
            "listed output {}:{} has asset {}, requested {asset}",
            foreign.transaction_hash, foreign.output_index, foreign.asset
        )));
    }

    let mut ordered: Vec<&UnspentOutput> = outputs.iter().collect();
    if order == OutputOrder::BySequence {
        ordered.sort_by_key(|o| o.sequence);
    }

    let mut total = Amount::ZERO;
    let mut selected = Vec::new();
    for output in ordered {
        total = total
            .checked_add(output.amount)
            .ok_or_else(|| TransferError::InvalidAmount("listed outputs overflow".into()))?;
        selected.push(output.clone());
        if total >= target {
            break;
        }
    }

    match total.checked_sub(target) {
        Some(change) => Ok(Selection {
            outputs: selected,
            total,
            change,
        }),
        None => Err(TransferError::InsufficientFunds {
            available: total,
            requested: target,
        }),
    }
}

/// Lists an address's unspent outputs and picks a first-fit prefix.
pub struct OutputSelector<'a> {
    pub source: &'a dyn OutputSource,
    pub order: OutputOrder,
    pub retry: RetryPolicy,
}

impl<'a> OutputSelector<'a> {
    pub fn new(source: &'a dyn OutputSource) -> Self {
        Self {
            source,
            order: OutputOrder::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn select(
        &self,
        ctx: &CallContext,
        members: &[String],
        threshold: u8,
        asset: &Hash,
        target: Amount,
    ) -> Result<Selection, TransferError> {
        if target.is_zero() {
            return Err(TransferError::InvalidAmount("target amount is zero".into()));
        }
        let members_hash = crate::members_hash(members);
        let listed = self.retry.run(ctx, "list outputs", || {
            self.source.list_unspent(ctx, &members_hash, threshold, asset)
        })?;
        let selection = select_prefix(&listed, asset, target, self.order)?;
        tracing::debug!(
            listed = listed.len(),
            selected = selection.outputs.len(),
            total = %selection.total,
            change = %selection.change,
            "outputs selected"
        );
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Hash {
        Hash::digest("asset")
    }

    fn output(units: u64, sequence: u64) -> UnspentOutput {
        UnspentOutput {
            transaction_hash: Hash::digest(sequence.to_be_bytes()),
            output_index: 0,
            amount: Amount::from_units(units),
            asset: asset(),
            sequence,
        }
    }

    #[test]
    fn takes_first_prefix_reaching_target() {
        let listed = vec![output(5, 1), output(3, 2), output(2, 3)];
        let s = select_prefix(&listed, &asset(), Amount::from_units(6), OutputOrder::AsReturned)
            .unwrap();
        assert_eq!(s.outputs, listed[..2].to_vec());
        assert_eq!(s.total, Amount::from_units(8));
        assert_eq!(s.change, Amount::from_units(2));
    }

    #[test]
    fn exact_match_has_zero_change() {
        let listed = vec![output(5, 1), output(3, 2)];
        let s = select_prefix(&listed, &asset(), Amount::from_units(8), OutputOrder::AsReturned)
            .unwrap();
        assert_eq!(s.outputs.len(), 2);
        assert!(s.change.is_zero());
    }

    #[test]
    fn exhaustion_reports_available_and_requested() {
        let listed = vec![output(5, 1), output(3, 2), output(2, 3)];
        let err =
            select_prefix(&listed, &asset(), Amount::from_units(11), OutputOrder::AsReturned)
                .unwrap_err();
        match err {
            TransferError::InsufficientFunds {
                available,
                requested,
            } => {
                assert_eq!(available, Amount::from_units(10));
                assert_eq!(requested, Amount::from_units(11));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prefix_is_never_trimmed() {
        // [1, 10] with target 10: the single output 10 would suffice, but
        // first-fit keeps the leading 1.
        let listed = vec![output(1, 1), output(10, 2)];
        let s = select_prefix(&listed, &asset(), Amount::from_units(10), OutputOrder::AsReturned)
            .unwrap();
        assert_eq!(s.outputs.len(), 2);
        assert_eq!(s.change, Amount::from_units(1));
    }

    #[test]
    fn by_sequence_orders_ascending() {
        let listed = vec![output(3, 9), output(5, 2)];
        let s = select_prefix(&listed, &asset(), Amount::from_units(4), OutputOrder::BySequence)
            .unwrap();
        assert_eq!(s.outputs, vec![output(5, 2)]);
        let s = select_prefix(&listed, &asset(), Amount::from_units(4), OutputOrder::AsReturned)
            .unwrap();
        assert_eq!(s.outputs.len(), 2);
    }

    #[test]
    fn zero_target_and_foreign_asset_rejected() {
        // A zero target would otherwise consume the first output as change.
        let listed = vec![output(5, 1)];
        assert!(matches!(
            select_prefix(&listed, &asset(), Amount::ZERO, OutputOrder::AsReturned),
            Err(TransferError::InvalidAmount(_))
        ));
        assert!(matches!(
            select_prefix(&listed, &Hash::digest("other"), Amount::from_units(1), OutputOrder::AsReturned),
            Err(TransferError::ProtocolError { .. })
        ));
    }

    #[test]
    fn empty_listing_is_insufficient() {
        let err = select_prefix(&[], &asset(), Amount::from_units(1), OutputOrder::AsReturned)
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientFunds { available, .. } if available.is_zero()
        ));
    }
}
