// SPDX-License-Identifier: Apache-2.0
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use safe_rpc::{Envelope, RpcError, SequencerEntry, TransactionRequest};
use safe_wallet_core::signer::expand_spend_key;
use safe_wallet_core::{
    derive_ghost_private, parse_asset_id, spend_public_key, CallContext, GhostKeyProvider,
    LocalGhostKeys, MemberKeys, OutputSource, Pipeline, Recipient, RetryPolicy, SafeUser,
    Sequencer, SequencerState, SpendKey, TransferError, TransferOutcome, TransferRequest,
    UnspentOutput,
};
use tx_builder::{hash_to_scalar, Amount, Hash, Input, Output, PublicKey, RawTransaction};

const ASSET_ID: &str = "c6d0c728-2624-429b-8e0d-d9d19b6592fa";
const USER: &str = "44d9717d-8cae-4004-98a1-f9ad544dcfb1";
const BOB: &str = "e9e5b807-fa8b-455a-8dfa-b189d28310ff";
const TRACE: &str = "5f5e0d1a-8f0c-4f43-9d2d-0a2c3f1e6b7a";
const SESSION_KEY: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

fn coins(n: u64) -> Amount {
    Amount::from_units(n * 100_000_000)
}

/// An account with known private view scalar and spend seed.
struct Account {
    view: Scalar,
    spend: SpendKey,
}

impl Account {
    fn new(n: u8) -> Self {
        Self {
            view: Scalar::from(9000 + n as u64),
            spend: SpendKey::from_bytes([n; 32]),
        }
    }

    fn public(&self) -> MemberKeys {
        MemberKeys {
            view: PublicKey::from_point(&EdwardsPoint::mul_base(&self.view)),
            spend: spend_public_key(&self.spend),
        }
    }
}

/// Unspent outputs owned by the user, each locked to a ghost key.
struct Ledger {
    outputs: Vec<UnspentOutput>,
    /// (mask, position, ghost key) of the output each input refers to.
    origins: HashMap<Input, (PublicKey, u32, PublicKey)>,
    listings: AtomicUsize,
}

impl Ledger {
    fn fund(owner: &Account, amounts: &[Amount]) -> Self {
        let funding = LocalGhostKeys::new(
            HashMap::from([(USER.to_string(), owner.public())]),
            [0x5a; 32],
        );
        let asset = parse_asset_id(ASSET_ID).unwrap();
        let hash = Hash::digest("funding transaction");
        let mut outputs = Vec::new();
        let mut origins = HashMap::new();
        for (i, amount) in amounts.iter().enumerate() {
            let index = i as u32;
            let ghost = funding
                .resolve(&CallContext::new(), &[USER.to_string()], 1, index)
                .unwrap();
            outputs.push(UnspentOutput {
                transaction_hash: hash,
                output_index: index,
                amount: *amount,
                asset,
                sequence: 100 + index as u64,
            });
            origins.insert(Input { hash, index }, (ghost.mask, index, ghost.keys[0]));
        }
        Self {
            outputs,
            origins,
            listings: AtomicUsize::new(0),
        }
    }
}

impl OutputSource for Ledger {
    fn list_unspent(
        &self,
        _ctx: &CallContext,
        _members_hash: &Hash,
        _threshold: u8,
        _asset: &Hash,
    ) -> Result<Vec<UnspentOutput>, TransferError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.outputs.clone())
    }
}

/// Sequencer that knows the user's private view scalar, like the real network.
struct Network<'a> {
    ledger: &'a Ledger,
    view: Scalar,
    drop_a_view: bool,
    submitted: RefCell<HashMap<String, RawTransaction>>,
    verifies: RefCell<usize>,
}

impl<'a> Network<'a> {
    fn new(ledger: &'a Ledger, owner: &Account) -> Self {
        Self {
            ledger,
            view: owner.view,
            drop_a_view: false,
            submitted: RefCell::default(),
            verifies: RefCell::new(0),
        }
    }

    fn respond(
        request: &TransactionRequest,
        state: &str,
        views: Option<Vec<String>>,
    ) -> Envelope<SequencerEntry> {
        Envelope {
            data: Some(vec![SequencerEntry {
                request_id: request.request_id.clone(),
                raw_transaction: request.raw.clone(),
                state: state.to_string(),
                views,
            }]),
            error: None,
        }
    }
}

impl Sequencer for Network<'_> {
    fn verify_raw(
        &self,
        _ctx: &CallContext,
        request: &TransactionRequest,
    ) -> Result<Envelope<SequencerEntry>, RpcError> {
        *self.verifies.borrow_mut() += 1;
        if self.submitted.borrow().contains_key(&request.request_id) {
            return Ok(Self::respond(request, "spent", None));
        }
        let raw = hex::decode(&request.raw).map_err(|e| RpcError::Decode(e.to_string()))?;
        let tx = RawTransaction::decode(&raw).map_err(|e| RpcError::Decode(e.to_string()))?;
        let mut views: Vec<String> = tx
            .inputs()
            .iter()
            .map(|input| {
                let (mask, index, _) = self.ledger.origins[input];
                let shared = (self.view * mask.to_point().unwrap()).compress();
                let x = hash_to_scalar(&[shared.as_bytes(), &index.to_be_bytes()]);
                hex::encode(x.to_bytes())
            })
            .collect();
        if self.drop_a_view {
            views.pop();
        }
        Ok(Self::respond(request, "unspent", Some(views)))
    }

    fn submit_raw(
        &self,
        _ctx: &CallContext,
        request: &TransactionRequest,
    ) -> Result<Envelope<SequencerEntry>, RpcError> {
        let raw = hex::decode(&request.raw).map_err(|e| RpcError::Decode(e.to_string()))?;
        let tx = RawTransaction::decode(&raw).map_err(|e| RpcError::Decode(e.to_string()))?;
        let message = tx.payload_hash();
        for (input, group) in tx.inputs().iter().zip(tx.signatures()) {
            let (_, _, ghost) = self.ledger.origins[input];
            let slot = group.slots()[0];
            assert!(slot.signature.verify(&ghost, &message), "bad signature for {input:?}");
        }
        self.submitted
            .borrow_mut()
            .insert(request.request_id.clone(), tx);
        Ok(Self::respond(request, "spent", None))
    }
}

fn user(account: &Account) -> SafeUser {
    SafeUser::new(USER, "session", SESSION_KEY, account.spend.clone())
}

fn request(amount: Amount, memo: &[u8]) -> TransferRequest {
    TransferRequest {
        asset_id: ASSET_ID.to_string(),
        recipients: vec![Recipient::script(vec![BOB.to_string()], 1, amount)],
        trace_id: TRACE.to_string(),
        memo: memo.to_vec(),
    }
}

#[test]
fn transfer_signs_with_view_plus_spend_and_pays_change_back() -> Result<()> {
    let me = Account::new(1);
    let bob = Account::new(2);
    let ledger = Ledger::fund(&me, &[coins(1), coins(1), coins(1)]);
    let network = Network::new(&ledger, &me);
    let ghosts = LocalGhostKeys::new(
        HashMap::from([(USER.to_string(), me.public()), (BOB.to_string(), bob.public())]),
        [0x77; 32],
    );
    let pipeline = Pipeline::new(&ledger, &ghosts, &network);

    let amount = Amount::from_units(150_000_000);
    let outcome = pipeline.send(&CallContext::new(), &user(&me), &request(amount, b"rent"))?;
    let TransferOutcome::Submitted {
        transaction_hash,
        state,
        ..
    } = outcome.clone()
    else {
        panic!("expected a submitted transfer, got {outcome:?}");
    };
    assert_eq!(state, SequencerState::Spent);

    let submitted = network.submitted.borrow();
    let tx = &submitted[TRACE];
    assert_eq!(tx.payload_hash(), transaction_hash);
    assert_eq!(tx.inputs().len(), 2, "first-fit prefix of [1, 1, 1] for 1.5");
    assert_eq!(tx.extra(), b"rent");
    assert_eq!(tx.outputs().len(), 2);

    // Position 0 pays bob, position 1 returns the change to the user.
    let (Output::Script(paid), Output::Script(change)) = (&tx.outputs()[0], &tx.outputs()[1])
    else {
        panic!("expected two script outputs");
    };
    assert_eq!(paid.amount, amount);
    assert_eq!(change.amount, Amount::from_units(50_000_000));
    let bob_key = derive_ghost_private(&bob.view, &expand_spend_key(&bob.spend), &paid.mask, 0)?;
    assert_eq!(bob_key.public_key(), paid.keys[0]);
    let my_key = derive_ghost_private(&me.view, &expand_spend_key(&me.spend), &change.mask, 1)?;
    assert_eq!(my_key.public_key(), change.keys[0]);
    Ok(())
}

#[test]
fn retrying_a_trace_id_never_submits_twice() -> Result<()> {
    let me = Account::new(1);
    let ledger = Ledger::fund(&me, &[coins(2)]);
    let network = Network::new(&ledger, &me);
    let ghosts = LocalGhostKeys::new(
        HashMap::from([(USER.to_string(), me.public()), (BOB.to_string(), Account::new(2).public())]),
        [0x77; 32],
    );
    let pipeline = Pipeline::new(&ledger, &ghosts, &network);
    let ctx = CallContext::new();

    let first = pipeline.send(&ctx, &user(&me), &request(coins(1), b""))?;
    assert!(matches!(first, TransferOutcome::Submitted { .. }));
    let second = pipeline.send(&ctx, &user(&me), &request(coins(1), b""))?;
    assert_eq!(
        second,
        TransferOutcome::AlreadyProcessed {
            trace_id: TRACE.to_string(),
            state: SequencerState::Spent,
        }
    );
    assert_eq!(network.submitted.borrow().len(), 1);
    assert_eq!(*network.verifies.borrow(), 2);
    Ok(())
}

#[test]
fn missing_view_key_stops_before_signing() {
    let me = Account::new(1);
    let ledger = Ledger::fund(&me, &[coins(1), coins(1), coins(1)]);
    let mut network = Network::new(&ledger, &me);
    network.drop_a_view = true;
    let ghosts = LocalGhostKeys::new(
        HashMap::from([(USER.to_string(), me.public()), (BOB.to_string(), Account::new(2).public())]),
        [0x77; 32],
    );
    let pipeline = Pipeline::new(&ledger, &ghosts, &network);

    let err = pipeline
        .send(&CallContext::new(), &user(&me), &request(coins(3), b""))
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::ViewKeyCountMismatch {
            expected: 3,
            got: 2
        }
    ));
    assert!(network.submitted.borrow().is_empty());
}

#[test]
fn insufficient_funds_stop_before_the_sequencer() {
    let me = Account::new(1);
    let ledger = Ledger::fund(&me, &[coins(5), coins(3), coins(2)]);
    let network = Network::new(&ledger, &me);
    let ghosts = LocalGhostKeys::new(HashMap::new(), [0; 32]);
    let pipeline = Pipeline::new(&ledger, &ghosts, &network);

    let err = pipeline
        .send(&CallContext::new(), &user(&me), &request(coins(11), b""))
        .unwrap_err();
    match err {
        TransferError::InsufficientFunds {
            available,
            requested,
        } => {
            assert_eq!(available, coins(10));
            assert_eq!(requested, coins(11));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(*network.verifies.borrow(), 0);
}

#[test]
fn oversized_memo_fails_before_any_network_call() {
    let me = Account::new(1);
    let ledger = Ledger::fund(&me, &[coins(1)]);
    let network = Network::new(&ledger, &me);
    let ghosts = LocalGhostKeys::new(HashMap::new(), [0; 32]);
    let pipeline = Pipeline::new(&ledger, &ghosts, &network);

    let err = pipeline
        .send(&CallContext::new(), &user(&me), &request(coins(1), &[b'x'; 513]))
        .unwrap_err();
    assert!(matches!(err, TransferError::ExtraTooLarge { len: 513 }));
    assert_eq!(ledger.listings.load(Ordering::SeqCst), 0);
    assert_eq!(*network.verifies.borrow(), 0);
}

#[test]
fn cancelled_context_aborts_the_transfer() {
    let me = Account::new(1);
    let ledger = Ledger::fund(&me, &[coins(1)]);
    let network = Network::new(&ledger, &me);
    let ghosts = LocalGhostKeys::new(
        HashMap::from([(BOB.to_string(), Account::new(2).public())]),
        [0; 32],
    );
    let mut pipeline = Pipeline::new(&ledger, &ghosts, &network);
    pipeline.retry = RetryPolicy::none();

    let ctx = CallContext::new();
    ctx.cancel();
    let err = pipeline
        .send(&ctx, &user(&me), &request(coins(1), b""))
        .unwrap_err();
    assert!(matches!(err, TransferError::Transport(RpcError::Cancelled)));
    assert_eq!(*network.verifies.borrow(), 0);
}
