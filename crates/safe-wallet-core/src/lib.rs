// SPDX-License-Identifier: Apache-2.0
//! safe-wallet-core: client side of a safe (ghost-key UTXO) transfer.
//!
//! Pieces:
//! - Selection: first-fit prefix of the address's unspent outputs
//! - Ghost keys: one-time destination keys per script output position
//! - Builder: unsigned transaction from inputs, recipients and memo
//! - Sequencer: verify (view keys) then submit (integrity-checked echo)
//! - Signer: `k = view + spend` per input, deterministic Ed25519 signatures
//! - Pipeline: wires the above for one trace id
//!
//! Every network call takes a `CallContext`; transient transport failures
//! are retried with the same trace id.
pub mod builder;
pub mod config;
pub mod error;
pub mod ghost;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod selection;
pub mod sequencer;
pub mod signer;

pub use builder::{build_transaction, decompose};
pub use config::{Keystore, SafeUser, SpendKey};
pub use error::TransferError;
pub use ghost::{
    derive_ghost_private, validate_address, GhostKeyProvider, LocalGhostKeys, MemberKeys,
    RemoteGhostKeys,
};
pub use model::{
    members_hash, parse_asset_id, GhostKeys, Recipient, ScriptRecipient, SequencerState,
    UnspentOutput, WithdrawalRecipient,
};
pub use pipeline::{send_transaction, Pipeline, TransferOutcome, TransferRequest};
pub use retry::RetryPolicy;
pub use safe_rpc::CallContext;
pub use selection::{select_prefix, OutputOrder, OutputSelector, OutputSource, Selection};
pub use sequencer::{Sequencer, SequencerProtocol, Verification};
pub use signer::{derive_signing_key, sign_inputs, sign_transaction, spend_public_key, ViewKey};
