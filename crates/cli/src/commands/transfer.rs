// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::Args;
use safe_rpc::{CallContext, ClientConfig, SafeClient};
use safe_wallet_core::{
    Keystore, OutputOrder, Pipeline, Recipient, RemoteGhostKeys, SafeUser, TransferOutcome,
    TransferRequest,
};
use tx_builder::Amount;
use uuid::Uuid;

use super::common::split_members;

#[derive(Clone, Debug, Args)]
pub struct TransferArgs {
    /// Keystore JSON (client_id, session_id, private_key, spend key).
    #[arg(long, value_name = "PATH")]
    pub keystore: PathBuf,
    /// Asset UUID or 64-hex kernel asset hash.
    #[arg(long)]
    pub asset: String,
    /// Decimal amount, e.g. 0.015.
    #[arg(long)]
    pub amount: String,
    /// Receiving member id; repeat or comma-separate for a multisig address.
    #[arg(long = "receiver", value_name = "ID")]
    pub receivers: Vec<String>,
    /// Signatures required to spend the receiving output.
    #[arg(long, default_value_t = 1)]
    pub threshold: u8,
    /// Withdraw to an external chain address instead of paying members.
    #[arg(long, value_name = "ADDRESS", conflicts_with = "receivers")]
    pub withdraw_to: Option<String>,
    /// Destination tag or memo required by some chains.
    #[arg(long, requires = "withdraw_to")]
    pub tag: Option<String>,
    /// Transaction memo, at most 512 bytes.
    #[arg(long, default_value = "")]
    pub memo: String,
    /// Trace id; reuse it to retry the same transfer. Random when omitted.
    #[arg(long)]
    pub trace: Option<String>,
    #[arg(long, default_value = "https://api.mixin.one")]
    pub api_base: String,
    /// Overall deadline for the transfer.
    #[arg(long, default_value_t = 60, value_name = "SECS")]
    pub timeout_secs: u64,
    /// Spend oldest outputs first instead of listing order.
    #[arg(long, default_value_t = false)]
    pub by_sequence: bool,
}

pub fn run(args: TransferArgs) -> Result<()> {
    let keystore = Keystore::load(&args.keystore)?;
    let user = SafeUser::from_keystore(keystore)?;

    let amount: Amount = args
        .amount
        .parse()
        .with_context(|| format!("parse amount {:?}", args.amount))?;
    let recipient = match &args.withdraw_to {
        Some(address) => Recipient::withdrawal(address.clone(), args.tag.clone(), amount),
        None => {
            let members = split_members(&args.receivers);
            ensure!(
                !members.is_empty(),
                "either --receiver or --withdraw-to is required"
            );
            Recipient::script(members, args.threshold, amount)
        }
    };
    let trace_id = args
        .trace
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = TransferRequest {
        asset_id: args.asset.clone(),
        recipients: vec![recipient],
        trace_id: trace_id.clone(),
        memo: args.memo.into_bytes(),
    };

    let config = ClientConfig {
        base_url: args.api_base.clone(),
        ..Default::default()
    };
    let client = SafeClient::new(&config, Some(user.session_signer()?))
        .context("create api client")?;
    let ghosts = RemoteGhostKeys::new(client.clone(), &trace_id);
    let mut pipeline = Pipeline::new(&client, &ghosts, &client);
    if args.by_sequence {
        pipeline.order = OutputOrder::BySequence;
    }

    let ctx = CallContext::with_timeout(Duration::from_secs(args.timeout_secs.max(1)));
    tracing::info!(%trace_id, asset = %args.asset, %amount, "sending transfer");
    let outcome = match pipeline.send(&ctx, &user, &request) {
        Ok(outcome) => outcome,
        Err(e) if e.is_transient() => {
            bail!("{e}; retry with --trace {trace_id} to resume the same transfer")
        }
        Err(e) => return Err(e).context(format!("transfer {trace_id}")),
    };
    match outcome {
        TransferOutcome::Submitted {
            trace_id,
            transaction_hash,
            state,
        } => {
            println!("trace_id={trace_id}");
            println!("transaction_hash={transaction_hash}");
            println!("state={state:?}");
        }
        TransferOutcome::AlreadyProcessed { trace_id, state } => {
            println!("trace_id={trace_id}");
            println!("already processed: state={state:?}");
        }
    }
    Ok(())
}
