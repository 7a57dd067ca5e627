// SPDX-License-Identifier: Apache-2.0
use anyhow::{ensure, Context, Result};
use clap::Args;
use safe_wallet_core::members_hash as hash_members;
use tx_builder::decompose_transaction;

use super::common::{parse_hex_vec, split_members};

#[derive(Clone, Debug, Args)]
pub struct MembersHashArgs {
    /// Member id; repeat or comma-separate.
    #[arg(long = "member", value_name = "ID", required = true)]
    pub members: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct DecodeArgs {
    /// Hex-encoded raw transaction.
    #[arg(long, value_name = "HEX")]
    pub raw: String,
}

pub fn members_hash(args: MembersHashArgs) -> Result<()> {
    let members = split_members(&args.members);
    ensure!(!members.is_empty(), "at least one member is required");
    println!("members_hash={}", hash_members(&members));
    Ok(())
}

pub fn decode(args: DecodeArgs) -> Result<()> {
    let blob = parse_hex_vec(&args.raw, "raw transaction")?;
    let (tx, view) = decompose_transaction(&blob).context("decode raw transaction")?;
    println!("payload_hash={}", tx.payload_hash());
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
