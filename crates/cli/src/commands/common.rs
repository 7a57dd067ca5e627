// SPDX-License-Identifier: Apache-2.0
use anyhow::{anyhow, Result};

pub fn parse_hex_vec(value: &str, label: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim().trim_start_matches("0x");
    hex::decode(trimmed).map_err(|e| anyhow!("decode {label}: {e}"))
}

/// Receivers given once with commas or repeated; empty entries dropped.
pub fn split_members(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
