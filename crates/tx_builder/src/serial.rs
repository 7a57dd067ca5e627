// SPDX-License-Identifier: Apache-2.0
//! serial.rs: binary codec for `RawTransaction`.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! magic[2] version[1] asset[32]
//! u16 n_inputs  { hash[32] u32 index }
//! u16 n_outputs { u8 type u64 amount
//!                 script:     u16 n_keys { key[32] } mask[32] u16 len script
//!                 withdrawal: u16 len address u16 len tag }
//! u16 len extra
//! ---- payload ends here ----
//! u16 n_groups  { u16 n_slots { u16 signer sig[64] } }
//! ```
//!
//! The payload hash covers everything before the signature section, so
//! attaching signatures never changes what was signed.

use crate::{
    Amount, Hash, Input, InputSignatures, Output, PublicKey, RawTransaction, ScriptOutput,
    Signature, SignerSlot, ThresholdScript, TxError, WithdrawalOutput, EXTRA_SIZE_LIMIT,
    TX_VERSION,
};

pub const MAGIC: [u8; 2] = [0x77, 0x77];
pub const OUTPUT_TYPE_SCRIPT: u8 = 0x00;
pub const OUTPUT_TYPE_WITHDRAWAL_SUBMIT: u8 = 0xa1;

impl RawTransaction {
    /// Encoding of everything covered by the payload hash.
    pub fn payload_marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.outputs.len() * 96);
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        out.extend_from_slice(self.asset.as_bytes());

        put_u16(&mut out, self.inputs.len());
        for input in &self.inputs {
            out.extend_from_slice(input.hash.as_bytes());
            out.extend_from_slice(&input.index.to_be_bytes());
        }

        put_u16(&mut out, self.outputs.len());
        for output in &self.outputs {
            match output {
                Output::Script(o) => {
                    out.push(OUTPUT_TYPE_SCRIPT);
                    out.extend_from_slice(&o.amount.units().to_be_bytes());
                    put_u16(&mut out, o.keys.len());
                    for key in &o.keys {
                        out.extend_from_slice(key.as_bytes());
                    }
                    out.extend_from_slice(o.mask.as_bytes());
                    put_bytes(&mut out, &o.script.to_bytes());
                }
                Output::Withdrawal(o) => {
                    out.push(OUTPUT_TYPE_WITHDRAWAL_SUBMIT);
                    out.extend_from_slice(&o.amount.units().to_be_bytes());
                    put_bytes(&mut out, o.address.as_bytes());
                    put_bytes(&mut out, o.tag.as_deref().unwrap_or_default().as_bytes());
                }
            }
        }

        put_bytes(&mut out, &self.extra);
        out
    }

    /// Full encoding, signatures included.
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = self.payload_marshal();
        put_u16(&mut out, self.signatures.len());
        for group in &self.signatures {
            put_u16(&mut out, group.slots().len());
            for slot in group.slots() {
                out.extend_from_slice(&slot.signer.to_be_bytes());
                out.extend_from_slice(slot.signature.as_bytes());
            }
        }
        out
    }

    /// SHA3-256 of [`payload_marshal`](Self::payload_marshal); the message every input signs.
    pub fn payload_hash(&self) -> Hash {
        Hash::digest(self.payload_marshal())
    }

    /// Parse a blob produced by [`marshal`](Self::marshal). Trailing bytes are rejected.
    pub fn decode(blob: &[u8]) -> Result<Self, TxError> {
        let mut r = Reader { buf: blob };
        if r.take(2)? != MAGIC {
            return Err(TxError::Decode("magic mismatch".into()));
        }
        let version = r.u8()?;
        if version != TX_VERSION {
            return Err(TxError::Decode(format!("unsupported version {version}")));
        }
        let asset = Hash::from_bytes(r.array32()?);

        let n_inputs = r.u16()? as usize;
        let mut inputs = Vec::with_capacity(n_inputs);
        for _ in 0..n_inputs {
            let hash = Hash::from_bytes(r.array32()?);
            let index = r.u32()?;
            inputs.push(Input { hash, index });
        }

        let n_outputs = r.u16()? as usize;
        let mut outputs = Vec::with_capacity(n_outputs);
        for i in 0..n_outputs {
            let kind = r.u8()?;
            let amount = Amount::from_units(r.u64()?);
            let output = match kind {
                OUTPUT_TYPE_SCRIPT => {
                    let n_keys = r.u16()? as usize;
                    let mut keys = Vec::with_capacity(n_keys);
                    for _ in 0..n_keys {
                        keys.push(PublicKey::from_bytes(r.array32()?));
                    }
                    let mask = PublicKey::from_bytes(r.array32()?);
                    let script = ThresholdScript::from_bytes(r.bytes()?)?;
                    Output::Script(ScriptOutput {
                        amount,
                        keys,
                        mask,
                        script,
                    })
                }
                OUTPUT_TYPE_WITHDRAWAL_SUBMIT => {
                    let address = r.string()?;
                    let tag = r.string()?;
                    Output::Withdrawal(WithdrawalOutput {
                        amount,
                        address,
                        tag: (!tag.is_empty()).then_some(tag),
                    })
                }
                other => {
                    return Err(TxError::Decode(format!(
                        "output {i} has unknown type {other:#04x}"
                    )))
                }
            };
            outputs.push(output);
        }

        let extra = r.bytes()?.to_vec();
        if extra.len() > EXTRA_SIZE_LIMIT {
            return Err(TxError::ExtraTooLarge { len: extra.len() });
        }

        let n_groups = r.u16()? as usize;
        if n_groups != 0 && n_groups != inputs.len() {
            return Err(TxError::Decode(format!(
                "{n_groups} signature groups for {} inputs",
                inputs.len()
            )));
        }
        let mut signatures = Vec::with_capacity(n_groups);
        for _ in 0..n_groups {
            let n_slots = r.u16()? as usize;
            let mut slots = Vec::with_capacity(n_slots);
            for _ in 0..n_slots {
                let signer = r.u16()?;
                let mut sig = [0u8; 64];
                sig.copy_from_slice(r.take(64)?);
                slots.push(SignerSlot {
                    signer,
                    signature: Signature::from_bytes(sig),
                });
            }
            signatures.push(InputSignatures::from_slots(slots));
        }

        if !r.buf.is_empty() {
            return Err(TxError::Decode(format!(
                "{} trailing bytes after transaction",
                r.buf.len()
            )));
        }

        Ok(Self {
            version,
            asset,
            inputs,
            outputs,
            extra,
            signatures,
        })
    }
}

// Every length written here is bounded by `RawTransaction::assemble`.
fn put_u16(out: &mut Vec<u8>, n: usize) {
    debug_assert!(n <= u16::MAX as usize);
    out.extend_from_slice(&(n as u16).to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u16(out, bytes.len());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TxError> {
        if self.buf.len() < n {
            return Err(TxError::Decode(format!(
                "truncated: need {n} bytes, have {}",
                self.buf.len()
            )));
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, TxError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, TxError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, TxError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, TxError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(b))
    }

    fn array32(&mut self) -> Result<[u8; 32], TxError> {
        let mut b = [0u8; 32];
        b.copy_from_slice(self.take(32)?);
        Ok(b)
    }

    fn bytes(&mut self) -> Result<&'a [u8], TxError> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn string(&mut self) -> Result<String, TxError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| TxError::Decode(format!("utf8: {e}")))
    }
}
