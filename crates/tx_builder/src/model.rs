// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::{Amount, Hash, PublicKey, Signature, TxError};

pub const TX_VERSION: u8 = 5;
pub const EXTRA_SIZE_LIMIT: usize = 512;

const OPERATOR_CMP: u8 = 0xff;
const OPERATOR_SUM: u8 = 0xfe;

/// Reference to a previously created output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub hash: Hash,
    pub index: u32,
}

/// `sum(signatures) >= threshold` over the output's keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdScript(u8);

impl ThresholdScript {
    pub fn new(threshold: u8) -> Self {
        Self(threshold)
    }

    pub fn threshold(&self) -> u8 {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [OPERATOR_CMP, OPERATOR_SUM, self.0]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        match bytes {
            [OPERATOR_CMP, OPERATOR_SUM, t] => Ok(Self(*t)),
            _ => Err(TxError::Decode(format!(
                "unsupported script {}",
                hex::encode(bytes)
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub amount: Amount,
    /// One ghost key per address member, in member order.
    pub keys: Vec<PublicKey>,
    pub mask: PublicKey,
    pub script: ThresholdScript,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalOutput {
    pub amount: Amount,
    pub address: String,
    pub tag: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Output {
    Script(ScriptOutput),
    Withdrawal(WithdrawalOutput),
}

impl Output {
    pub fn amount(&self) -> Amount {
        match self {
            Output::Script(o) => o.amount,
            Output::Withdrawal(o) => o.amount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSlot {
    /// Position of the signer within the spent output's key set.
    pub signer: u16,
    pub signature: Signature,
}

/// Signatures for one input. The pipeline fills exactly one slot (signer 0);
/// the encoding carries a slot list so wider key sets fit without a format change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignatures(Vec<SignerSlot>);

impl InputSignatures {
    pub fn single(signature: Signature) -> Self {
        Self(vec![SignerSlot {
            signer: 0,
            signature,
        }])
    }

    pub fn from_slots(slots: Vec<SignerSlot>) -> Self {
        Self(slots)
    }

    pub fn slots(&self) -> &[SignerSlot] {
        &self.0
    }
}

/// Unsigned (or signed) transaction. Built once; only the signature list can
/// change after assembly, and only from empty to one entry per input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTransaction {
    pub(crate) version: u8,
    pub(crate) asset: Hash,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
    pub(crate) extra: Vec<u8>,
    pub(crate) signatures: Vec<InputSignatures>,
}

impl RawTransaction {
    /// Validates the parts and returns an unsigned transaction.
    pub fn assemble(
        asset: Hash,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        extra: Vec<u8>,
    ) -> Result<Self, TxError> {
        if extra.len() > EXTRA_SIZE_LIMIT {
            return Err(TxError::ExtraTooLarge { len: extra.len() });
        }
        if inputs.is_empty() {
            return Err(TxError::Invalid("transaction has no inputs".into()));
        }
        if inputs.len() > u16::MAX as usize || outputs.len() > u16::MAX as usize {
            return Err(TxError::Invalid("too many inputs or outputs".into()));
        }
        for output in &outputs {
            if output.amount().is_zero() {
                return Err(TxError::InvalidAmount("zero output amount".into()));
            }
            match output {
                Output::Script(o) => {
                    let t = o.script.threshold() as usize;
                    if o.keys.is_empty() || t == 0 || t > o.keys.len() {
                        return Err(TxError::Invalid(format!(
                            "threshold {t} out of range for {} keys",
                            o.keys.len()
                        )));
                    }
                    if o.keys.len() > u16::MAX as usize {
                        return Err(TxError::Invalid("too many output keys".into()));
                    }
                }
                Output::Withdrawal(o) => {
                    let tag_len = o.tag.as_deref().map_or(0, str::len);
                    if o.address.is_empty()
                        || o.address.len() > u16::MAX as usize
                        || tag_len > u16::MAX as usize
                    {
                        return Err(TxError::Invalid(format!(
                            "withdrawal address {:?} invalid",
                            o.address
                        )));
                    }
                }
            }
        }
        Ok(Self {
            version: TX_VERSION,
            asset,
            inputs,
            outputs,
            extra,
            signatures: Vec::new(),
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn asset(&self) -> &Hash {
        &self.asset
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn extra(&self) -> &[u8] {
        &self.extra
    }

    pub fn signatures(&self) -> &[InputSignatures] {
        &self.signatures
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Attach one signature group per input. Fails if already signed or if
    /// the count does not match the inputs.
    pub fn attach_signatures(&mut self, signatures: Vec<InputSignatures>) -> Result<(), TxError> {
        if self.is_signed() {
            return Err(TxError::Invalid("transaction already signed".into()));
        }
        if signatures.len() != self.inputs.len() {
            return Err(TxError::Invalid(format!(
                "signature count {} != input count {}",
                signatures.len(),
                self.inputs.len()
            )));
        }
        self.signatures = signatures;
        Ok(())
    }
}
