// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::path::Path;

use safe_rpc::SessionSigner;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::TransferError;

/// 32-byte spend seed. The signing scalar is derived from it per input and
/// the seed itself never leaves this type.
#[derive(Clone)]
pub struct SpendKey(Zeroizing<[u8; 32]>);

impl SpendKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Accepts a 32-byte seed, or a 64-byte `seed || public` ed25519 key whose
    /// seed half is used.
    pub fn from_hex(value: &str) -> Result<Self, TransferError> {
        let bytes = Zeroizing::new(
            hex::decode(value.trim())
                .map_err(|e| TransferError::InvalidKey(format!("spend key: {e}")))?,
        );
        if bytes.len() != 32 && bytes.len() != 64 {
            return Err(TransferError::InvalidKey(format!(
                "spend key must be 32 or 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        Ok(Self(Zeroizing::new(seed)))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SpendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpendKey(..)")
    }
}

/// Identity a transfer is made from: the account id, its API session and the
/// spend secret.
#[derive(Clone)]
pub struct SafeUser {
    pub user_id: String,
    pub session_id: String,
    session_key: Zeroizing<String>,
    spend_key: SpendKey,
}

impl SafeUser {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        session_key: impl Into<String>,
        spend_key: SpendKey,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            session_key: Zeroizing::new(session_key.into()),
            spend_key,
        }
    }

    pub fn spend_key(&self) -> &SpendKey {
        &self.spend_key
    }

    /// Token signer for authenticated API calls.
    pub fn session_signer(&self) -> Result<SessionSigner, TransferError> {
        SessionSigner::new(&self.user_id, &self.session_id, &self.session_key)
            .map_err(|e| TransferError::InvalidKey(e.to_string()))
    }

    pub fn from_keystore(keystore: Keystore) -> Result<Self, TransferError> {
        let pin_seed = keystore.pin.as_deref().and_then(|pin| pin.get(..64));
        let spend = match (keystore.spend_private_key.as_deref(), pin_seed) {
            (Some(spend), _) => SpendKey::from_hex(spend)?,
            (None, Some(seed)) => SpendKey::from_hex(seed)?,
            (None, None) => {
                return Err(TransferError::InvalidKey(
                    "keystore has no spend key".into(),
                ))
            }
        };
        Ok(Self::new(
            keystore.client_id.clone(),
            keystore.session_id.clone(),
            keystore.private_key.as_str(),
            spend,
        ))
    }
}

impl fmt::Debug for SafeUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeUser")
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// On-disk keystore JSON as exported for bot/app sessions.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Keystore {
    #[serde(alias = "app_id", alias = "user_id")]
    pub client_id: String,
    pub session_id: String,
    /// Session ed25519 private key, hex.
    pub private_key: String,
    /// Hex spend key; the first 32 bytes are the spend seed.
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub spend_private_key: Option<String>,
}

impl Keystore {
    pub fn from_json(json: &str) -> Result<Self, TransferError> {
        serde_json::from_str(json).map_err(|e| TransferError::InvalidKey(format!("keystore: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, TransferError> {
        let json = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            TransferError::InvalidKey(format!("keystore {}: {e}", path.display()))
        })?);
        Self::from_json(&json)
    }
}
