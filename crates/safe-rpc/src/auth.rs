// SPDX-License-Identifier: Apache-2.0
//! Session token signing for authenticated requests.
//!
//! Every request carries `Authorization: Bearer <jwt>` where the JWT is
//! EdDSA-signed with the session key and its `sig` claim is
//! `hex(SHA-256(method || uri || body))`, binding the token to one request.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::RpcError;

const TOKEN_SCOPE: &str = "FULL";
const TOKEN_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub uid: String,
    pub sid: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
    pub sig: String,
    pub scp: String,
}

#[derive(Serialize)]
struct TokenHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// Signs request tokens on behalf of one user session.
pub struct SessionSigner {
    user_id: String,
    session_id: String,
    key: SigningKey,
}

impl SessionSigner {
    /// `private_key_hex` is either the 32-byte seed or the 64-byte seed||public form.
    pub fn new(user_id: &str, session_id: &str, private_key_hex: &str) -> Result<Self, RpcError> {
        let bytes = hex::decode(private_key_hex.trim())
            .map_err(|e| RpcError::Auth(format!("session key hex: {e}")))?;
        if bytes.len() != 32 && bytes.len() != 64 {
            return Err(RpcError::Auth(format!(
                "session key must be 32 or 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let key = SigningKey::from_bytes(&seed);
        if bytes.len() == 64 && key.verifying_key().as_bytes()[..] != bytes[32..] {
            return Err(RpcError::Auth(
                "session key public half does not match seed".into(),
            ));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            key,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Token for `method uri body`, issued now with a random `jti`.
    pub fn sign_token(&self, method: &str, uri: &str, body: &[u8]) -> Result<String, RpcError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RpcError::Auth(format!("system clock: {e}")))?
            .as_secs();
        self.sign_token_at(method, uri, body, now, Uuid::new_v4())
    }

    pub fn sign_token_at(
        &self,
        method: &str,
        uri: &str,
        body: &[u8],
        issued_at: u64,
        jti: Uuid,
    ) -> Result<String, RpcError> {
        let claims = TokenClaims {
            uid: self.user_id.clone(),
            sid: self.session_id.clone(),
            iat: issued_at,
            exp: issued_at + TOKEN_TTL.as_secs(),
            jti: jti.to_string(),
            sig: request_digest(method, uri, body),
            scp: TOKEN_SCOPE.to_string(),
        };
        let header = serde_json::to_vec(&TokenHeader {
            alg: "EdDSA",
            typ: "JWT",
        })
        .map_err(|e| RpcError::Auth(format!("encode header: {e}")))?;
        let claims =
            serde_json::to_vec(&claims).map_err(|e| RpcError::Auth(format!("encode claims: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let signature = self.key.sign(signing_input.as_bytes());
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

/// `hex(SHA-256(method || uri || body))`
pub fn request_digest(method: &str, uri: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(uri.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}
